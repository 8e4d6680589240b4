use thiserror::Error;

use crate::model::{CardError, DeckError, ParseIdError, SettingsError};
use crate::study::TransitionError;

/// Any domain-level failure, for callers that do not need to tell them apart.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
