mod card;
mod deck;
mod history;
mod ids;
mod profile;
mod settings;

pub use ids::{CardId, DeckId, ParseIdError, SessionRecordId, UserId};

pub use card::{Card, CardError, CardKind, Difficulty};
pub use deck::{Deck, DeckError};
pub use history::{HISTORY_CAP, SessionData, SessionRecord, push_capped};
pub use profile::UserProfile;
pub use settings::{
    CARDS_PER_SESSION_RANGE, Settings, SettingsDraft, SettingsError, Theme, TransitionSpeed,
};
