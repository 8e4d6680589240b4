use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::card::Card;
use crate::model::ids::{CardId, DeckId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck title cannot be empty")]
    EmptyTitle,

    #[error("deck must contain at least one card")]
    NoCards,

    #[error("card id {0} appears more than once in the deck")]
    DuplicateCardId(CardId),

    #[error("deck progress must be within 0..=100, got {0}")]
    InvalidProgress(f64),
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named, ordered collection of cards plus its study progress.
///
/// `progress` is recomputed from the study cursor and may go down as
/// well as up.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    id: DeckId,
    title: String,
    cards: Vec<Card>,
    created: DateTime<Utc>,
    last_studied: Option<DateTime<Utc>>,
    progress: f64,
    completions: u32,
}

impl Deck {
    /// Creates a new, unstudied deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyTitle` if the title is blank.
    /// Returns `DeckError::NoCards` if `cards` is empty.
    /// Returns `DeckError::DuplicateCardId` if two cards share an id.
    pub fn new(
        id: DeckId,
        title: impl Into<String>,
        cards: Vec<Card>,
        created: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        Self::from_persisted(id, title, cards, created, None, 0.0, 0)
    }

    /// Rehydrate a deck from storage or a remote payload.
    ///
    /// # Errors
    ///
    /// Returns `DeckError` if the content is invalid or `progress` is out of range.
    pub fn from_persisted(
        id: DeckId,
        title: impl Into<String>,
        cards: Vec<Card>,
        created: DateTime<Utc>,
        last_studied: Option<DateTime<Utc>>,
        progress: f64,
        completions: u32,
    ) -> Result<Self, DeckError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(DeckError::EmptyTitle);
        }
        if cards.is_empty() {
            return Err(DeckError::NoCards);
        }
        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(card.id()) {
                return Err(DeckError::DuplicateCardId(card.id().clone()));
            }
        }
        if !(0.0..=100.0).contains(&progress) {
            return Err(DeckError::InvalidProgress(progress));
        }

        Ok(Self {
            id,
            title,
            cards,
            created,
            last_studied,
            progress,
            completions,
        })
    }

    #[must_use]
    pub fn id(&self) -> &DeckId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Number of cards, always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn card(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    #[must_use]
    pub fn last_studied(&self) -> Option<DateTime<Utc>> {
        self.last_studied
    }

    /// Percentage of the deck reached by the last study pass (0-100).
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn completions(&self) -> u32 {
        self.completions
    }

    // ─── Study mutations ───────────────────────────────────────────────────────

    pub(crate) fn card_mut(&mut self, index: usize) -> Option<&mut Card> {
        self.cards.get_mut(index)
    }

    /// Progress for a cursor at `index`: `(index + 1) / len * 100`.
    pub(crate) fn set_progress_for_position(&mut self, index: usize) {
        let len = self.cards.len().max(1);
        let position = index.min(len - 1) + 1;
        #[allow(clippy::cast_precision_loss)]
        let progress = position as f64 / len as f64 * 100.0;
        self.progress = progress;
    }

    pub(crate) fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.last_studied = Some(now);
        self.progress = 100.0;
        self.completions = self.completions.saturating_add(1);
    }

    pub(crate) fn reset_progress(&mut self) {
        for card in &mut self.cards {
            card.reset_rating();
        }
        self.progress = 0.0;
    }
}
