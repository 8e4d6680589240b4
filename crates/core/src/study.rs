use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Card, Deck, Difficulty, SessionData};
use crate::scoring::DifficultyTally;

/// Default pause between a rating and the automatic advance, in milliseconds.
pub const DEFAULT_ADVANCE_DELAY_MS: u64 = 500;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("no deck is loaded")]
    NoDeck,

    #[error("the study pass is already completed")]
    AlreadyCompleted,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Position of the study cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudyState {
    #[default]
    Idle,
    /// Question side of card `i`.
    Showing(usize),
    /// Answer side of card `i`.
    Flipped(usize),
    Completed,
}

impl StudyState {
    /// Cursor index while a card is on screen.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        match self {
            StudyState::Showing(i) | StudyState::Flipped(i) => Some(i),
            StudyState::Idle | StudyState::Completed => None,
        }
    }

    #[must_use]
    pub fn is_flipped(self) -> bool {
        matches!(self, StudyState::Flipped(_))
    }
}

/// Numbers handed off when a pass over the deck completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSummary {
    pub total_cards: u32,
    pub rated_cards: u32,
    pub accuracy: u32,
    pub cards_correct: u32,
}

impl CompletionSummary {
    fn from_cards(cards: &[Card]) -> Self {
        let tally = DifficultyTally::from_cards(cards);
        Self {
            total_cards: u32::try_from(cards.len()).unwrap_or(u32::MAX),
            rated_cards: tally.total(),
            accuracy: tally.accuracy(),
            cards_correct: tally.cards_correct(),
        }
    }

    /// Session log numbers for this completion at the given deck progress.
    #[must_use]
    pub fn session_data(&self, deck_progress: f64) -> SessionData {
        SessionData {
            cards_studied: self.total_cards,
            cards_correct: self.cards_correct,
            accuracy: self.accuracy,
            deck_progress,
        }
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub state: StudyState,
    /// The working deck was mutated and should be persisted.
    pub deck_changed: bool,
    /// Set only on the transition that enters `Completed`.
    pub completion: Option<CompletionSummary>,
}

impl Step {
    fn unchanged(state: StudyState) -> Self {
        Self {
            state,
            deck_changed: false,
            completion: None,
        }
    }

    fn changed(state: StudyState) -> Self {
        Self {
            state,
            deck_changed: true,
            completion: None,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Navigation and rating controller over a working copy of one deck.
///
/// Failed transitions leave the session untouched.
#[derive(Debug, Clone, Default)]
pub struct StudySession {
    deck: Option<Deck>,
    state: StudyState,
    ratings: DifficultyTally,
}

impl StudySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> StudyState {
        self.state
    }

    #[must_use]
    pub fn deck(&self) -> Option<&Deck> {
        self.deck.as_ref()
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        let index = self.state.index()?;
        self.deck.as_ref()?.card(index)
    }

    /// Ratings given during this pass, re-ratings included.
    #[must_use]
    pub fn ratings(&self) -> DifficultyTally {
        self.ratings
    }

    /// Accuracy over the cards currently rated.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        self.deck
            .as_ref()
            .map_or(0, |deck| DifficultyTally::from_cards(deck.cards()).accuracy())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == StudyState::Completed
    }

    /// Start a pass over `deck` from the first card.
    pub fn load(&mut self, mut deck: Deck) -> Step {
        deck.set_progress_for_position(0);
        self.deck = Some(deck);
        self.ratings = DifficultyTally::default();
        self.state = StudyState::Showing(0);
        Step::changed(self.state)
    }

    /// Swap between the question and answer side of the current card.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` with no deck loaded or after completion.
    pub fn toggle_flip(&mut self) -> Result<Step, TransitionError> {
        let next = match self.active_index()? {
            (i, false) => StudyState::Flipped(i),
            (i, true) => StudyState::Showing(i),
        };
        self.state = next;
        Ok(Step::unchanged(next))
    }

    /// Move to the next card, or complete the pass from the last card.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` with no deck loaded or after completion.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Step, TransitionError> {
        let (index, _) = self.active_index()?;
        let deck = self.deck.as_mut().ok_or(TransitionError::NoDeck)?;

        if index + 1 < deck.len() {
            deck.set_progress_for_position(index + 1);
            self.state = StudyState::Showing(index + 1);
            return Ok(Step::changed(self.state));
        }

        deck.mark_completed(now);
        let summary = CompletionSummary::from_cards(deck.cards());
        self.state = StudyState::Completed;
        Ok(Step {
            state: self.state,
            deck_changed: true,
            completion: Some(summary),
        })
    }

    /// Move to the previous card; stays put on the first card.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` with no deck loaded or after completion.
    pub fn previous(&mut self) -> Result<Step, TransitionError> {
        let (index, _) = self.active_index()?;
        if index == 0 {
            return Ok(Step::unchanged(self.state));
        }
        let deck = self.deck.as_mut().ok_or(TransitionError::NoDeck)?;
        deck.set_progress_for_position(index - 1);
        self.state = StudyState::Showing(index - 1);
        Ok(Step::changed(self.state))
    }

    /// Rate the current card. The cursor does not move.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` with no deck loaded or after completion.
    pub fn rate(&mut self, difficulty: Difficulty) -> Result<Step, TransitionError> {
        let (index, _) = self.active_index()?;
        let card = self
            .deck
            .as_mut()
            .and_then(|deck| deck.card_mut(index))
            .ok_or(TransitionError::NoDeck)?;
        card.record_rating(difficulty);
        self.ratings.add(difficulty);
        Ok(Step::changed(self.state))
    }

    /// Clear every rating and start over from the first card.
    ///
    /// Allowed from `Completed`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::NoDeck` if nothing is loaded.
    pub fn restart(&mut self) -> Result<Step, TransitionError> {
        let deck = self.deck.as_mut().ok_or(TransitionError::NoDeck)?;
        deck.reset_progress();
        self.ratings = DifficultyTally::default();
        self.state = StudyState::Showing(0);
        Ok(Step::changed(self.state))
    }

    fn active_index(&self) -> Result<(usize, bool), TransitionError> {
        match self.state {
            StudyState::Idle => Err(TransitionError::NoDeck),
            StudyState::Completed => Err(TransitionError::AlreadyCompleted),
            StudyState::Showing(i) => Ok((i, false)),
            StudyState::Flipped(i) => Ok((i, true)),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
