use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CardId;

//
// ─── CARD TYPES ────────────────────────────────────────────────────────────────
//

/// Question format of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl CardKind {
    /// Human readable label, e.g. `"Multiple Choice"`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CardKind::MultipleChoice => "Multiple Choice",
            CardKind::TrueFalse => "True/False",
            CardKind::ShortAnswer => "Short Answer",
        }
    }
}

/// Three-level self-assessed difficulty of a card.
///
/// Each level carries a weight used for session accuracy:
/// - `Easy`: 100
/// - `Medium`: 70
/// - `Hard`: 30
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Accuracy weight for this rating, in percent.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Difficulty::Easy => 100,
            Difficulty::Medium => 70,
            Difficulty::Hard => 30,
        }
    }

    /// Whether this rating counts as a correct answer.
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Difficulty::Easy)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card question cannot be empty")]
    EmptyQuestion,

    #[error("correct answer index {index} is out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },

    #[error("card has a rating but no recorded attempts")]
    RatingWithoutAttempt,

    #[error("card has more correct answers ({correct}) than attempts ({attempts})")]
    CorrectExceedsAttempts { correct: u32, attempts: u32 },
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// One question/answer unit with its rating history.
///
/// Cards have no identity outside their deck; only `StudySession` mutates
/// the rating fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    id: CardId,
    kind: CardKind,
    question: String,
    options: Vec<String>,
    correct_answer: Option<usize>,
    explanation: String,
    difficulty: Option<Difficulty>,
    attempts: u32,
    correct: u32,
}

impl Card {
    /// Creates a fresh, unrated card.
    ///
    /// # Errors
    ///
    /// Returns `CardError::EmptyQuestion` if the question is blank.
    /// Returns `CardError::AnswerOutOfRange` if `correct_answer` does not index `options`.
    pub fn new(
        id: CardId,
        kind: CardKind,
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: Option<usize>,
        explanation: impl Into<String>,
    ) -> Result<Self, CardError> {
        Self::from_persisted(
            id,
            kind,
            question,
            options,
            correct_answer,
            explanation,
            None,
            0,
            0,
        )
    }

    /// Rehydrate a card including its rating history.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the content or the rating counters are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CardId,
        kind: CardKind,
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: Option<usize>,
        explanation: impl Into<String>,
        difficulty: Option<Difficulty>,
        attempts: u32,
        correct: u32,
    ) -> Result<Self, CardError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(CardError::EmptyQuestion);
        }
        if let Some(index) = correct_answer {
            if index >= options.len() {
                return Err(CardError::AnswerOutOfRange {
                    index,
                    options: options.len(),
                });
            }
        }
        if difficulty.is_some() && attempts == 0 {
            return Err(CardError::RatingWithoutAttempt);
        }
        if correct > attempts {
            return Err(CardError::CorrectExceedsAttempts { correct, attempts });
        }

        Ok(Self {
            id,
            kind,
            question: question.trim().to_owned(),
            options,
            correct_answer,
            explanation: explanation.into(),
            difficulty,
            attempts,
            correct,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &CardId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> CardKind {
        self.kind
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> Option<usize> {
        self.correct_answer
    }

    /// Text of the correct option, if the card has one.
    #[must_use]
    pub fn answer_text(&self) -> Option<&str> {
        self.correct_answer
            .and_then(|index| self.options.get(index))
            .map(String::as_str)
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn is_rated(&self) -> bool {
        self.difficulty.is_some()
    }

    /// Every rating is a new attempt, including re-ratings of the same card.
    pub(crate) fn record_rating(&mut self, difficulty: Difficulty) {
        self.difficulty = Some(difficulty);
        self.attempts = self.attempts.saturating_add(1);
        if difficulty.is_correct() {
            self.correct = self.correct.saturating_add(1);
        }
    }

    pub(crate) fn reset_rating(&mut self) {
        self.difficulty = None;
        self.attempts = 0;
        self.correct = 0;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
