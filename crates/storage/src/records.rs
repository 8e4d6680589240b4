use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use study_core::model::{Card, CardError, CardId, CardKind, Deck, DeckError, DeckId, Difficulty};
use thiserror::Error;

/// Failure turning a stored record back into a domain deck.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("card {id}: {source}")]
    Card {
        id: CardId,
        #[source]
        source: CardError,
    },

    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// Persisted shape for a card, in the camelCase document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub id: CardId,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<usize>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub correct: u32,
}

impl CardRecord {
    #[must_use]
    pub fn from_card(card: &Card) -> Self {
        Self {
            id: card.id().clone(),
            kind: card.kind(),
            question: card.question().to_owned(),
            options: card.options().to_vec(),
            correct_answer: card.correct_answer(),
            explanation: card.explanation().to_owned(),
            difficulty: card.difficulty(),
            attempts: card.attempts(),
            correct: card.correct(),
        }
    }

    /// Convert the record back into a domain `Card`.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the record violates card invariants.
    pub fn into_card(self) -> Result<Card, CardError> {
        Card::from_persisted(
            self.id,
            self.kind,
            self.question,
            self.options,
            self.correct_answer,
            self.explanation,
            self.difficulty,
            self.attempts,
            self.correct,
        )
    }
}

/// Persisted shape for a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRecord {
    pub id: DeckId,
    pub title: String,
    pub cards: Vec<CardRecord>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub completions: u32,
}

impl DeckRecord {
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            id: deck.id().clone(),
            title: deck.title().to_owned(),
            cards: deck.cards().iter().map(CardRecord::from_card).collect(),
            created: deck.created(),
            last_studied: deck.last_studied(),
            progress: deck.progress(),
            completions: deck.completions(),
        }
    }

    /// Convert the record back into a domain `Deck`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if any card or the deck itself is invalid.
    pub fn into_deck(self) -> Result<Deck, RecordError> {
        let cards = self
            .cards
            .into_iter()
            .map(|record| {
                let id = record.id.clone();
                record
                    .into_card()
                    .map_err(|source| RecordError::Card { id, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Deck::from_persisted(
            self.id,
            self.title,
            cards,
            self.created,
            self.last_studied,
            self.progress,
            self.completions,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::time::fixed_now;

    #[test]
    fn decodes_document_layout() {
        let json = r#"{
            "id": "d1",
            "title": "Cells",
            "created": "2024-03-01T10:00:00.000Z",
            "progress": 40,
            "cards": [{
                "id": "c1",
                "type": "multiple-choice",
                "question": "Powerhouse of the cell?",
                "options": ["Nucleus", "Mitochondria"],
                "correctAnswer": 1,
                "explanation": "ATP.",
                "difficulty": "easy",
                "attempts": 2,
                "correct": 1
            }, {
                "id": "c2",
                "type": "short-answer",
                "question": "Define osmosis",
                "correctAnswer": null,
                "difficulty": null
            }]
        }"#;
        let deck = serde_json::from_str::<DeckRecord>(json)
            .unwrap()
            .into_deck()
            .unwrap();
        assert_eq!(deck.len(), 2);
        assert!((deck.progress() - 40.0).abs() < f64::EPSILON);
        assert_eq!(deck.cards()[0].answer_text(), Some("Mitochondria"));
        assert_eq!(deck.cards()[1].difficulty(), None);
        assert!(deck.last_studied().is_none());
    }

    #[test]
    fn invalid_card_is_reported_with_its_id() {
        let record = DeckRecord {
            id: DeckId::new("d1"),
            title: "Cells".into(),
            cards: vec![CardRecord {
                id: CardId::new("bad"),
                kind: CardKind::ShortAnswer,
                question: String::new(),
                options: Vec::new(),
                correct_answer: None,
                explanation: String::new(),
                difficulty: None,
                attempts: 0,
                correct: 0,
            }],
            created: fixed_now(),
            last_studied: None,
            progress: 0.0,
            completions: 0,
        };
        let err = record.into_deck().unwrap_err();
        assert!(matches!(err, RecordError::Card { ref id, .. } if id.as_str() == "bad"));
    }

    #[test]
    fn unstudied_deck_omits_last_studied() {
        let card = Card::new(CardId::new("c1"), CardKind::ShortAnswer, "Q", Vec::new(), None, "")
            .unwrap();
        let deck = Deck::new(DeckId::new("d1"), "T", vec![card], fixed_now()).unwrap();
        let value = serde_json::to_value(DeckRecord::from_deck(&deck)).unwrap();
        assert!(value.get("lastStudied").is_none());
        assert_eq!(value["cards"][0]["type"], "short-answer");
        assert!(value["cards"][0]["correctAnswer"].is_null());
    }
}
