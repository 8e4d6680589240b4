use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{DeckId, SessionRecordId};

/// Maximum number of entries kept in the session history log.
pub const HISTORY_CAP: usize = 100;

/// Outcome numbers of one completed study pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub cards_studied: u32,
    pub cards_correct: u32,
    pub accuracy: u32,
    pub deck_progress: f64,
}

/// Immutable entry in the session history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: SessionRecordId,
    pub deck_id: DeckId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: SessionData,
}

impl SessionRecord {
    #[must_use]
    pub fn new(deck_id: DeckId, timestamp: DateTime<Utc>, data: SessionData) -> Self {
        Self {
            id: SessionRecordId::generate(),
            deck_id,
            timestamp,
            data,
        }
    }
}

/// Append `record` and evict the oldest entries beyond [`HISTORY_CAP`].
pub fn push_capped(history: &mut Vec<SessionRecord>, record: SessionRecord) {
    history.push(record);
    if history.len() > HISTORY_CAP {
        let overflow = history.len() - HISTORY_CAP;
        history.drain(..overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn record(n: u32) -> SessionRecord {
        SessionRecord::new(
            DeckId::new("d1"),
            fixed_now(),
            SessionData {
                cards_studied: n,
                cards_correct: 0,
                accuracy: 0,
                deck_progress: 100.0,
            },
        )
    }

    #[test]
    fn record_flattens_session_data() {
        let value = serde_json::to_value(record(4)).unwrap();
        assert_eq!(value["deckId"], "d1");
        assert_eq!(value["cardsStudied"], 4);
        assert_eq!(value["deckProgress"], 100.0);
    }

    #[test]
    fn history_evicts_oldest_past_cap() {
        let mut history = Vec::new();
        for n in 0..=100 {
            push_capped(&mut history, record(n));
        }
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].data.cards_studied, 1);
        assert_eq!(history[99].data.cards_studied, 100);
    }
}
