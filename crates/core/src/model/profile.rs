use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// Account-level study statistics for the single local user.
///
/// Counters default to zero when a stored document omits them, so
/// profiles written by older versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub study_sessions: u32,
    #[serde(default)]
    pub total_cards: u32,
    #[serde(default)]
    pub total_decks: u32,
    /// Session-weighted running mean, 0-100.
    #[serde(default)]
    pub average_accuracy: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub is_premium: bool,
    pub last_activity: DateTime<Utc>,
}

impl UserProfile {
    /// A fresh profile created at `now`.
    #[must_use]
    pub fn new(id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            study_sessions: 0,
            total_cards: 0,
            total_decks: 0,
            average_accuracy: 0,
            longest_streak: 0,
            current_streak: 0,
            is_premium: false,
            last_activity: now,
        }
    }

    /// A fresh profile with a newly generated id.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self::new(UserId::generate(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn profile_uses_camel_case_keys() {
        let profile = UserProfile::new(UserId::new("user_1"), fixed_now());
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["studySessions"], 0);
        assert_eq!(value["isPremium"], false);
        assert!(value.get("lastActivity").is_some());
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let json = r#"{
            "id": "user_abc",
            "createdAt": "2024-01-01T00:00:00Z",
            "studySessions": 3,
            "lastActivity": "2024-01-02T00:00:00Z"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.study_sessions, 3);
        assert_eq!(profile.total_decks, 0);
        assert_eq!(profile.current_streak, 0);
    }
}
