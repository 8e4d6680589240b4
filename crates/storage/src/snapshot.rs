use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use study_core::model::{SessionRecord, Settings, UserId, UserProfile};

use crate::records::DeckRecord;

/// Format version written into every export.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Export bundle of every local document.
///
/// On import, absent documents are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decks: Option<Vec<DeckRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionRecord>>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl Snapshot {
    /// An empty snapshot stamped at `at`; importing it changes nothing.
    #[must_use]
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            decks: None,
            user_data: None,
            settings: None,
            sessions: None,
            export_date: at,
            version: SNAPSHOT_VERSION.to_owned(),
        }
    }
}

/// A snapshot tagged with a backup id and the device (profile) it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub backup_id: String,
    pub device_id: UserId,
}

/// Bytes used by the store's documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub bytes: u64,
}

impl StorageUsage {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn kilobytes(&self) -> f64 {
        self.bytes as f64 / 1024.0
    }

    #[must_use]
    pub fn megabytes(&self) -> f64 {
        self.kilobytes() / 1024.0
    }
}
