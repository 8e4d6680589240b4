use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use study_core::Clock;
use study_core::model::{
    Deck, DeckId, SessionRecord, Settings, UserId, UserProfile, push_capped,
};

use crate::records::DeckRecord;
use crate::repository::{DocumentRepository, InMemoryRepository, StorageError, ser};
use crate::snapshot::{Backup, SNAPSHOT_VERSION, Snapshot, StorageUsage};

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

/// Prefix shared by every document this store owns.
pub const KEY_PREFIX: &str = "study_buddy_";
pub const DECKS_KEY: &str = "study_buddy_decks";
pub const USER_KEY: &str = "study_buddy_user";
pub const SETTINGS_KEY: &str = "study_buddy_settings";
pub const SESSIONS_KEY: &str = "study_buddy_sessions";

const PROBE_KEY: &str = "__storage_test__";

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Typed persistence for decks, the user profile, settings and the session log.
///
/// Every call is a complete read-modify-write of one document. Malformed stored
/// data never reaches callers: reads fall back to defaults and log a warning.
/// When the backend failed its availability probe the store is degraded:
/// reads return defaults and writes return `StorageError::Unavailable`.
#[derive(Clone)]
pub struct PersistentStore {
    repo: Option<Arc<dyn DocumentRepository>>,
    clock: Clock,
}

impl PersistentStore {
    /// Open a store over `repo`, probing it with a throwaway write.
    pub async fn open(repo: Arc<dyn DocumentRepository>, clock: Clock) -> Self {
        let available = match probe(repo.as_ref()).await {
            Ok(()) => true,
            Err(err) => {
                warn!("storage probe failed, running without persistence: {err}");
                false
            }
        };
        Self {
            repo: available.then_some(repo),
            clock,
        }
    }

    /// A store backed by a fresh in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self {
            repo: Some(Arc::new(InMemoryRepository::new())),
            clock,
        }
    }

    /// A store that persists nothing.
    #[must_use]
    pub fn unavailable(clock: Clock) -> Self {
        Self { repo: None, clock }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.repo.is_some()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    // ─── Decks ─────────────────────────────────────────────────────────────────

    /// Every stored deck that decodes cleanly, in stored order.
    pub async fn all_decks(&self) -> Vec<Deck> {
        let entries = match self.read_list(DECKS_KEY).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to load decks: {err}");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| {
                let record = serde_json::from_value::<DeckRecord>(entry)
                    .map_err(|err| warn!("skipping malformed deck entry: {err}"))
                    .ok()?;
                let id = record.id.clone();
                record
                    .into_deck()
                    .map_err(|err| warn!("skipping invalid deck {id}: {err}"))
                    .ok()
            })
            .collect()
    }

    pub async fn deck_by_id(&self, id: &DeckId) -> Option<Deck> {
        self.all_decks()
            .await
            .into_iter()
            .find(|deck| deck.id() == id)
    }

    /// Insert `deck`, or shallow-merge it over the stored entry with the same id.
    ///
    /// Keys present only in the stored entry survive the merge.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or the write fails.
    pub async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let repo = self.repo()?;
        let mut entries = self.read_list(DECKS_KEY).await?;
        let incoming = to_object(&DeckRecord::from_deck(deck))?;

        let existing = entries
            .iter_mut()
            .find(|entry| entry.get("id").and_then(Value::as_str) == Some(deck.id().as_str()));
        match existing {
            Some(Value::Object(old)) => {
                debug!("updating deck {}", deck.id());
                old.extend(incoming);
            }
            Some(other) => *other = Value::Object(incoming),
            None => {
                debug!("adding deck {}", deck.id());
                entries.push(Value::Object(incoming));
            }
        }

        write_json(repo, DECKS_KEY, &entries).await
    }

    /// Same as [`save_deck`](Self::save_deck).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or the write fails.
    pub async fn update_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        self.save_deck(deck).await
    }

    /// Remove the deck with `id`; a missing id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or the write fails.
    pub async fn delete_deck(&self, id: &DeckId) -> Result<(), StorageError> {
        let repo = self.repo()?;
        let mut entries = self.read_list(DECKS_KEY).await?;
        let before = entries.len();
        entries.retain(|entry| entry.get("id").and_then(Value::as_str) != Some(id.as_str()));
        if entries.len() == before {
            return Ok(());
        }
        info!("deleted deck {id}");
        write_json(repo, DECKS_KEY, &entries).await
    }

    // ─── Profile ───────────────────────────────────────────────────────────────

    /// The stored profile, creating and persisting a default one when absent.
    ///
    /// Backend failures fall back to an unsaved default; use
    /// [`load_profile`](Self::load_profile) before writing a profile back.
    pub async fn profile(&self) -> UserProfile {
        self.load_profile().await.unwrap_or_else(|err| {
            warn!("failed to load profile, using defaults: {err}");
            UserProfile::fresh(self.clock.now())
        })
    }

    /// The stored profile, creating and persisting a default one when absent.
    ///
    /// A document that does not decode as a profile yields an unsaved default.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn load_profile(&self) -> Result<UserProfile, StorageError> {
        match self.read_typed::<UserProfile>(USER_KEY).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                let profile = UserProfile::fresh(self.clock.now());
                if let Ok(repo) = self.repo() {
                    if let Err(err) = write_json(repo, USER_KEY, &profile).await {
                        warn!("failed to persist new profile: {err}");
                    } else {
                        info!("created profile {}", profile.id);
                    }
                }
                Ok(profile)
            }
            Err(StorageError::Serialization(err)) => {
                warn!("stored profile is malformed, using defaults: {err}");
                Ok(UserProfile::fresh(self.clock.now()))
            }
            Err(err) => Err(err),
        }
    }

    /// Shallow-merge `profile` over the stored document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or the write fails.
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        self.merge_document(USER_KEY, profile).await
    }

    // ─── Settings ──────────────────────────────────────────────────────────────

    pub async fn settings(&self) -> Settings {
        match self.read_typed::<Settings>(SETTINGS_KEY).await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                warn!("failed to load settings, using defaults: {err}");
                Settings::default()
            }
        }
    }

    /// Shallow-merge `settings` over the stored document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or the write fails.
    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.merge_document(SETTINGS_KEY, settings).await
    }

    // ─── Session history ───────────────────────────────────────────────────────

    /// Session log in insertion order, oldest first.
    pub async fn session_history(&self) -> Vec<SessionRecord> {
        match self.read_list(SESSIONS_KEY).await {
            Ok(entries) => decode_records(entries),
            Err(err) => {
                warn!("failed to load session history: {err}");
                Vec::new()
            }
        }
    }

    /// Append `record`, evicting the oldest entries past the history cap.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable, the stored log
    /// cannot be read, or the write fails. The log is left untouched on error.
    pub async fn append_session(&self, record: SessionRecord) -> Result<(), StorageError> {
        let repo = self.repo()?;
        let mut history = decode_records(self.read_list(SESSIONS_KEY).await?);
        push_capped(&mut history, record);
        write_json(repo, SESSIONS_KEY, &history).await
    }

    // ─── Export / import ───────────────────────────────────────────────────────

    /// Snapshot of all four documents.
    pub async fn export_all(&self) -> Snapshot {
        let decks = self.all_decks().await.iter().map(DeckRecord::from_deck).collect();
        Snapshot {
            decks: Some(decks),
            user_data: Some(self.profile().await),
            settings: Some(self.settings().await),
            sessions: Some(self.session_history().await),
            export_date: self.clock.now(),
            version: SNAPSHOT_VERSION.to_owned(),
        }
    }

    /// Replace every document present in `snapshot`; absent ones are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or a write fails.
    pub async fn import_all(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let repo = self.repo()?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!("importing snapshot with unknown version {}", snapshot.version);
        }
        if let Some(decks) = &snapshot.decks {
            write_json(repo, DECKS_KEY, decks).await?;
        }
        if let Some(profile) = &snapshot.user_data {
            write_json(repo, USER_KEY, profile).await?;
        }
        if let Some(settings) = &snapshot.settings {
            write_json(repo, SETTINGS_KEY, settings).await?;
        }
        if let Some(sessions) = &snapshot.sessions {
            write_json(repo, SESSIONS_KEY, sessions).await?;
        }
        info!("imported snapshot exported at {}", snapshot.export_date);
        Ok(())
    }

    /// Serialized snapshot tagged with a backup id and this device's profile id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the backup cannot be encoded.
    pub async fn backup(&self) -> Result<String, StorageError> {
        let snapshot = self.export_all().await;
        let device_id = snapshot
            .user_data
            .as_ref()
            .map_or_else(UserId::generate, |profile| profile.id.clone());
        let backup = Backup {
            backup_id: format!("backup_{}", snapshot.export_date.timestamp_millis()),
            device_id,
            snapshot,
        };
        serde_json::to_string(&backup).map_err(ser)
    }

    /// Parse a backup or snapshot string and import it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed input, or any
    /// error from [`import_all`](Self::import_all).
    pub async fn restore(&self, backup: &str) -> Result<(), StorageError> {
        let snapshot: Snapshot = serde_json::from_str(backup).map_err(ser)?;
        self.import_all(&snapshot).await
    }

    /// Remove every document owned by this store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unavailable or a removal fails.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let repo = self.repo()?;
        for key in repo.list_keys().await? {
            if key.starts_with(KEY_PREFIX) {
                repo.remove_document(&key).await?;
            }
        }
        info!("cleared all study data");
        Ok(())
    }

    /// Bytes held by this store's keys and documents.
    pub async fn usage(&self) -> StorageUsage {
        let Ok(repo) = self.repo() else {
            return StorageUsage::default();
        };
        let keys = match repo.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("failed to list documents: {err}");
                return StorageUsage::default();
            }
        };

        let mut bytes = 0_u64;
        for key in keys.iter().filter(|key| key.starts_with(KEY_PREFIX)) {
            match repo.read_document(key).await {
                Ok(Some(value)) => bytes += (key.len() + value.len()) as u64,
                Ok(None) => {}
                Err(err) => warn!("failed to read {key}: {err}"),
            }
        }
        StorageUsage { bytes }
    }

    // ─── Internals ─────────────────────────────────────────────────────────────

    fn repo(&self) -> Result<&dyn DocumentRepository, StorageError> {
        self.repo.as_deref().ok_or(StorageError::Unavailable)
    }

    /// Raw JSON under `key`; malformed text reads as absent.
    async fn read_value(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let Ok(repo) = self.repo() else {
            return Ok(None);
        };
        let Some(text) = repo.read_document(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("discarding malformed document {key}: {err}");
                Ok(None)
            }
        }
    }

    async fn read_list(&self, key: &str) -> Result<Vec<Value>, StorageError> {
        match self.read_value(key).await? {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => {
                warn!("document {key} is not a list, treating it as empty");
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn read_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.read_value(key)
            .await?
            .map(|value| serde_json::from_value(value).map_err(ser))
            .transpose()
    }

    async fn merge_document<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let repo = self.repo()?;
        let incoming = to_object(value)?;
        let merged = match self.read_value(key).await? {
            Some(Value::Object(mut old)) => {
                old.extend(incoming);
                old
            }
            _ => incoming,
        };
        write_json(repo, key, &merged).await
    }
}

fn decode_records(entries: Vec<Value>) -> Vec<SessionRecord> {
    entries
        .into_iter()
        .filter_map(|entry| {
            serde_json::from_value(entry)
                .map_err(|err| warn!("skipping malformed session record: {err}"))
                .ok()
        })
        .collect()
}

async fn probe(repo: &dyn DocumentRepository) -> Result<(), StorageError> {
    repo.write_document(PROBE_KEY, PROBE_KEY).await?;
    repo.remove_document(PROBE_KEY).await
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, StorageError> {
    match serde_json::to_value(value).map_err(ser)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

async fn write_json<T: Serialize + ?Sized>(
    repo: &dyn DocumentRepository,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string(value).map_err(ser)?;
    repo.write_document(key, &text).await
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
