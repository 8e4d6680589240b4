use chrono::{DateTime, Utc};
use log::{info, warn};
use storage::PersistentStore;
use storage::repository::StorageError;
use study_core::model::{DeckId, SessionData, SessionRecord, UserProfile};
use study_core::stats;

use crate::Clock;

/// Outcome of recording one session.
///
/// The in-memory profile is always updated; persistence failures are listed
/// rather than rolled back.
#[derive(Debug)]
pub struct RecordedSession {
    pub profile: UserProfile,
    pub record: SessionRecord,
    pub failures: Vec<StorageError>,
}

impl RecordedSession {
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Updates account statistics and the session log.
#[derive(Clone)]
pub struct StatisticsEngine {
    clock: Clock,
    store: PersistentStore,
}

impl StatisticsEngine {
    #[must_use]
    pub fn new(clock: Clock, store: PersistentStore) -> Self {
        Self { clock, store }
    }

    /// Record a completed session against the stored profile.
    ///
    /// When the profile cannot be read the session still goes to the history
    /// log, but the stored profile is left alone and the read error is listed
    /// in `failures`.
    pub async fn record_completion(&self, deck_id: &DeckId, data: SessionData) -> RecordedSession {
        match self.store.load_profile().await {
            Ok(profile) => self.record_session(&profile, deck_id, data).await,
            Err(err) => {
                warn!("profile unavailable, keeping session on {deck_id} in history only: {err}");
                let now = self.clock.now();
                let record = SessionRecord::new(deck_id.clone(), now, data);
                let mut failures = vec![err];
                if let Err(err) = self.store.append_session(record.clone()).await {
                    warn!("failed to append session record for {deck_id}: {err}");
                    failures.push(err);
                }
                RecordedSession {
                    profile: stats::apply_session(&UserProfile::fresh(now), &data, now),
                    record,
                    failures,
                }
            }
        }
    }

    /// Record a completed session at the current clock time.
    pub async fn record_session(
        &self,
        profile: &UserProfile,
        deck_id: &DeckId,
        data: SessionData,
    ) -> RecordedSession {
        self.record_session_at(profile, deck_id, data, self.clock.now())
            .await
    }

    /// Record a completed session at `now`.
    ///
    /// The profile save and the history append are attempted independently.
    pub async fn record_session_at(
        &self,
        profile: &UserProfile,
        deck_id: &DeckId,
        data: SessionData,
        now: DateTime<Utc>,
    ) -> RecordedSession {
        let profile = stats::apply_session(profile, &data, now);
        let record = SessionRecord::new(deck_id.clone(), now, data);
        let mut failures = Vec::new();

        if let Err(err) = self.store.save_profile(&profile).await {
            warn!("failed to save profile after session on {deck_id}: {err}");
            failures.push(err);
        }
        if let Err(err) = self.store.append_session(record.clone()).await {
            warn!("failed to append session record for {deck_id}: {err}");
            failures.push(err);
        }

        info!(
            "recorded session on {deck_id}: accuracy {}%, streak {}",
            data.accuracy, profile.current_streak
        );
        RecordedSession {
            profile,
            record,
            failures,
        }
    }

    /// Count a newly created deck on the profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated profile cannot be saved.
    pub async fn record_deck_created(
        &self,
        profile: &UserProfile,
    ) -> Result<UserProfile, StorageError> {
        let profile = stats::apply_deck_created(profile);
        self.store.save_profile(&profile).await?;
        Ok(profile)
    }

    /// The stored profile, created on first access.
    pub async fn profile(&self) -> UserProfile {
        self.store.profile().await
    }

    /// Like [`profile`](Self::profile), but backend failures are returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored profile cannot be read.
    pub async fn load_profile(&self) -> Result<UserProfile, StorageError> {
        self.store.load_profile().await
    }

    /// Session log, oldest first.
    pub async fn history(&self) -> Vec<SessionRecord> {
        self.store.session_history().await
    }
}
