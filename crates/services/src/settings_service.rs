use storage::PersistentStore;
use study_core::model::{Settings, SettingsDraft};

use crate::error::SettingsServiceError;

#[derive(Clone)]
pub struct SettingsService {
    store: PersistentStore,
}

impl SettingsService {
    #[must_use]
    pub fn new(store: PersistentStore) -> Self {
        Self { store }
    }

    /// Persisted settings, or defaults if missing or unreadable.
    pub async fn load(&self) -> Settings {
        self.store.settings().await
    }

    /// Validate `draft` over the current settings and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if validation fails or persistence fails.
    pub async fn save(&self, draft: SettingsDraft) -> Result<Settings, SettingsServiceError> {
        let current = self.store.settings().await;
        let settings = draft.apply_to(&current)?;
        self.store.save_settings(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{SettingsError, Theme};
    use study_core::time::fixed_clock;

    #[tokio::test]
    async fn saves_validated_settings() {
        let service = SettingsService::new(PersistentStore::in_memory(fixed_clock()));
        let saved = service
            .save(SettingsDraft {
                theme: Some(Theme::Dark),
                cards_per_session: Some(12),
                ..SettingsDraft::new()
            })
            .await
            .unwrap();
        assert_eq!(service.load().await, saved);
        assert_eq!(saved.cards_per_session(), 12);
    }

    #[tokio::test]
    async fn rejects_invalid_draft() {
        let service = SettingsService::new(PersistentStore::in_memory(fixed_clock()));
        let err = service
            .save(SettingsDraft {
                cards_per_session: Some(51),
                ..SettingsDraft::new()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsServiceError::Settings(SettingsError::InvalidCardsPerSession(51))
        ));
    }
}
