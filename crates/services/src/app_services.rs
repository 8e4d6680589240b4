use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use storage::PersistentStore;

use crate::Clock;
use crate::config::AppConfig;
use crate::deck_service::DeckLibraryService;
use crate::error::AppServicesError;
use crate::remote::{DeckProvider, HttpDeckProvider, OfflineProvider};
use crate::sessions::StudyLoopService;
use crate::settings_service::SettingsService;
use crate::statistics::StatisticsEngine;

/// Assembles app-facing services over one store and one remote.
#[derive(Clone)]
pub struct AppServices {
    store: PersistentStore,
    remote: Arc<dyn DeckProvider>,
    statistics: Arc<StatisticsEngine>,
    library: Arc<DeckLibraryService>,
    study_loop: Arc<StudyLoopService>,
    settings: Arc<SettingsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the configured remote.
    ///
    /// A store that fails its availability probe still yields services; they
    /// run degraded with defaults. The remote user is registered up front;
    /// failure there is logged and the remote calls fail individually later.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated,
    /// or if the HTTP client cannot be built.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let store = PersistentStore::sqlite(&config.db_url, clock).await?;
        let remote: Arc<dyn DeckProvider> = match &config.api_base_url {
            Some(url) => {
                info!("using remote deck service at {url}");
                let provider = HttpDeckProvider::new(url, clock)?;
                if let Err(err) = provider.register_user().await {
                    warn!("remote user registration failed, continuing offline-first: {err}");
                }
                Arc::new(provider)
            }
            None => {
                info!("remote deck service disabled");
                Arc::new(OfflineProvider)
            }
        };
        Ok(Self::from_parts(store, remote, clock, config.advance_delay))
    }

    /// Wire services over an existing store and remote.
    #[must_use]
    pub fn from_parts(
        store: PersistentStore,
        remote: Arc<dyn DeckProvider>,
        clock: Clock,
        advance_delay: Duration,
    ) -> Self {
        let statistics = StatisticsEngine::new(clock, store.clone());
        let library = DeckLibraryService::new(
            store.clone(),
            Arc::clone(&remote),
            statistics.clone(),
        );
        let study_loop = StudyLoopService::new(
            clock,
            store.clone(),
            Arc::clone(&remote),
            statistics.clone(),
        )
        .with_advance_delay(advance_delay);
        let settings = SettingsService::new(store.clone());

        Self {
            store,
            remote,
            statistics: Arc::new(statistics),
            library: Arc::new(library),
            study_loop: Arc::new(study_loop),
            settings: Arc::new(settings),
        }
    }

    #[must_use]
    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    #[must_use]
    pub fn remote(&self) -> Arc<dyn DeckProvider> {
        Arc::clone(&self.remote)
    }

    #[must_use]
    pub fn statistics(&self) -> Arc<StatisticsEngine> {
        Arc::clone(&self.statistics)
    }

    #[must_use]
    pub fn library(&self) -> Arc<DeckLibraryService> {
        Arc::clone(&self.library)
    }

    #[must_use]
    pub fn study_loop(&self) -> Arc<StudyLoopService> {
        Arc::clone(&self.study_loop)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::time::fixed_clock;

    #[tokio::test]
    async fn from_parts_shares_one_store() {
        let store = PersistentStore::in_memory(fixed_clock());
        let services = AppServices::from_parts(
            store,
            Arc::new(OfflineProvider),
            fixed_clock(),
            Duration::ZERO,
        );
        assert_eq!(services.study_loop().advance_delay(), Duration::ZERO);

        let profile = services.statistics().profile().await;
        assert_eq!(services.store().profile().await.id, profile.id);
    }
}
