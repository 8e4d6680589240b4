#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod deck_service;
pub mod error;
pub mod remote;
pub mod sessions;
pub mod settings_service;
pub mod statistics;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use config::AppConfig;
pub use deck_service::{DeckLibraryService, DeckListing};
pub use error::{
    AppServicesError, ConfigError, LibraryError, RemoteError, SessionError, SettingsServiceError,
};
pub use remote::{DeckProvider, DeckUpdate, HttpDeckProvider, OfflineProvider, RemoteSessionId};
pub use sessions::{
    CompletionReport, StepOutcome, StudyContext, StudyEvent, StudyEventKind, StudyLoopService,
};
pub use settings_service::SettingsService;
pub use statistics::{RecordedSession, StatisticsEngine};
