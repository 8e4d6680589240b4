use std::env;
use std::time::Duration;

use study_core::study::DEFAULT_ADVANCE_DELAY_MS;
use url::Url;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "STUDY_DB_URL";
pub const API_URL_VAR: &str = "STUDY_API_URL";
pub const ADVANCE_DELAY_VAR: &str = "STUDY_ADVANCE_DELAY_MS";

pub const DEFAULT_DB_URL: &str = "sqlite://study-buddy.sqlite3?mode=rwc";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

/// Runtime configuration for the service layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    /// `None` runs without the remote collaborator.
    pub api_base_url: Option<Url>,
    pub advance_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            api_base_url: Url::parse(DEFAULT_API_URL).ok(),
            advance_delay: Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS),
        }
    }
}

impl AppConfig {
    /// Read configuration from `STUDY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for unset names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(db_url) = lookup(DB_URL_VAR) {
            config = config.with_db_url(db_url)?;
        }
        if let Some(api_url) = lookup(API_URL_VAR) {
            config = config.with_api_url(&api_url)?;
        }
        if let Some(delay) = lookup(ADVANCE_DELAY_VAR) {
            let millis = delay
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidAdvanceDelay(delay.clone()))?;
            config.advance_delay = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Replace the database URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyDatabaseUrl` for a blank value.
    pub fn with_db_url(mut self, db_url: impl Into<String>) -> Result<Self, ConfigError> {
        let db_url = db_url.into().trim().to_owned();
        if db_url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        self.db_url = db_url;
        Ok(self)
    }

    /// Replace the remote base URL; `off` or an empty value disables the remote.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidApiUrl` if the value does not parse.
    pub fn with_api_url(mut self, value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("off") {
            self.api_base_url = None;
            return Ok(self);
        }
        let url = Url::parse(value).map_err(|source| ConfigError::InvalidApiUrl {
            value: value.to_owned(),
            source,
        })?;
        self.api_base_url = Some(url);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.advance_delay, Duration::from_millis(500));
        assert_eq!(
            config.api_base_url.unwrap().as_str(),
            "http://127.0.0.1:5000/api"
        );
    }

    #[test]
    fn off_disables_remote() {
        let config = AppConfig::from_lookup(lookup(&[(API_URL_VAR, "off")])).unwrap();
        assert!(config.api_base_url.is_none());
        let config = AppConfig::from_lookup(lookup(&[(API_URL_VAR, "")])).unwrap();
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (DB_URL_VAR, "sqlite::memory:"),
            (API_URL_VAR, "https://example.test/api"),
            (ADVANCE_DELAY_VAR, "0"),
        ]))
        .unwrap();
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.advance_delay, Duration::ZERO);
        assert_eq!(
            config.api_base_url.unwrap().host_str(),
            Some("example.test")
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(API_URL_VAR, "not a url")])),
            Err(ConfigError::InvalidApiUrl { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(ADVANCE_DELAY_VAR, "soon")])),
            Err(ConfigError::InvalidAdvanceDelay(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(DB_URL_VAR, "  ")])),
            Err(ConfigError::EmptyDatabaseUrl)
        ));
    }
}
