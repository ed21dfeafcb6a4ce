//! Configuration management for etalab.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "etalab";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "etalab.db";

/// Where the ML service and the PINN server listen by default.
const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ETALAB_`, sections split on `__`,
///    e.g. `ETALAB_PREDICTION__BASE_URL`)
/// 2. TOML config file at `~/.config/etalab/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// ETA prediction service configuration.
    pub prediction: PredictionConfig,
    /// Training data sync configuration.
    pub sync: SyncConfig,
    /// PINN dashboard configuration.
    pub dashboard: DashboardConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/etalab/etalab.db`
    pub database_path: Option<PathBuf>,
}

/// ETA prediction service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Base URL of the prediction API.
    pub base_url: String,
    /// Timeout of the liveness probe in milliseconds.
    pub health_timeout_ms: u64,
    /// Timeout of a prediction request in milliseconds.
    pub request_timeout_ms: u64,
    /// Never contact the service; always use the local formula.
    pub offline: bool,
}

/// Training data sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the training API.
    pub base_url: String,
    /// Pause between upload and retrain in milliseconds.
    pub retrain_delay_ms: u64,
    /// Valid training logs needed before the data counts as ready.
    pub min_training_logs: usize,
}

/// PINN dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the benchmark server.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            health_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
            offline: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            retrain_delay_ms: 1_500,
            min_training_logs: 5,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ETALAB_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        validate_url("prediction.base_url", &self.prediction.base_url)?;
        validate_url("sync.base_url", &self.sync.base_url)?;
        validate_url("dashboard.base_url", &self.dashboard.base_url)?;

        for (name, value) in [
            ("prediction.health_timeout_ms", self.prediction.health_timeout_ms),
            ("prediction.request_timeout_ms", self.prediction.request_timeout_ms),
            ("dashboard.request_timeout_ms", self.dashboard.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if self.sync.min_training_logs == 0 {
            return Err(Error::ConfigValidation {
                message: "sync.min_training_logs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the health probe timeout as a Duration.
    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.prediction.health_timeout_ms)
    }

    /// Get the prediction request timeout as a Duration.
    #[must_use]
    pub fn prediction_timeout(&self) -> Duration {
        Duration::from_millis(self.prediction.request_timeout_ms)
    }

    /// Get the pause between upload and retrain as a Duration.
    #[must_use]
    pub fn retrain_delay(&self) -> Duration {
        Duration::from_millis(self.sync.retrain_delay_ms)
    }

    /// Get the dashboard request timeout as a Duration.
    #[must_use]
    pub fn dashboard_timeout(&self) -> Duration {
        Duration::from_millis(self.dashboard.request_timeout_ms)
    }
}

fn validate_url(name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| Error::ConfigValidation {
        message: format!("{name} is not a valid URL ({value}): {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::ConfigValidation {
            message: format!("{name} must use http or https, got {}", parsed.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.prediction.base_url, "http://localhost:8000");
        assert!(!config.prediction.offline);
        assert_eq!(config.sync.min_training_logs, 5);
    }

    #[test]
    fn test_default_timeouts() {
        let config = Config::default();

        assert_eq!(config.health_timeout(), Duration::from_secs(3));
        assert_eq!(config.prediction_timeout(), Duration::from_secs(10));
        assert_eq!(config.retrain_delay(), Duration::from_millis(1_500));
        assert_eq!(config.dashboard_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.prediction.base_url = "not a url".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("prediction.base_url"));
    }

    #[test]
    fn test_validate_non_http_scheme() {
        let mut config = Config::default();
        config.dashboard.base_url = "ws://localhost:8000".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.prediction.health_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("health_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_min_training_logs() {
        let mut config = Config::default();
        config.sync.min_training_logs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("etalab.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("etalab"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_toml_overrides() {
        let path = std::env::temp_dir().join(format!("etalab-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[prediction]\nbase_url = \"http://ml.internal:9000\"\noffline = true\n\n[sync]\nretrain_delay_ms = 10\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.prediction.base_url, "http://ml.internal:9000");
        assert!(config.prediction.offline);
        assert_eq!(config.prediction.health_timeout_ms, 3_000);
        assert_eq!(config.retrain_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_prediction_config_deserialize() {
        let json = r#"{"base_url": "https://eta.example.com", "offline": true}"#;
        let prediction: PredictionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(prediction.base_url, "https://eta.example.com");
        assert!(prediction.offline);
        assert_eq!(prediction.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }
}
