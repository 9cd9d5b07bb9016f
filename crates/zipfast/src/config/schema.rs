use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Frontend origin allowed by CORS. No CORS headers are sent when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `~/.zipfast/data/zipfast.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_upload_directory")]
    pub upload_directory: PathBuf,
    #[serde(default = "default_compressed_directory")]
    pub compressed_directory: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_upload_directory() -> PathBuf {
    PathBuf::from("./temp/uploads")
}

fn default_compressed_directory() -> PathBuf {
    PathBuf::from("./temp/compressed")
}

fn default_max_upload_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_directory: default_upload_directory(),
            compressed_directory: default_compressed_directory(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    #[serde(default = "default_retention_hours")]
    pub hours: u64,
    /// Overrides the environment-based sweep schedule.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

fn default_retention_hours() -> u64 {
    2
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hours: default_retention_hours(),
            sweep_interval_secs: None,
        }
    }
}

/// Ten years. Keeps `now - window` far inside chrono's date range.
pub const MAX_RETENTION_HOURS: u64 = 87_600;

impl RetentionConfig {
    pub fn window(&self) -> Result<chrono::Duration, ConfigError> {
        i64::try_from(self.hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| ConfigError::Validation {
                message: format!("retention.hours {} is out of range", self.hours),
            })
    }

    /// Hourly in production, every 30 minutes in development.
    pub fn sweep_interval(&self, environment: Environment) -> Duration {
        match (self.sweep_interval_secs, environment) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Environment::Production) => Duration::from_secs(60 * 60),
            (None, Environment::Development) => Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherConfig {
    /// Pending jobs fetched per tick; also the number of concurrent compressions.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Requeue jobs left in `processing` by a previous run at startup.
    #[serde(default = "default_true")]
    pub recover_interrupted: bool,
}

fn default_batch_size() -> u32 {
    5
}

fn default_interval_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
            recover_interrupted: true,
        }
    }
}

impl DispatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ghostscript")]
    pub ghostscript: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ghostscript() -> String {
    if cfg!(windows) {
        "gswin64c".to_string()
    } else {
        "gs".to_string()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ghostscript: default_ghostscript(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `zipfast=debug,tower_http=info`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.upload_directory, PathBuf::from("./temp/uploads"));
        assert_eq!(config.storage.max_upload_bytes, 2_147_483_648);
        assert_eq!(config.retention.hours, 2);
        assert_eq!(config.dispatcher.batch_size, 5);
        assert_eq!(config.dispatcher.interval(), Duration::from_secs(10));
        assert!(config.dispatcher.recover_interrupted);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{ "storage": { "maxUploadBytes": 1024 }, "server": { "corsOrigin": "https://a.example" } }"#,
        )
        .unwrap();
        assert_eq!(config.storage.max_upload_bytes, 1024);
        assert_eq!(config.server.cors_origin.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_sweep_interval_by_environment() {
        let retention = RetentionConfig::default();
        assert_eq!(
            retention.sweep_interval(Environment::Production),
            Duration::from_secs(3600)
        );
        assert_eq!(
            retention.sweep_interval(Environment::Development),
            Duration::from_secs(1800)
        );

        let custom = RetentionConfig {
            hours: 2,
            sweep_interval_secs: Some(5),
        };
        assert_eq!(
            custom.sweep_interval(Environment::Production),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_retention_window() {
        let retention = RetentionConfig::default();
        assert_eq!(retention.window().unwrap(), chrono::Duration::hours(2));

        let huge = RetentionConfig {
            hours: 3_000_000_000_000,
            sweep_interval_secs: None,
        };
        assert!(matches!(huge.window(), Err(ConfigError::Validation { .. })));

        let unrepresentable = RetentionConfig {
            hours: u64::MAX,
            sweep_interval_secs: None,
        };
        assert!(unrepresentable.window().is_err());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }
}
