use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::{Config, Environment, MAX_RETENTION_HOURS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Loads a config file, applies `ZIPFAST_*` environment overrides and
/// validates the result.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;

    Ok(config)
}

/// Builds a config from defaults and `ZIPFAST_*` environment variables only.
pub fn config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config = parse_config(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    Ok(serde_json::from_value(json_value)?)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn parse_env<T: FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value,
    })
}

/// Applies environment overrides on top of `config`. `lookup` is
/// `std::env::var` in production and a map in tests.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ZIPFAST_ENV") {
        config.environment = Environment::from_str(&v).map_err(|_| ConfigError::InvalidEnv {
            name: "ZIPFAST_ENV".to_string(),
            value: v,
        })?;
    }
    if let Some(v) = lookup("ZIPFAST_HOST") {
        config.server.host = v;
    }
    if let Some(v) = lookup("ZIPFAST_PORT") {
        config.server.port = parse_env("ZIPFAST_PORT", v)?;
    }
    if let Some(v) = lookup("ZIPFAST_CORS_ORIGIN") {
        config.server.cors_origin = Some(v.trim_end_matches('/').to_string());
    }
    if let Some(v) = lookup("ZIPFAST_DATABASE_PATH") {
        config.database.path = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("ZIPFAST_UPLOAD_DIR") {
        config.storage.upload_directory = PathBuf::from(v);
    }
    if let Some(v) = lookup("ZIPFAST_COMPRESSED_DIR") {
        config.storage.compressed_directory = PathBuf::from(v);
    }
    if let Some(v) = lookup("ZIPFAST_MAX_UPLOAD_BYTES") {
        config.storage.max_upload_bytes = parse_env("ZIPFAST_MAX_UPLOAD_BYTES", v)?;
    }
    if let Some(v) = lookup("ZIPFAST_RETENTION_HOURS") {
        config.retention.hours = parse_env("ZIPFAST_RETENTION_HOURS", v)?;
    }
    if let Some(v) = lookup("ZIPFAST_LOG_LEVEL") {
        config.logging.level = v;
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.dispatcher.batch_size == 0 {
        return invalid("dispatcher.batchSize must be at least 1");
    }
    if config.dispatcher.interval_secs == 0 {
        return invalid("dispatcher.intervalSecs must be at least 1");
    }
    if config.retention.hours == 0 {
        return invalid("retention.hours must be at least 1");
    }
    if config.retention.hours > MAX_RETENTION_HOURS {
        return Err(ConfigError::Validation {
            message: format!("retention.hours must be at most {}", MAX_RETENTION_HOURS),
        });
    }
    config.retention.window()?;
    if config.retention.sweep_interval_secs == Some(0) {
        return invalid("retention.sweepIntervalSecs must be at least 1");
    }
    if config.storage.max_upload_bytes == 0 {
        return invalid("storage.maxUploadBytes must be at least 1");
    }
    if config.storage.max_upload_bytes > usize::MAX as u64 {
        return invalid("storage.maxUploadBytes does not fit in memory addressing");
    }
    // The sweeper treats unreferenced files in both directories as orphans.
    if config.storage.upload_directory == config.storage.compressed_directory {
        return invalid("storage.uploadDirectory and storage.compressedDirectory must differ");
    }

    Ok(())
}
