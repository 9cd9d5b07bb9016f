use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipfastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to bridge log records: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("Invalid log level '{level}': {source}")]
    Filter {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the job store on top of raw database failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error("A job with external id '{0}' already exists")]
    DuplicateId(String),

    #[error("No job found for '{0}'")]
    NotFound(String),

    #[error("Job {id} has an unreadable {field}: {reason}")]
    CorruptRow {
        id: i64,
        field: &'static str,
        reason: String,
    },
}

/// Failures of a single compression run. Recorded on the job, never propagated.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("{program} is not installed or not on PATH")]
    ToolNotFound { program: String },

    #[error("{program} exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Unsupported parameters: {0}")]
    UnsupportedParameters(String),

    #[error("No compressor registered for {0} files")]
    UnsupportedKind(String),

    #[error("Failed to read input '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Compression produced no output at '{0}'")]
    MissingOutput(PathBuf),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compression task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerError {
    #[error("All {0} compression workers are busy")]
    Saturated(usize),

    #[error("Worker pool is shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ZipfastError>;
