pub mod cleanup;
pub mod cli;
pub mod compressor;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod job;
pub mod sanitize;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use cleanup::{RetentionSweeper, SweepReport, SweepScheduler};
pub use compressor::{Compressor, CompressorRegistry, MediaCompressor};
pub use config::{load_config, Config};
pub use error::{CompressError, ConfigError, LoggingError, Result, StoreError, ZipfastError};
pub use job::{Job, JobOptions, JobStatus, JobStore, MediaKind, NewJob};
pub use storage::FileStorage;
pub use worker::{Dispatcher, JobProcessor, ProcessOutcome, WorkerPool};
