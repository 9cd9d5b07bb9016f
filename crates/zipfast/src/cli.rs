//! Command-line arguments of the `zipfast` binary.

use std::path::PathBuf;

use clap::Parser;

/// Media compression service with job tracking and retention cleanup.
#[derive(Parser, Debug, Clone)]
#[command(name = "zipfast", version, about)]
pub struct Cli {
    /// JSON config file. Without it, defaults and `ZIPFAST_*` variables apply.
    #[arg(long, env = "ZIPFAST_CONFIG", help = "Configuration file path")]
    pub config: Option<PathBuf>,
}
