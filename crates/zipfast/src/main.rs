use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::broadcast;

use zipfast::cleanup::{RetentionSweeper, SweepScheduler};
use zipfast::cli::Cli;
use zipfast::config::{config_from_env, load_config, Config};
use zipfast::db::{default_database_path, Database};
use zipfast::http::{self, AppState};
use zipfast::worker::{Dispatcher, JobProcessor, WorkerPool};
use zipfast::{CompressorRegistry, FileStorage, JobStore, ZipfastError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path),
        None => config_from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("zipfast: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = zipfast::telemetry::init_logging(&config.logging) {
        eprintln!("zipfast: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), ZipfastError> {
    info!(
        "Starting zipfast v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    let db_path = match config.database.path.clone().or_else(default_database_path) {
        Some(path) => path,
        None => PathBuf::from("zipfast.db"),
    };
    let store = JobStore::new(Database::open(&db_path)?);

    let storage = FileStorage::new(
        &config.storage.upload_directory,
        &config.storage.compressed_directory,
    );
    storage.ensure_directories()?;

    if config.dispatcher.recover_interrupted {
        let requeued = store.requeue_interrupted()?;
        if requeued > 0 {
            warn!("Requeued {} jobs interrupted by the previous shutdown", requeued);
        }
    }

    let compressor = Arc::new(CompressorRegistry::new(&config.tools));
    let processor = Arc::new(JobProcessor::new(store.clone(), storage.clone(), compressor));
    let pool = Arc::new(WorkerPool::new(
        processor,
        config.dispatcher.batch_size as usize,
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        Arc::clone(&pool),
        config.dispatcher.batch_size,
        config.dispatcher.interval(),
    ));
    let (dispatch_tx, dispatch_rx) = broadcast::channel(16);
    let dispatcher_handle = dispatcher.start(dispatch_rx);

    let sweeper = Arc::new(RetentionSweeper::new(
        store.clone(),
        storage.clone(),
        config.retention.window()?,
    ));
    let sweep_scheduler =
        SweepScheduler::new(sweeper, config.retention.sweep_interval(config.environment));
    let (sweep_tx, sweep_rx) = broadcast::channel(16);
    let sweeper_handle = sweep_scheduler.start(sweep_rx);

    let app = http::router(AppState::new(store, storage, Arc::clone(&pool)), &config);
    let served = http::serve(&config, app, shutdown_signal()).await;

    dispatcher.stop();
    sweep_scheduler.stop();
    let _ = dispatch_tx.send(());
    let _ = sweep_tx.send(());
    for handle in [dispatcher_handle, sweeper_handle] {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    pool.shutdown();
    info!("Waiting for running compressions to finish...");
    pool.wait_idle().await;
    info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
