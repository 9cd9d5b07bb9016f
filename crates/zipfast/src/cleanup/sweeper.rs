//! Time-based retention of jobs and their files.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::error::{StoreError, ZipfastError};
use crate::job::{Job, JobStore};
use crate::sanitize::redact_path;
use crate::storage::FileStorage;

/// Counts from one sweep. Failures are per item and never abort the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs_deleted: usize,
    pub job_failures: usize,
    pub orphans_deleted: usize,
    pub orphan_failures: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct RetentionSweeper {
    store: JobStore,
    storage: FileStorage,
    retention: chrono::Duration,
}

impl RetentionSweeper {
    pub fn new(store: JobStore, storage: FileStorage, retention: chrono::Duration) -> Self {
        Self {
            store,
            storage,
            retention,
        }
    }

    pub fn sweep(&self) -> Result<SweepReport, StoreError> {
        self.sweep_at(Utc::now())
    }

    /// Deletes jobs created before `now - retention` together with their
    /// files, then unreferenced files older than the same cutoff.
    ///
    /// Only a failure to list expired jobs is returned as an error.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            log::warn!(
                "Retention window of {} reaches before the earliest date, nothing to sweep",
                self.retention
            );
            return Ok(SweepReport::default());
        };
        let _span = tracing::info_span!("retention.sweep", cutoff = %cutoff).entered();

        let mut report = SweepReport::default();

        for job in self.store.list_created_before(cutoff)? {
            match self.delete_job(&job) {
                Ok(true) => report.jobs_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    log::error!("Failed to clean up job {}: {}", job.id, e);
                    report.job_failures += 1;
                }
            }
        }

        for dir in [
            self.storage.upload_directory(),
            self.storage.compressed_directory(),
        ] {
            self.sweep_orphans(dir, cutoff, &mut report);
        }

        if !report.is_empty() {
            log::info!(
                "Retention sweep: {} jobs deleted ({} failed), {} orphaned files deleted ({} failed)",
                report.jobs_deleted,
                report.job_failures,
                report.orphans_deleted,
                report.orphan_failures
            );
        }

        Ok(report)
    }

    /// Removes the job's files, then its row. The row is kept when a file
    /// cannot be removed so the next sweep retries it.
    fn delete_job(&self, job: &Job) -> Result<bool, ZipfastError> {
        let files = std::iter::once(job.source_path.as_path()).chain(job.result_path.as_deref());
        for path in files {
            if FileStorage::remove_if_exists(path)? {
                log::debug!("Removed {}", redact_path(path));
            }
        }

        let deleted = self.store.delete(job.id)?;
        if deleted {
            log::debug!("Deleted expired job {} ({})", job.id, job.external_id);
        }
        Ok(deleted)
    }

    fn sweep_orphans(&self, dir: &Path, cutoff: DateTime<Utc>, report: &mut SweepReport) {
        if !dir.exists() {
            return;
        }

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();

            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => DateTime::<Utc>::from(modified),
                Ok(Err(e)) => {
                    log::warn!("No modification time for {}: {}", redact_path(path), e);
                    continue;
                }
                Err(e) => {
                    log::warn!("Failed to stat {}: {}", redact_path(path), e);
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match self.store.references_path(path) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    log::error!("Failed to check {}: {}", redact_path(path), e);
                    report.orphan_failures += 1;
                    continue;
                }
            }

            match FileStorage::remove_if_exists(path) {
                Ok(_) => {
                    log::debug!("Removed orphaned file {}", redact_path(path));
                    report.orphans_deleted += 1;
                }
                Err(e) => {
                    log::error!("{}", e);
                    report.orphan_failures += 1;
                }
            }
        }
    }
}

/// Runs the sweeper on a fixed interval.
pub struct SweepScheduler {
    sweeper: Arc<RetentionSweeper>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    pub fn new(sweeper: Arc<RetentionSweeper>, interval: Duration) -> Self {
        Self {
            sweeper,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the sweep loop. The first sweep runs one interval after start,
    /// or earlier on a trigger.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let sweeper = Arc::clone(&self.sweeper);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // skip immediate first tick

            log::info!("Retention sweeper started (every {:?})", interval);

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        log::info!("Manual retention sweep triggered");
                    },
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let sweeper = Arc::clone(&sweeper);
                match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("Retention sweep failed: {}", e),
                    Err(e) => log::error!("Retention sweep task panicked: {}", e),
                }
            }

            log::info!("Retention sweeper stopped");
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
