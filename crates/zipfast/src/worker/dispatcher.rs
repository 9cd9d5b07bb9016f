//! Periodic pickup of pending jobs.
//!
//! Each tick hands up to `batch_size` pending jobs to the worker pool and
//! returns immediately; compressions never delay the next tick. The dispatcher
//! keeps no record of what it submitted: a job fetched twice is claimed once
//! thanks to the `pending -> processing` guard in the job store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{StoreError, WorkerError};
use crate::job::{JobStatus, JobStore};
use crate::worker::pool::WorkerPool;

/// What one dispatcher tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub submitted: usize,
    /// Jobs left pending because every worker slot was busy.
    pub deferred: usize,
}

pub struct Dispatcher {
    store: JobStore,
    pool: Arc<WorkerPool>,
    batch_size: u32,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(store: JobStore, pool: Arc<WorkerPool>, batch_size: u32, interval: Duration) -> Self {
        Self {
            store,
            pool,
            batch_size: batch_size.max(1),
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs one scan. Blocks on the job store; must be called from within a
    /// tokio runtime.
    pub fn tick(&self) -> Result<TickReport, StoreError> {
        let pending = self.store.list_by_status(JobStatus::Pending, self.batch_size)?;
        let fetched = pending.len();
        let mut submitted = 0;

        for job in pending {
            match self.pool.try_submit(job.id) {
                Ok(()) => submitted += 1,
                Err(WorkerError::Saturated(_)) => {}
                Err(WorkerError::Closed) => break,
            }
        }

        Ok(TickReport {
            fetched,
            submitted,
            deferred: fetched - submitted,
        })
    }

    /// Starts the dispatch loop. The first tick runs immediately so jobs
    /// requeued at startup are picked up without waiting a full interval.
    pub fn start(self: &Arc<Self>, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(dispatcher.interval);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            log::info!(
                "Dispatcher started (every {:?}, batch of {})",
                dispatcher.interval,
                dispatcher.batch_size
            );

            loop {
                if dispatcher.shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        log::debug!("Dispatcher triggered manually");
                    },
                }

                if dispatcher.shutdown.load(Ordering::Acquire) {
                    break;
                }

                let current = Arc::clone(&dispatcher);
                match tokio::task::spawn_blocking(move || current.tick()).await {
                    Ok(Ok(report)) if report.fetched > 0 => log::info!(
                        "Dispatched {} of {} pending jobs ({} deferred)",
                        report.submitted,
                        report.fetched,
                        report.deferred
                    ),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("Dispatcher tick failed, retrying next tick: {}", e),
                    Err(e) => log::error!("Dispatcher tick panicked: {}", e),
                }
            }

            log::info!("Dispatcher stopped");
        })
    }

    /// Signals the loop to stop after its current wait.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
