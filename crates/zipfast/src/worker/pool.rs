use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::WorkerError;
use crate::worker::processor::{JobProcessor, ProcessOutcome};

/// Bounded set of compression slots.
///
/// Each accepted job runs as its own detached tokio task holding one permit,
/// so a slow compression never blocks the caller that submitted it.
pub struct WorkerPool {
    processor: Arc<JobProcessor>,
    permits: Arc<Semaphore>,
    capacity: usize,
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool running at most `capacity` compressions at once.
    /// A capacity of 0 is raised to 1.
    pub fn new(processor: Arc<JobProcessor>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!("Compression pool ready with {} slots", capacity);
        Self {
            processor,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Starts processing `job_id` if a slot is free. Never waits.
    ///
    /// Must be called from within a tokio runtime.
    pub fn try_submit(&self, job_id: i64) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(WorkerError::Closed);
        }

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err(WorkerError::Saturated(self.capacity)),
            Err(TryAcquireError::Closed) => return Err(WorkerError::Closed),
        };

        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            let _permit = permit;
            match processor.process(job_id).await {
                Ok(ProcessOutcome::Skipped) => debug!("Job {} skipped", job_id),
                Ok(outcome) => debug!("Job {} finished: {:?}", job_id, outcome),
                Err(e) => error!("Job {} could not be processed: {}", job_id, e),
            }
        });

        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Rejects further submissions. Running jobs continue.
    pub fn shutdown(&self) {
        info!("Shutting down compression pool...");
        self.shutdown.store(true, Ordering::Release);
    }

    /// Waits until no compression is running.
    pub async fn wait_idle(&self) {
        match self.permits.acquire_many(self.capacity as u32).await {
            Ok(all) => drop(all),
            Err(_) => debug!("Compression pool semaphore closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::Compressor;
    use crate::db::Database;
    use crate::error::CompressError;
    use crate::job::{JobOptions, JobStatus, JobStore, MediaKind, NewJob};
    use crate::storage::FileStorage;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Blocks every compression until released.
    struct GatedCompressor {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Compressor for GatedCompressor {
        fn output_extension(
            &self,
            _kind: MediaKind,
            _options: &JobOptions,
        ) -> Result<&'static str, CompressError> {
            Ok("mp3")
        }

        async fn compress(
            &self,
            _source: &Path,
            _kind: MediaKind,
            _options: &JobOptions,
            destination: &Path,
        ) -> Result<u64, CompressError> {
            self.gate.notified().await;
            std::fs::write(destination, b"out").unwrap();
            Ok(3)
        }
    }

    fn setup(capacity: usize) -> (TempDir, JobStore, WorkerPool, Arc<Notify>) {
        let dir = TempDir::new().unwrap();
        let storage =
            FileStorage::new(dir.path().join("uploads"), dir.path().join("compressed"));
        storage.ensure_directories().unwrap();
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let gate = Arc::new(Notify::new());
        let processor = JobProcessor::new(
            store.clone(),
            storage,
            Arc::new(GatedCompressor {
                gate: Arc::clone(&gate),
            }),
        );
        let pool = WorkerPool::new(Arc::new(processor), capacity);
        (dir, store, pool, gate)
    }

    fn add_job(store: &JobStore, dir: &TempDir, name: &str) -> i64 {
        let source = dir.path().join(format!("{}.wav", name));
        std::fs::write(&source, b"raw").unwrap();
        store
            .create(&NewJob::new(
                name,
                format!("{}.wav", name),
                source,
                MediaKind::Audio,
                JobOptions::new(),
                3,
            ))
            .unwrap()
            .id
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (_dir, _store, pool, _gate) = setup(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[tokio::test]
    async fn test_saturated_pool_rejects() {
        let (dir, store, pool, gate) = setup(1);
        let a = add_job(&store, &dir, "a");
        let b = add_job(&store, &dir, "b");

        pool.try_submit(a).unwrap();
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.try_submit(b), Err(WorkerError::Saturated(1)));

        gate.notify_one();
        tokio::time::timeout(Duration::from_secs(5), pool.wait_idle())
            .await
            .unwrap();

        assert_eq!(pool.available(), 1);
        assert_eq!(
            store.find(a).unwrap().unwrap().status,
            JobStatus::Completed
        );
        assert_eq!(store.find(b).unwrap().unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_jobs() {
        let (dir, store, pool, _gate) = setup(2);
        let a = add_job(&store, &dir, "a");

        pool.shutdown();
        assert_eq!(pool.try_submit(a), Err(WorkerError::Closed));
        assert_eq!(store.find(a).unwrap().unwrap().status, JobStatus::Pending);
    }
}
