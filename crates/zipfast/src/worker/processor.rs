//! Drives one job from `pending` to a terminal state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;

use crate::compressor::Compressor;
use crate::error::StoreError;
use crate::job::{Job, JobStore};
use crate::sanitize::redact_path;
use crate::storage::FileStorage;

/// What a single `process` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The job was not pending (already claimed, finished or missing).
    Skipped,
    Completed { compressed_size: u64 },
    Failed { message: String },
    /// The row was deleted while the compression ran.
    Vanished,
}

pub struct JobProcessor {
    store: JobStore,
    storage: FileStorage,
    compressor: Arc<dyn Compressor>,
}

impl JobProcessor {
    pub fn new(store: JobStore, storage: FileStorage, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            store,
            storage,
            compressor,
        }
    }

    /// Claims and runs the job. Compression failures are recorded on the job
    /// and reported as `Failed`; only job store failures are returned as errors.
    pub async fn process(&self, job_id: i64) -> Result<ProcessOutcome, StoreError> {
        let span = tracing::info_span!("job.process", job_id);
        self.process_inner(job_id).instrument(span).await
    }

    async fn process_inner(&self, job_id: i64) -> Result<ProcessOutcome, StoreError> {
        if !self.store.mark_processing(job_id)? {
            match self.store.find(job_id)? {
                Some(job) if job.status.is_terminal() => {
                    log::warn!("Job {} already finished ({}), skipping", job_id, job.status)
                }
                Some(_) => log::debug!("Job {} already claimed by another worker", job_id),
                None => log::warn!("Job {} not found, skipping", job_id),
            }
            return Ok(ProcessOutcome::Skipped);
        }

        let Some(job) = self.store.find(job_id)? else {
            log::warn!("Job {} disappeared right after it was claimed", job_id);
            return Ok(ProcessOutcome::Vanished);
        };

        log::info!(
            "Processing job {} ({}, {} bytes)",
            job.id,
            job.media_kind,
            job.original_size
        );

        match self.run_compression(&job).await {
            Ok((result_path, compressed_size)) => {
                if self
                    .store
                    .mark_completed(job.id, &result_path, compressed_size)?
                {
                    log::info!(
                        "Job {} completed: {} -> {} bytes",
                        job.id,
                        job.original_size,
                        compressed_size
                    );
                    Ok(ProcessOutcome::Completed { compressed_size })
                } else {
                    log::warn!(
                        "Job {} was removed during compression, discarding {}",
                        job.id,
                        redact_path(&result_path)
                    );
                    discard_result(&result_path);
                    Ok(ProcessOutcome::Vanished)
                }
            }
            Err(message) => {
                if self.store.mark_failed(job.id, &message)? {
                    log::error!("Job {} failed: {}", job.id, message);
                    Ok(ProcessOutcome::Failed { message })
                } else {
                    log::warn!("Job {} was removed before its failure was recorded", job.id);
                    Ok(ProcessOutcome::Vanished)
                }
            }
        }
    }

    /// Returns the result location and size, or the message to record.
    async fn run_compression(&self, job: &Job) -> Result<(PathBuf, u64), String> {
        let extension = self
            .compressor
            .output_extension(job.media_kind, &job.options)
            .map_err(|e| e.to_string())?;
        let result_path = self.storage.result_path(extension);

        let size = self
            .compressor
            .compress(&job.source_path, job.media_kind, &job.options, &result_path)
            .await
            .map_err(|e| e.to_string())?;

        Ok((result_path, size))
    }
}

fn discard_result(path: &Path) {
    if let Err(e) = FileStorage::remove_if_exists(path) {
        log::warn!("Failed to remove orphaned result: {}", e);
    }
}
