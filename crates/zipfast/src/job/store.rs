//! Typed job store on top of the raw `jobs` repository.
//!
//! Every mutation is one SQL statement, so readers never see a completed job
//! without its result or a failed job without its error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::job_repo::{self, JobRow, NewJobRow};
use crate::db::Database;
use crate::error::StoreError;
use crate::job::model::{Job, JobOptions, JobStatus, NewJob};

/// Formats a timestamp so that string order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(
    id: i64,
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            id,
            field,
            reason: e.to_string(),
        })
}

fn non_negative(id: i64, field: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::CorruptRow {
        id,
        field,
        reason: format!("negative byte count {}", value),
    })
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |field: &'static str, reason: String| StoreError::CorruptRow {
            id,
            field,
            reason,
        };

        let media_kind = row
            .media_kind
            .parse()
            .map_err(|e: String| corrupt("media_kind", e))?;
        let status = row
            .status
            .parse()
            .map_err(|e: String| corrupt("status", e))?;
        let options: JobOptions = serde_json::from_str(&row.options)
            .map_err(|e| corrupt("options", e.to_string()))?;

        Ok(Job {
            id,
            external_id: row.external_id,
            display_name: row.display_name,
            source_path: PathBuf::from(row.source_path),
            media_kind,
            status,
            options,
            result_path: row.result_path.map(PathBuf::from),
            original_size: non_negative(id, "original_size", row.original_size)?,
            compressed_size: row
                .compressed_size
                .map(|s| non_negative(id, "compressed_size", s))
                .transpose()?,
            error_message: row.error_message,
            created_at: parse_timestamp(id, "created_at", &row.created_at)?,
            updated_at: parse_timestamp(id, "updated_at", &row.updated_at)?,
        })
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

/// Persistent job table shared by request handlers, the dispatcher and the
/// retention sweeper. Cloning shares the same connection.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new `pending` job.
    pub fn create(&self, new_job: &NewJob) -> Result<Job, StoreError> {
        let options = serde_json::Value::Object(new_job.options.clone()).to_string();
        let source_path = path_str(&new_job.source_path);
        let created_at = format_timestamp(&new_job.created_at);

        let row = NewJobRow {
            external_id: &new_job.external_id,
            display_name: &new_job.display_name,
            source_path: &source_path,
            media_kind: new_job.media_kind.as_str(),
            options: &options,
            original_size: new_job.original_size as i64,
            created_at: &created_at,
        };

        let id = job_repo::insert(&self.db, &row).map_err(|e| {
            if e.is_unique_violation() {
                StoreError::DuplicateId(new_job.external_id.clone())
            } else {
                StoreError::Database(e)
            }
        })?;

        self.find(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Fetches a job by internal id.
    pub fn find(&self, id: i64) -> Result<Option<Job>, StoreError> {
        job_repo::find_by_id(&self.db, id)?
            .map(Job::try_from)
            .transpose()
    }

    /// Fetches the most recently created job with the given external id.
    pub fn find_latest(&self, external_id: &str) -> Result<Job, StoreError> {
        job_repo::find_latest_by_external_id(&self.db, external_id)?
            .map(Job::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(external_id.to_string()))
    }

    /// Lists up to `limit` jobs with `status`, oldest first.
    pub fn list_by_status(&self, status: JobStatus, limit: u32) -> Result<Vec<Job>, StoreError> {
        job_repo::list_by_status(&self.db, status.as_str(), limit)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// Lists jobs created strictly before `cutoff`.
    pub fn list_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        job_repo::list_created_before(&self.db, &format_timestamp(&cutoff))?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// `pending -> processing`. Returns false when the job is gone or was
    /// already claimed.
    pub fn mark_processing(&self, id: i64) -> Result<bool, StoreError> {
        Ok(job_repo::claim_pending(&self.db, id, &now())?)
    }

    /// `processing -> completed`, recording the result in the same statement.
    pub fn mark_completed(
        &self,
        id: i64,
        result_path: &Path,
        compressed_size: u64,
    ) -> Result<bool, StoreError> {
        Ok(job_repo::complete(
            &self.db,
            id,
            &path_str(result_path),
            compressed_size as i64,
            &now(),
        )?)
    }

    /// `processing -> failed`, recording the error in the same statement.
    pub fn mark_failed(&self, id: i64, message: &str) -> Result<bool, StoreError> {
        Ok(job_repo::fail(&self.db, id, message, &now())?)
    }

    /// Moves every job left in `processing` back to `pending`.
    pub fn requeue_interrupted(&self) -> Result<u64, StoreError> {
        Ok(job_repo::requeue_processing(&self.db, &now())?)
    }

    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(job_repo::delete(&self.db, id)?)
    }

    /// Whether any job uses `path` as its source or result file.
    pub fn references_path(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(job_repo::references_path(&self.db, &path_str(path))?)
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }
}
