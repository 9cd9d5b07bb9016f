//! Job repository: SQL access to the `jobs` table.
//!
//! Status transitions are compare-and-swap updates: each one names the status
//! it expects to replace and reports whether a row was actually changed.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub external_id: String,
    pub display_name: String,
    pub source_path: String,
    pub media_kind: String,
    pub status: String,
    pub options: String,
    pub result_path: Option<String>,
    pub original_size: i64,
    pub compressed_size: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            display_name: row.get("display_name")?,
            source_path: row.get("source_path")?,
            media_kind: row.get("media_kind")?,
            status: row.get("status")?,
            options: row.get("options")?,
            result_path: row.get("result_path")?,
            original_size: row.get("original_size")?,
            compressed_size: row.get("compressed_size")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Column values for a new row. The id is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewJobRow<'a> {
    pub external_id: &'a str,
    pub display_name: &'a str,
    pub source_path: &'a str,
    pub media_kind: &'a str,
    pub options: &'a str,
    pub original_size: i64,
    pub created_at: &'a str,
}

/// Inserts a new pending job and returns its id.
pub fn insert(db: &Database, job: &NewJobRow<'_>) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (external_id, display_name, source_path, media_kind, status,
             options, original_size, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?7)",
            params![
                job.external_id,
                job.display_name,
                job.source_path,
                job.media_kind,
                job.options,
                job.original_size,
                job.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a job by its internal id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds the most recently created job with the given external id.
pub fn find_latest_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE external_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![external_id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists jobs with the given status, oldest first.
pub fn list_by_status(
    db: &Database,
    status: &str,
    limit: u32,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![status, limit], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists jobs created strictly before `cutoff`.
pub fn list_created_before(db: &Database, cutoff: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs WHERE created_at < ?1 ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map(params![cutoff], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a job from `pending` to `processing`. Returns false if the job is
/// missing or no longer pending.
pub fn claim_pending(db: &Database, id: i64, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Moves a job from `processing` to `completed` together with its result.
pub fn complete(
    db: &Database,
    id: i64,
    result_path: &str,
    compressed_size: i64,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'completed', result_path = ?2, compressed_size = ?3,
             updated_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            params![id, result_path, compressed_size, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Moves a job from `processing` to `failed` together with its error message.
pub fn fail(
    db: &Database,
    id: i64,
    error_message: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error_message, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Puts every `processing` job back to `pending`. Returns the number moved.
pub fn requeue_processing(db: &Database, updated_at: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'pending', updated_at = ?1 WHERE status = 'processing'",
            params![updated_at],
        )?;
        Ok(changed as u64)
    })
}

/// Deletes a job row. Returns false if it was already gone.
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}

/// Returns true if any job uses `path` as its source or result.
pub fn references_path(db: &Database, path: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM jobs WHERE source_path = ?1 OR result_path = ?1)",
            params![path],
            |r| r.get(0),
        )?;
        Ok(exists)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    })
}
