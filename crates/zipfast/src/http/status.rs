//! `GET /api/status/{file_id}`

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::http::error::ApiResult;
use crate::http::AppState;
use crate::job::{Job, JobStatus, MediaKind};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: i64,
    pub file_id: String,
    pub file_name: String,
    pub file_type: MediaKind,
    pub status: JobStatus,
    pub original_size: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    /// Present for completed jobs; `null` when no ratio can be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        let completed = job.status == JobStatus::Completed;
        let failed = job.status == JobStatus::Failed;

        Self {
            compression_ratio: completed.then(|| job.compression_ratio()),
            compressed_size: job.compressed_size.filter(|_| completed),
            error: job.error_message.clone().filter(|_| failed),
            job_id: job.id,
            file_id: job.external_id,
            file_name: job.display_name,
            file_type: job.media_kind,
            status: job.status,
            original_size: job.original_size,
            created_at: iso_timestamp(&job.created_at),
            updated_at: iso_timestamp(&job.updated_at),
        }
    }
}

fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state.store.find_latest(&file_id)?;
    Ok(Json(job.into()))
}
