use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::http::AppState;
use crate::job::JobStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<JobCounts>,
    pub workers: WorkerSlots,
}

#[derive(Debug, Serialize)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
}

#[derive(Debug, Serialize)]
pub struct WorkerSlots {
    pub capacity: usize,
    pub busy: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state
        .store
        .count_by_status(JobStatus::Pending)
        .and_then(|pending| {
            let processing = state.store.count_by_status(JobStatus::Processing)?;
            Ok(JobCounts {
                pending,
                processing,
            })
        });

    let jobs = match counts {
        Ok(counts) => Some(counts),
        Err(e) => {
            log::warn!("Health check could not count jobs: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        service: "zipfast",
        version: env!("CARGO_PKG_VERSION"),
        jobs,
        workers: WorkerSlots {
            capacity: state.pool.capacity(),
            busy: state.pool.capacity().saturating_sub(state.pool.available()),
        },
    })
}
