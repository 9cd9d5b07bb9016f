//! `GET /api/download/{file_id}`: streams a completed result.

use std::path::Path as FsPath;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncReadExt;

use crate::http::error::{ApiError, ApiResult};
use crate::http::AppState;
use crate::job::{Job, JobStatus};

const CHUNK_SIZE: usize = 64 * 1024;

pub async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Response> {
    let job = state.store.find_latest(&file_id)?;

    if job.status != JobStatus::Completed {
        return Err(ApiError::NotReady { status: job.status });
    }

    let not_found = || ApiError::NotFound("Compressed file not found".to_string());
    let result_path = job.result_path.as_deref().ok_or_else(not_found)?;
    let file = tokio::fs::File::open(result_path)
        .await
        .map_err(|_| not_found())?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal("Failed to download file", e))?
        .len();

    let content_type = mime_guess::from_path(result_path)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{}\"", download_name(&job, result_path));

    log::debug!("Streaming result of job {} ({} bytes)", job.id, length);

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, length.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(read_chunks(file))).into_response())
}

fn read_chunks(
    file: tokio::fs::File,
) -> impl futures_util::Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures_util::stream::unfold(Some(file), |state| async move {
        let mut file = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Client-facing name: the original stem with the result's extension,
/// restricted to characters that are safe in a quoted header value.
fn download_name(job: &Job, result_path: &FsPath) -> String {
    let stem = FsPath::new(&job.display_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let name = match result_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    };

    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
