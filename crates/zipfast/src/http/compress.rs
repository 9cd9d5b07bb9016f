//! `POST /api/compress`: accepts an upload and creates a pending job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::http::error::{ApiError, ApiResult};
use crate::http::AppState;
use crate::job::{JobOptions, MediaKind, NewJob};
use crate::sanitize::redact_path;
use crate::storage::FileStorage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub job_id: i64,
    pub file_id: String,
    pub file_name: String,
    pub file_type: MediaKind,
    pub original_size: u64,
    pub status: &'static str,
    pub message: String,
}

/// An upload written to disk whose job is not created yet.
struct StoredUpload {
    external_id: String,
    display_name: String,
    kind: MediaKind,
    path: PathBuf,
    size: u64,
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload: Option<StoredUpload> = None;
    let mut fields: HashMap<String, String> = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard_upload(upload.as_ref());
                return Err(e.into());
            }
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" && upload.is_none() {
            upload = Some(store_file(&state.storage, field).await?);
        } else if name != "file" {
            match field.text().await {
                Ok(value) => {
                    fields.insert(name, value);
                }
                Err(e) => {
                    discard_upload(upload.as_ref());
                    return Err(e.into());
                }
            }
        }
    }

    let upload = upload.ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    let options = match options_for(upload.kind, &fields) {
        Ok(options) => options,
        Err(e) => {
            discard_upload(Some(&upload));
            return Err(e);
        }
    };

    let new_job = NewJob::new(
        upload.external_id.clone(),
        upload.display_name.clone(),
        upload.path.clone(),
        upload.kind,
        options,
        upload.size,
    );
    let job = match state.store.create(&new_job) {
        Ok(job) => job,
        Err(e) => {
            discard_upload(Some(&upload));
            return Err(ApiError::internal("Failed to process file", e));
        }
    };

    log::info!(
        "Created compression job {} for {} ({}, {} bytes)",
        job.id,
        job.external_id,
        job.media_kind,
        job.original_size
    );

    if let Err(e) = state.pool.try_submit(job.id) {
        log::info!("Job {} queued for the dispatcher: {}", job.id, e);
    }

    Ok(Json(UploadResponse {
        success: true,
        job_id: job.id,
        message: format!(
            "File uploaded. Compression started. Check /api/status/{} for progress.",
            job.external_id
        ),
        file_id: job.external_id,
        file_name: job.display_name,
        file_type: job.media_kind,
        original_size: job.original_size,
        status: "processing",
    }))
}

/// Validates the file name, then streams the field to the upload directory.
async fn store_file(storage: &FileStorage, mut field: Field<'_>) -> ApiResult<StoredUpload> {
    let display_name = field
        .file_name()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    let kind = MediaKind::from_filename(&display_name).ok_or_else(|| {
        ApiError::Validation(format!("Unsupported file type: {}", display_name))
    })?;

    let external_id = Uuid::new_v4().to_string();
    let path = storage.upload_path(&external_id, &display_name);

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::internal("Failed to store upload", e))?;

    let mut size = 0u64;
    let written: ApiResult<()> = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal("Failed to store upload", e))?;
            size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal("Failed to store upload", e))
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = FileStorage::remove_if_exists(&path) {
            log::warn!("{}", remove_err);
        }
        return Err(e);
    }

    log::debug!("Stored upload {} ({} bytes)", redact_path(&path), size);

    Ok(StoredUpload {
        external_id,
        display_name,
        kind,
        path,
        size,
    })
}

fn discard_upload(upload: Option<&StoredUpload>) {
    if let Some(upload) = upload {
        if let Err(e) = FileStorage::remove_if_exists(&upload.path) {
            log::warn!("{}", e);
        }
    }
}

/// Keeps only the form fields that apply to `kind`. Numeric fields must be
/// integers; empty fields are ignored.
fn options_for(kind: MediaKind, fields: &HashMap<String, String>) -> ApiResult<JobOptions> {
    let mut options = JobOptions::new();

    let value = |name: &str| {
        fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };
    let integer = |name: &str| -> ApiResult<Option<Value>> {
        match value(name) {
            Some(raw) => raw
                .parse::<i64>()
                .map(|n| Some(Value::from(n)))
                .map_err(|_| ApiError::Validation(format!("{} must be an integer", name))),
            None => Ok(None),
        }
    };
    let text = |name: &str| value(name).map(|v| Value::String(v.to_string()));

    let mut set = |key: &str, v: Option<Value>| {
        if let Some(v) = v {
            options.insert(key.to_string(), v);
        }
    };

    match kind {
        MediaKind::Image => {
            set("quality", integer("quality")?);
            set("format", text("format"));
            set("width", integer("width")?);
            set("height", integer("height")?);
        }
        MediaKind::Video | MediaKind::Audio => {
            set("quality", integer("quality")?);
            set("bitrate", text("bitrate"));
        }
        MediaKind::Pdf => {
            // PDF quality is a named preset, sent separately from the numeric one.
            set("quality", text("pdfQuality"));
            set("dpi", integer("dpi")?);
        }
    }

    Ok(options)
}
