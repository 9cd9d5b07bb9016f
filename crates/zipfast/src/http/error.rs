//! Error responses of the HTTP surface.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;
use crate::job::JobStatus;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request. No job is created.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// The job exists but has not produced a result.
    #[error("Compression not completed")]
    NotReady { status: JobStatus },

    /// The multipart body could not be read (too large, truncated, ...).
    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error("{context}: {message}")]
    Internal {
        context: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn internal(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context,
            message: err.to_string(),
        }
    }

    fn to_status_and_body(&self) -> (StatusCode, ErrorBody) {
        let body = |error: String| ErrorBody {
            error,
            status: None,
            message: None,
        };

        match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, body(message.clone())),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, body(message.clone())),
            Self::NotReady { status } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    status: Some(*status),
                    ..body(self.to_string())
                },
            ),
            Self::Upload { status, message } => (*status, body(message.clone())),
            Self::Internal { context, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    message: Some(message.clone()),
                    ..body(context.to_string())
                },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_status_and_body();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

/// Lookup failures: an unknown id is a 404, anything else a 500.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound("Job not found".to_string()),
            other => Self::internal("Failed to load job", other),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
