//! HTTP surface: upload, status, download and health endpoints.

pub mod compress;
pub mod download;
pub mod error;
pub mod health;
pub mod status;

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ZipfastError;
use crate::job::JobStore;
use crate::storage::FileStorage;
use crate::worker::WorkerPool;

pub use error::{ApiError, ApiResult};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub storage: FileStorage,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(store: JobStore, storage: FileStorage, pool: Arc<WorkerPool>) -> Self {
        Self {
            store,
            storage,
            pool,
        }
    }
}

/// Builds the application router with body limit, CORS and request tracing.
pub fn router(state: AppState, config: &Config) -> Router {
    let body_limit = usize::try_from(config.storage.max_upload_bytes).unwrap_or(usize::MAX);

    let mut app = Router::new()
        .route("/api/compress", post(compress::upload))
        .route("/api/status/{file_id}", get(status::job_status))
        .route("/api/download/{file_id}", get(download::download))
        .route("/api/health", get(health::health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(cors) = config.server.cors_origin.as_deref().and_then(cors_layer) {
        app = app.layer(cors);
    }

    app
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    match HeaderValue::from_str(origin) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        ),
        Err(e) => {
            log::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
            None
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}

/// Serves `app` until `shutdown` resolves, then drains open connections.
pub async fn serve<F>(config: &Config, app: Router, shutdown: F) -> Result<(), ZipfastError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(ZipfastError::Server)?;

    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ZipfastError::Server)
}
