//! Test harness for isolated test execution.
//!
//! Every harness owns its own temp directories and in-memory database, so
//! tests never share jobs or files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

use zipfast::config::Config;
use zipfast::db::Database;
use zipfast::http::{self, AppState};
use zipfast::worker::{Dispatcher, JobProcessor, WorkerPool};
use zipfast::{
    Compressor, FileStorage, Job, JobOptions, JobStore, MediaKind, NewJob, RetentionSweeper,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
    pub store: JobStore,
    pub storage: FileStorage,
    pub processor: Arc<JobProcessor>,
    pub pool: Arc<WorkerPool>,
}

impl TestHarness {
    /// Harness with a pool of `capacity` slots around `compressor`.
    pub fn new(compressor: impl Compressor + 'static, capacity: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let mut config = Config::default();
        config.storage.upload_directory = temp_dir.path().join("uploads");
        config.storage.compressed_directory = temp_dir.path().join("compressed");

        let storage = FileStorage::new(
            &config.storage.upload_directory,
            &config.storage.compressed_directory,
        );
        storage
            .ensure_directories()
            .expect("Failed to create storage directories");

        let store = JobStore::new(Database::open_in_memory().expect("Failed to open database"));
        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            storage.clone(),
            Arc::new(compressor),
        ));
        let pool = Arc::new(WorkerPool::new(Arc::clone(&processor), capacity));

        Self {
            temp_dir,
            config,
            store,
            storage,
            processor,
            pool,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn router(&self) -> Router {
        let state = AppState::new(
            self.store.clone(),
            self.storage.clone(),
            Arc::clone(&self.pool),
        );
        http::router(state, &self.config)
    }

    pub fn dispatcher(&self, batch_size: u32) -> Dispatcher {
        Dispatcher::new(
            self.store.clone(),
            Arc::clone(&self.pool),
            batch_size,
            self.config.dispatcher.interval(),
        )
    }

    pub fn sweeper(&self, hours: i64) -> RetentionSweeper {
        RetentionSweeper::new(
            self.store.clone(),
            self.storage.clone(),
            chrono::Duration::hours(hours),
        )
    }

    /// Writes an upload of `size` bytes and creates its pending job.
    pub fn create_job(&self, file_name: &str, size: usize) -> Job {
        self.create_job_at(file_name, size, Utc::now())
    }

    pub fn create_job_at(&self, file_name: &str, size: usize, created_at: DateTime<Utc>) -> Job {
        let external_id = uuid::Uuid::new_v4().to_string();
        let kind = MediaKind::from_filename(file_name).expect("Unsupported test file name");
        let source = self.storage.upload_path(&external_id, file_name);
        std::fs::write(&source, vec![7u8; size]).expect("Failed to write upload");

        let mut new_job = NewJob::new(
            external_id,
            file_name,
            source,
            kind,
            JobOptions::new(),
            size as u64,
        );
        new_job.created_at = created_at;
        self.store.create(&new_job).expect("Failed to create job")
    }

    pub fn reload(&self, job: &Job) -> Option<Job> {
        self.store.find(job.id).expect("Failed to load job")
    }

    /// Files currently in the compressed directory.
    pub fn compressed_files(&self) -> Vec<PathBuf> {
        list_files(self.storage.compressed_directory())
    }

    pub fn upload_files(&self) -> Vec<PathBuf> {
        list_files(self.storage.upload_directory())
    }

    /// Sends one request and returns status plus body bytes.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("Router failed to respond");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        (status, body.to_vec())
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let (status, body) = self.send(request).await;
        let value = serde_json::from_slice(&body).expect("Response is not JSON");
        (status, value)
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
