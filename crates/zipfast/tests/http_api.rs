//! HTTP surface tests driving the router in-process.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use common::{FakeCompressor, MultipartBuilder, TestHarness};
use zipfast::JobStatus;

const FIVE_MIB: usize = 5_242_880;
const ONE_MIB: usize = 1_048_576;

async fn upload(
    harness: &TestHarness,
    builder: MultipartBuilder,
) -> (StatusCode, serde_json::Value) {
    let (status, body) = harness.send(builder.into_request("/api/compress")).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn jpeg_upload_compresses_and_reports_ratio() {
    let harness = TestHarness::new(FakeCompressor::producing(ONE_MIB), 2);

    let (status, body) = upload(
        &harness,
        MultipartBuilder::new()
            .text("quality", "60")
            .file("beach.jpg", &vec![0xFFu8; FIVE_MIB]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fileName"], "beach.jpg");
    assert_eq!(body["fileType"], "image");
    assert_eq!(body["originalSize"], FIVE_MIB as u64);
    assert_eq!(body["status"], "processing");
    let file_id = body["fileId"].as_str().unwrap().to_string();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains(&format!("/api/status/{}", file_id)));

    let job = harness.store.find_latest(&file_id).unwrap();
    assert_eq!(body["jobId"], job.id);
    assert_eq!(job.options["quality"], 60);

    harness.pool.wait_idle().await;

    let (status, body) = harness.get_json(&format!("/api/status/{}", file_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["originalSize"], FIVE_MIB as u64);
    assert_eq!(body["compressedSize"], ONE_MIB as u64);
    assert_eq!(body["compressionRatio"], "80.00%");

    let request = Request::builder()
        .uri(format!("/api/download/{}", file_id))
        .body(Body::empty())
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"beach.jpg\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.len(), ONE_MIB);
}

#[tokio::test]
async fn download_before_completion_is_rejected() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);
    let job = harness.create_job("talk.mp4", 100);
    assert!(harness.store.mark_processing(job.id).unwrap());

    let (status, body) = harness
        .get_json(&format!("/api/download/{}", job.external_id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Compression not completed");
    assert_eq!(body["status"], "processing");
}

#[tokio::test]
async fn download_with_missing_result_is_not_found() {
    let harness = TestHarness::new(FakeCompressor::producing(8), 1);
    let job = harness.create_job("doc.pdf", 100);
    harness.processor.process(job.id).await.unwrap();
    let result = harness.reload(&job).unwrap().result_path.unwrap();
    std::fs::remove_file(result).unwrap();

    let (status, body) = harness
        .get_json(&format!("/api/download/{}", job.external_id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Compressed file not found");
}

#[tokio::test]
async fn unsupported_extension_creates_nothing() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);

    let (status, body) = upload(
        &harness,
        MultipartBuilder::new().file("notes.txt", b"hello"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("notes.txt"));
    assert_eq!(harness.store.count_by_status(JobStatus::Pending).unwrap(), 0);
    assert!(harness.upload_files().is_empty());
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);

    let (status, body) = upload(&harness, MultipartBuilder::new().text("quality", "50")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn malformed_number_removes_upload() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);

    let (status, _) = upload(
        &harness,
        MultipartBuilder::new()
            .file("pic.png", b"png-bytes")
            .text("width", "huge"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.store.count_by_status(JobStatus::Pending).unwrap(), 0);
    assert!(harness.upload_files().is_empty());
}

#[tokio::test]
async fn failed_compression_is_reported() {
    let harness = TestHarness::new(FakeCompressor::failing("moov atom not found"), 1);

    let (status, body) = upload(
        &harness,
        MultipartBuilder::new().file("broken.mp4", b"not a video"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let file_id = body["fileId"].as_str().unwrap().to_string();

    harness.pool.wait_idle().await;

    let (status, body) = harness.get_json(&format!("/api/status/{}", file_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("moov atom not found"));
    assert!(body.get("compressedSize").is_none());

    let (status, body) = harness.get_json(&format!("/api/download/{}", file_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn saturated_pool_leaves_upload_pending() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = TestHarness::new(FakeCompressor::gated(1, Arc::clone(&gate)), 1);
    let busy = harness.create_job("first.wav", 10);
    harness.pool.try_submit(busy.id).unwrap();

    let (status, body) = upload(
        &harness,
        MultipartBuilder::new().file("second.wav", b"RIFF"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let job = harness
        .store
        .find_latest(body["fileId"].as_str().unwrap())
        .unwrap();
    assert_eq!(harness.reload(&job).unwrap().status, JobStatus::Pending);

    gate.add_permits(1);
    harness.pool.wait_idle().await;
    assert_eq!(harness.reload(&busy).unwrap().status, JobStatus::Completed);
    assert_eq!(harness.reload(&job).unwrap().status, JobStatus::Pending);

    harness.dispatcher(5).tick().unwrap();
    harness.pool.wait_idle().await;
    assert_eq!(harness.reload(&job).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn unknown_job_and_route_are_404() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);

    let (status, body) = harness.get_json("/api/status/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");

    let (status, body) = harness.get_json("/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn health_reports_service() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);
    harness.create_job("a.flac", 1);

    let (status, body) = harness.get_json("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "zipfast");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["jobs"]["pending"], 1);
    assert_eq!(body["workers"]["capacity"], 1);
    assert_eq!(body["workers"]["busy"], 0);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}
