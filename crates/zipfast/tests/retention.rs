//! Retention sweep tests over real files and the job store.

mod common;

use std::fs::File;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use common::{FakeCompressor, TestHarness};
use zipfast::JobStatus;

fn set_age(path: &std::path::Path, age: Duration) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - age)
        .unwrap();
}

#[test]
fn boundary_of_retention_window() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);
    let now = Utc::now();
    let just_expired = harness.create_job_at("a.mp3", 10, now - chrono::Duration::minutes(121));
    let just_kept = harness.create_job_at("b.mp3", 10, now - chrono::Duration::minutes(119));

    let report = harness.sweeper(2).sweep_at(now).unwrap();
    assert_eq!(report.jobs_deleted, 1);

    assert!(harness.reload(&just_expired).is_none());
    assert!(!just_expired.source_path.exists());
    assert!(harness.reload(&just_kept).is_some());
    assert!(just_kept.source_path.exists());
}

#[tokio::test]
async fn expired_completed_job_loses_both_files() {
    let harness = TestHarness::new(FakeCompressor::producing(3), 1);
    let job = harness.create_job_at("movie.mkv", 30, Utc::now() - chrono::Duration::hours(5));
    harness.processor.process(job.id).await.unwrap();
    let result = harness.reload(&job).unwrap().result_path.unwrap();
    assert!(result.exists());

    let report = harness.sweeper(2).sweep().unwrap();
    assert_eq!(report.jobs_deleted, 1);
    assert_eq!(report.job_failures, 0);
    assert!(!result.exists());
    assert!(!job.source_path.exists());
    assert_eq!(harness.store.count_by_status(JobStatus::Completed).unwrap(), 0);
}

#[test]
fn orphans_older_than_window_are_removed() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);

    let old_orphan = harness.storage.upload_directory().join("abandoned.mp4");
    let recent_orphan = harness.storage.compressed_directory().join("fresh.jpg");
    std::fs::write(&old_orphan, b"old").unwrap();
    std::fs::write(&recent_orphan, b"new").unwrap();
    set_age(&old_orphan, Duration::from_secs(3 * 60 * 60));

    let live = harness.create_job("keep.png", 4);
    set_age(&live.source_path, Duration::from_secs(3 * 60 * 60));

    let report = harness.sweeper(2).sweep().unwrap();
    assert_eq!(report.orphans_deleted, 1);
    assert_eq!(report.orphan_failures, 0);
    assert_eq!(report.jobs_deleted, 0);

    assert!(!old_orphan.exists());
    assert!(recent_orphan.exists());
    assert!(live.source_path.exists());
}

#[test]
fn sweep_tolerates_already_deleted_files() {
    let harness = TestHarness::new(FakeCompressor::producing(1), 1);
    let job = harness.create_job_at("x.gif", 1, Utc::now() - chrono::Duration::hours(3));
    std::fs::remove_file(&job.source_path).unwrap();

    let report = harness.sweeper(2).sweep().unwrap();
    assert_eq!(report.jobs_deleted, 1);
    assert_eq!(report.job_failures, 0);

    let again = harness.sweeper(2).sweep().unwrap();
    assert!(again.is_empty());
}
