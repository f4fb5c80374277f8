//! Deferred retry behaviour: one replay pass, final failures and cleanup

use std::sync::Arc;

use ripdrive_sync::coordinator::DownloadCoordinator;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::*;

const CONTENT: &[u8] = b"0123456789abcdef";

fn two_files() -> FakeDrive {
    FakeDrive::new().with_children(
        "root",
        vec![
            file_entry("f1", "flaky.bin", ROOT_PARENT, CONTENT),
            file_entry("f2", "steady.bin", ROOT_PARENT, b"steady"),
        ],
    )
}

fn transport() -> FakeTransport {
    FakeTransport::new()
        .with_content("f1", CONTENT)
        .with_content("f2", b"steady")
}

#[tokio::test]
async fn test_single_failure_recovers_on_replay() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Fail, 1));

    let summary = DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.files_downloaded, 2);
    assert_eq!(transport.transfers_of("f1"), 2);
    assert_eq!(transport.transfers_of("f2"), 1);
    assert_eq!(std::fs::read(root.path().join("flaky.bin")).unwrap(), CONTENT);
}

#[tokio::test]
async fn test_unreadable_download_is_replayed() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Vanish, 1));

    let summary = DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.retries, 1);
    assert_eq!(transport.transfers_of("f1"), 2);
    assert_eq!(std::fs::read(root.path().join("flaky.bin")).unwrap(), CONTENT);
}

#[tokio::test]
async fn test_replay_runs_after_the_walk() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Fail, 1));

    DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    let order: Vec<String> = transport
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.source_url.clone())
        .collect();
    assert_eq!(order, vec![url_for("f1"), url_for("f2"), url_for("f1")]);
}

#[tokio::test]
async fn test_second_failure_is_final_and_cleaned_up() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Fail, 5));
    let opts = options(root.path(), logs.path());
    let log_path = opts.error_log_path.clone();

    let summary = DownloadCoordinator::new(Arc::new(two_files()), transport.clone(), opts)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failures, 1);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.files_downloaded, 1);
    assert!(!summary.is_success());
    assert_eq!(transport.transfers_of("f1"), 2, "never retried more than once");
    assert!(!root.path().join("flaky.bin").exists());
    assert_eq!(summary.error_log, log_path);

    let lines = read_log(&log_path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("flaky.bin"));
    assert!(lines[0].contains("connection reset"));
}

#[tokio::test]
async fn test_verification_mismatch_is_retried() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Corrupt, 1));

    let summary = DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.retries, 1);
    assert_eq!(std::fs::read(root.path().join("flaky.bin")).unwrap(), CONTENT);
}

#[tokio::test]
async fn test_repeated_mismatch_leaves_no_file() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport().with_fault("f1", Fault::Corrupt, 2));

    let summary = DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 1);
    assert!(summary.errors[0].contains("SHA256 mismatch"));
    assert!(!root.path().join("flaky.bin").exists());
}

#[tokio::test]
async fn test_cancelled_run_still_produces_summary() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(transport());
    let token = CancellationToken::new();
    token.cancel();

    let summary = DownloadCoordinator::new(
        Arc::new(two_files()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .with_cancellation(token)
    .run()
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    assert_eq!(transport.transfer_count(), 0);
}
