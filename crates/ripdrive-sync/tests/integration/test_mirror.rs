//! End-to-end mirroring scenarios: first run, rerun, skips and repairs

use std::sync::Arc;

use ripdrive_sync::coordinator::DownloadCoordinator;
use ripdrive_sync::MirrorError;
use tempfile::TempDir;

use crate::common::*;

const HELLO: &[u8] = b"hello world";

fn docs_and_readme() -> FakeDrive {
    FakeDrive::new()
        .with_children(
            "root",
            vec![
                dir_entry("d1", "Docs", ROOT_PARENT),
                file_entry("f1", "readme.txt", ROOT_PARENT, HELLO),
            ],
        )
        .with_children("d1", vec![])
}

#[tokio::test]
async fn test_first_run_then_idempotent_rerun() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = Arc::new(docs_and_readme());
    let transport = Arc::new(FakeTransport::new().with_content("f1", HELLO));

    let coordinator =
        DownloadCoordinator::new(drive.clone(), transport.clone(), options(root.path(), logs.path()));

    let first = coordinator.run().await.unwrap();
    assert_eq!(first.failures, 0);
    assert_eq!(first.directories_created, 1);
    assert_eq!(first.files_downloaded, 1);
    assert_eq!(first.bytes_downloaded, 11);
    assert!(root.path().join("Docs").is_dir());
    assert_eq!(std::fs::read(root.path().join("readme.txt")).unwrap(), HELLO);
    assert_eq!(transport.transfer_count(), 1);

    let second = coordinator.run().await.unwrap();
    assert_eq!(second.failures, 0);
    assert_eq!(second.files_downloaded, 0);
    assert_eq!(second.files_verified, 1);
    assert_eq!(second.directories_created, 0);
    assert_eq!(transport.transfer_count(), 1, "rerun must not transfer");
    assert!(second.is_success());
}

#[tokio::test]
async fn test_transfer_request_carries_options() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::new().with_content("f1", HELLO));
    let mut opts = options(root.path(), logs.path());
    opts.max_parallel_chunks = 6;
    opts.throughput_cap_bytes_per_sec = 2048;
    opts.max_retries = 4;

    DownloadCoordinator::new(Arc::new(docs_and_readme()), transport.clone(), opts)
        .run()
        .await
        .unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.destination, root.path().join("readme.txt"));
    assert_eq!(request.expected_size, Some(11));
    assert_eq!(request.chunk_concurrency, 6);
    assert_eq!(request.throughput_cap_bytes_per_sec, 2048);
    assert_eq!(request.max_retries, 4);
}

#[tokio::test]
async fn test_nested_paths_with_reserved_characters() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = FakeDrive::new()
        .with_children("root", vec![dir_entry("d1", "Q&A's #1!", ROOT_PARENT)])
        .with_children(
            "d1",
            vec![
                dir_entry("d2", "C++ $notes", "/drive/root:/Q&A's%20#1!"),
                file_entry("f1", "a.txt", "/drive/root:/Q&A's%20#1!", b"aaa"),
            ],
        )
        .with_children(
            "d2",
            vec![file_entry(
                "f2",
                "b \"quoted\".txt",
                "/drive/root:/Q&A's%20#1!/C++%20$notes",
                b"bbb",
            )],
        );
    let transport = FakeTransport::new()
        .with_content("f1", b"aaa")
        .with_content("f2", b"bbb");

    let summary = DownloadCoordinator::new(
        Arc::new(drive),
        Arc::new(transport),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.directories_created, 2);
    let top = root.path().join("Q&A's #1!");
    assert_eq!(std::fs::read(top.join("a.txt")).unwrap(), b"aaa");
    assert_eq!(
        std::fs::read(top.join("C++ $notes").join("b \"quoted\".txt")).unwrap(),
        b"bbb"
    );
}

#[tokio::test]
async fn test_paginated_root_is_merged() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = Arc::new(FakeDrive::new().with_pages(
        "root",
        vec![
            vec![file_entry("f1", "one.txt", ROOT_PARENT, b"1")],
            vec![file_entry("f2", "two.txt", ROOT_PARENT, b"22")],
            vec![file_entry("f3", "three.txt", ROOT_PARENT, b"333")],
        ],
    ));
    let transport = FakeTransport::new()
        .with_content("f1", b"1")
        .with_content("f2", b"22")
        .with_content("f3", b"333");

    let summary = DownloadCoordinator::new(
        drive.clone(),
        Arc::new(transport),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.files_downloaded, 3);
    let calls = drive.list_calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].1, None);
    assert!(calls[2].1.as_deref().unwrap().ends_with("page=2"));
}

#[tokio::test]
async fn test_item_without_download_url_is_skipped() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = FakeDrive::new()
        .with_children(
            "root",
            vec![bare_file_entry("n1", "Notebook", ROOT_PARENT, 0)],
        )
        .without_url("n1");
    let transport = Arc::new(FakeTransport::new());

    let summary = DownloadCoordinator::new(
        Arc::new(drive),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.retries, 0);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(transport.transfer_count(), 0);
    assert!(!root.path().join("Notebook").exists());
}

#[tokio::test]
async fn test_unverifiable_file_is_never_retried() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = Arc::new(
        FakeDrive::new().with_children("root", vec![bare_file_entry("f1", "x.bin", ROOT_PARENT, 3)]),
    );
    let transport = Arc::new(FakeTransport::new().with_content("f1", b"xyz"));
    let coordinator =
        DownloadCoordinator::new(drive, transport.clone(), options(root.path(), logs.path()));

    let first = coordinator.run().await.unwrap();
    assert_eq!(first.files_downloaded, 1);
    assert_eq!(first.retries, 0);
    assert_eq!(first.failures, 0);

    let second = coordinator.run().await.unwrap();
    assert_eq!(second.files_skipped, 1);
    assert_eq!(second.retries, 0);
    assert_eq!(transport.transfer_count(), 1);
}

#[tokio::test]
async fn test_corrupted_existing_file_is_repaired() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    std::fs::write(root.path().join("readme.txt"), b"hello w0rld").unwrap();
    let transport = Arc::new(FakeTransport::new().with_content("f1", HELLO));

    let summary = DownloadCoordinator::new(
        Arc::new(docs_and_readme()),
        transport.clone(),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(std::fs::read(root.path().join("readme.txt")).unwrap(), HELLO);
    assert_eq!(transport.transfer_count(), 1);
}

#[tokio::test]
async fn test_existing_file_accepted_when_verification_disabled() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    std::fs::write(root.path().join("readme.txt"), b"stale").unwrap();
    let transport = Arc::new(FakeTransport::new().with_content("f1", HELLO));
    let mut opts = options(root.path(), logs.path());
    opts.verify_on_existing = false;

    let summary = DownloadCoordinator::new(Arc::new(docs_and_readme()), transport.clone(), opts)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.files_skipped, 1);
    assert_eq!(transport.transfer_count(), 0);
    assert_eq!(std::fs::read(root.path().join("readme.txt")).unwrap(), b"stale");
}

#[tokio::test]
async fn test_root_listing_failure_is_fatal() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = FakeDrive::new().with_failing("root");
    let opts = options(root.path(), logs.path());
    let log_path = opts.error_log_path.clone();

    let result = DownloadCoordinator::new(Arc::new(drive), Arc::new(FakeTransport::new()), opts)
        .run()
        .await;

    assert!(matches!(result, Err(MirrorError::RootListing(_))));
    assert_eq!(read_log(&log_path).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_between_file_transfers() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = FakeDrive::new().with_children(
        "root",
        vec![
            file_entry("f1", "one.txt", ROOT_PARENT, b"1"),
            file_entry("f2", "two.txt", ROOT_PARENT, b"2"),
            file_entry("f3", "three.txt", ROOT_PARENT, b"3"),
        ],
    );
    let transport = FakeTransport::new()
        .with_content("f1", b"1")
        .with_content("f2", b"2")
        .with_content("f3", b"3");
    let mut opts = options(root.path(), logs.path());
    opts.pause_between_files = std::time::Duration::from_secs(1);

    let before = tokio::time::Instant::now();
    let summary = DownloadCoordinator::new(Arc::new(drive), Arc::new(transport), opts)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.files_downloaded, 3);
    assert!(before.elapsed() >= std::time::Duration::from_secs(2));
}
