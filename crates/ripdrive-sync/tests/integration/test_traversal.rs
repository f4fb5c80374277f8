//! Traversal failures: directory creation, subtree listing, missing identity

use std::sync::Arc;

use ripdrive_core::ports::RemoteEntry;
use ripdrive_sync::coordinator::DownloadCoordinator;
use tempfile::TempDir;

use crate::common::*;

#[tokio::test]
async fn test_failed_directory_skips_its_subtree() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    // A regular file where directory A should go
    std::fs::write(root.path().join("A"), b"in the way").unwrap();

    let drive = Arc::new(
        FakeDrive::new()
            .with_children(
                "root",
                vec![
                    dir_entry("a", "A", ROOT_PARENT),
                    file_entry("f0", "top.txt", ROOT_PARENT, b"top"),
                ],
            )
            .with_children("a", vec![dir_entry("b", "B", "/drive/root:/A")])
            .with_children(
                "b",
                vec![file_entry("f1", "file.txt", "/drive/root:/A/B", b"deep")],
            ),
    );
    let transport = Arc::new(
        FakeTransport::new()
            .with_content("f0", b"top")
            .with_content("f1", b"deep"),
    );
    let opts = options(root.path(), logs.path());
    let log_path = opts.error_log_path.clone();

    let summary = DownloadCoordinator::new(drive.clone(), transport.clone(), opts)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failures, 1);
    assert_eq!(summary.files_downloaded, 1);
    assert!(!drive.listed("a"));
    assert!(!drive.listed("b"));
    assert_eq!(transport.transfers_of("f1"), 0);
    assert!(!root.path().join("A").join("B").join("file.txt").exists());
    assert!(root.path().join("A").is_file());
    assert!(read_log(&log_path)[0].contains("Failed to create directory"));
}

#[tokio::test]
async fn test_subtree_listing_failure_is_counted() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = FakeDrive::new()
        .with_children(
            "root",
            vec![
                dir_entry("d1", "Locked", ROOT_PARENT),
                dir_entry("d2", "Open", ROOT_PARENT),
            ],
        )
        .with_failing("d1")
        .with_children(
            "d2",
            vec![file_entry("f1", "a.txt", "/drive/root:/Open", b"a")],
        );
    let transport = FakeTransport::new().with_content("f1", b"a");

    let summary = DownloadCoordinator::new(
        Arc::new(drive),
        Arc::new(transport),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 1);
    assert!(summary.errors[0].contains("d1"));
    assert!(root.path().join("Locked").is_dir());
    assert_eq!(std::fs::read(root.path().join("Open").join("a.txt")).unwrap(), b"a");
}

#[tokio::test]
async fn test_entries_without_identity_are_counted() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let nameless = RemoteEntry {
        name: None,
        ..dir_entry("d1", "x", ROOT_PARENT)
    };
    let idless = RemoteEntry {
        id: None,
        ..file_entry("f9", "orphan.txt", ROOT_PARENT, b"o")
    };
    let drive = FakeDrive::new().with_children(
        "root",
        vec![
            nameless,
            idless,
            file_entry("f1", "ok.txt", ROOT_PARENT, b"ok"),
        ],
    );
    let transport = FakeTransport::new().with_content("f1", b"ok");

    let summary = DownloadCoordinator::new(
        Arc::new(drive),
        Arc::new(transport),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures, 2);
    assert_eq!(summary.files_downloaded, 1);
    assert!(summary
        .errors
        .iter()
        .all(|e| e.contains("missing its identity")));
}

#[tokio::test]
async fn test_depth_first_order() {
    let root = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let drive = Arc::new(
        FakeDrive::new()
            .with_children(
                "root",
                vec![
                    dir_entry("a", "A", ROOT_PARENT),
                    dir_entry("b", "B", ROOT_PARENT),
                ],
            )
            .with_children("a", vec![dir_entry("a1", "A1", "/drive/root:/A")])
            .with_children("b", vec![])
            .with_children("a1", vec![]),
    );

    let summary = DownloadCoordinator::new(
        drive.clone(),
        Arc::new(FakeTransport::new()),
        options(root.path(), logs.path()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.directories_created, 3);
    let listed: Vec<String> = drive
        .list_calls
        .lock()
        .unwrap()
        .iter()
        .map(|(c, _)| c.clone())
        .collect();
    // Children of a frame are listed when the frame is processed; frames pop LIFO.
    assert_eq!(listed, vec!["root", "a", "b", "a1"]);
    assert!(root.path().join("A").join("A1").is_dir());
}
