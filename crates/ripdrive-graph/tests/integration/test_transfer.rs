//! Integration tests for HttpChunkedTransport
//!
//! Serves content from a wiremock server that honours byte ranges and
//! verifies:
//! - Small files use a single unranged request
//! - Large files are split into concurrent ranges
//! - Failed ranges are retried, then the transfer fails cleanly
//! - Cancellation leaves nothing behind
//! - Unknown sizes fall back to a single stream

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ripdrive_core::ports::{IChunkedTransport, TransferOutcome, TransferRequest};
use ripdrive_graph::transfer::{part_path, HttpChunkedTransport};

use crate::common::{self, ProgressRecorder};

fn transport() -> HttpChunkedTransport {
    HttpChunkedTransport::new(1024).with_retry_backoff(Duration::ZERO)
}

fn request(url: String, destination: &Path, size: Option<u64>) -> TransferRequest {
    TransferRequest {
        source_url: url,
        destination: destination.to_path_buf(),
        expected_size: size,
        throughput_cap_bytes_per_sec: 0,
        chunk_concurrency: 4,
        max_retries: 2,
    }
}

async fn ranged_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| r.headers.get("range").and_then(|v| v.to_str().ok()).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_small_file_single_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let data = common::content(100);
    let url = common::mount_content(&server, "small", data.clone()).await;
    let dest = dir.path().join("small.bin");

    let recorder = ProgressRecorder::default();
    let callback = recorder.callback();
    let outcome = transport()
        .transfer(
            &request(url, &dest, Some(100)),
            &callback,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 100 });
    assert_eq!(std::fs::read(&dest).unwrap(), data);
    assert!(ranged_requests(&server).await.is_empty());
    assert_eq!(recorder.events().last().unwrap().received, 100);
}

#[tokio::test]
async fn test_large_file_uses_parallel_ranges() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let data = common::content(4096);
    let url = common::mount_content(&server, "large", data.clone()).await;
    let dest = dir.path().join("nested").join("large.bin");

    let recorder = ProgressRecorder::default();
    let callback = recorder.callback();
    let outcome = transport()
        .transfer(
            &request(url, &dest, Some(4096)),
            &callback,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 4096 });
    assert_eq!(std::fs::read(&dest).unwrap(), data);
    assert!(!part_path(&dest).exists());

    let mut ranges = ranged_requests(&server).await;
    ranges.sort();
    assert_eq!(
        ranges,
        vec![
            "bytes=0-1023",
            "bytes=1024-2047",
            "bytes=2048-3071",
            "bytes=3072-4095"
        ]
    );

    let events = recorder.events();
    assert_eq!(events.last().unwrap().received, 4096);
    assert!(events.iter().all(|p| p.total == Some(4096)));
}

#[tokio::test]
async fn test_failed_range_is_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let data = common::content(2048);

    Mock::given(method("GET"))
        .and(path("/content/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    let url = common::mount_content(&server, "flaky", data.clone()).await;
    let dest = dir.path().join("flaky.bin");

    let outcome = transport()
        .transfer(
            &request(url, &dest, Some(2048)),
            &|_| {},
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 2048 });
    assert_eq!(std::fs::read(&dest).unwrap(), data);
}

#[tokio::test]
async fn test_exhausted_retries_fail_without_leftovers() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/content/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dest = dir.path().join("broken.bin");
    let url = format!("{}/content/broken", server.uri());

    let outcome = transport()
        .transfer(
            &request(url, &dest, Some(4096)),
            &|_| {},
            &CancellationToken::new(),
        )
        .await;

    match outcome {
        TransferOutcome::Failed { reason } => assert!(reason.contains("failed after 3 attempts")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn test_ignored_range_header_fails() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/content/norange"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::content(4096)))
        .mount(&server)
        .await;
    let dest = dir.path().join("norange.bin");
    let mut req = request(format!("{}/content/norange", server.uri()), &dest, Some(4096));
    req.max_retries = 0;

    let outcome = transport()
        .transfer(&req, &|_| {}, &CancellationToken::new())
        .await;

    assert!(matches!(outcome, TransferOutcome::Failed { .. }));
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("never.bin");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = transport()
        .transfer(
            &request("http://127.0.0.1:9/never".to_string(), &dest, Some(10)),
            &|_| {},
            &cancel,
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_cancel_mid_transfer_removes_part_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/content/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(common::content(10))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    let dest = dir.path().join("slow.bin");
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = transport()
        .transfer(
            &request(format!("{}/content/slow", server.uri()), &dest, Some(10)),
            &|_| {},
            &cancel,
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn test_unknown_size_streams_whole_body() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let data = common::content(5000);

    Mock::given(method("HEAD"))
        .and(path("/content/unsized"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    let url = common::mount_content(&server, "unsized", data.clone()).await;
    let dest = dir.path().join("unsized.bin");

    let outcome = transport()
        .transfer(&request(url, &dest, None), &|_| {}, &CancellationToken::new())
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 5000 });
    assert_eq!(std::fs::read(&dest).unwrap(), data);
    assert!(ranged_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("empty.txt");

    let outcome = transport()
        .transfer(
            &request("http://127.0.0.1:9/empty".to_string(), &dest, Some(0)),
            &|_| {},
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 0 });
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 0);
}

#[tokio::test]
async fn test_throughput_cap_still_completes() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let data = common::content(2048);
    let url = common::mount_content(&server, "capped", data.clone()).await;
    let dest = dir.path().join("capped.bin");

    let mut req = request(url, &dest, Some(2048));
    req.throughput_cap_bytes_per_sec = 1024 * 1024;

    let outcome = transport()
        .transfer(&req, &|_| {}, &CancellationToken::new())
        .await;

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 2048 });
    assert_eq!(std::fs::read(&dest).unwrap(), data);
}
