//! Parallel ranged HTTP downloads
//!
//! [`HttpChunkedTransport`] implements [`IChunkedTransport`] against the
//! pre-authorized download URLs returned by Graph. Those URLs carry their
//! own authorization, so requests are sent without a bearer token.
//!
//! ## Transfer Flow
//!
//! 1. **Size**: taken from the request, or looked up with `HEAD`
//! 2. **Plan**: the file is split into at most `chunk_concurrency` byte
//!    ranges of at least `min_chunk_size` bytes each
//! 3. **Fetch**: ranges are fetched concurrently into a pre-sized
//!    `<destination>.part` file, each one resuming from its last written
//!    byte on failure, up to `max_retries` times
//! 4. **Commit**: the `.part` file is renamed onto the destination
//!
//! A failed or cancelled transfer removes the `.part` file, so nothing is
//! left behind at either path.

use std::ffi::OsString;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::{header, Client, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ripdrive_core::ports::{
    IChunkedTransport, ProgressFn, TransferOutcome, TransferProgress, TransferRequest,
};

use crate::rate_limit::ThroughputLimiter;

/// Files smaller than this are fetched with a single request
const DEFAULT_MIN_CHUNK_SIZE: u64 = 1024;

/// Base delay between attempts on the same range; grows linearly
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Suffix of the in-progress file next to the destination
const PART_SUFFIX: &str = ".part";

// ============================================================================
// Range planning
// ============================================================================

/// One byte range of a transfer, `end` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: u64,
    /// `None` reads to the end of the body (size unknown)
    end: Option<u64>,
}

impl Span {
    fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }
}

/// Splits `total` bytes into at most `concurrency` contiguous spans
fn plan_spans(total: u64, concurrency: usize, min_chunk_size: u64) -> Vec<Span> {
    if total == 0 {
        return Vec::new();
    }

    let concurrency = concurrency.max(1) as u64;
    let chunk = total.div_ceil(concurrency).max(min_chunk_size.max(1));

    let mut spans = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk).min(total) - 1;
        spans.push(Span {
            start,
            end: Some(end),
        });
        start = end + 1;
    }
    spans
}

/// Returns `<destination>.part`
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

// ============================================================================
// Progress accounting
// ============================================================================

struct ProgressState<'a> {
    callback: &'a ProgressFn,
    total: Option<u64>,
    received: AtomicU64,
    active: AtomicUsize,
    started: Instant,
}

impl<'a> ProgressState<'a> {
    fn new(callback: &'a ProgressFn, total: Option<u64>) -> Self {
        Self {
            callback,
            total,
            received: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    fn add(&self, bytes: u64) {
        let received = self.received.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let secs = self.started.elapsed().as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            received as f64 / secs
        } else {
            0.0
        };
        (self.callback)(TransferProgress {
            received,
            total: self.total,
            active_chunks: self.active.load(Ordering::Relaxed),
            bytes_per_sec,
        });
    }
}

// ============================================================================
// HttpChunkedTransport
// ============================================================================

/// Chunked downloader for pre-authorized content URLs
pub struct HttpChunkedTransport {
    client: Client,
    min_chunk_size: u64,
    retry_backoff: Duration,
    /// Shared across transfers so the cap holds for the whole run
    limiter: Mutex<Option<Arc<ThroughputLimiter>>>,
}

impl Default for HttpChunkedTransport {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHUNK_SIZE)
    }
}

impl HttpChunkedTransport {
    /// Creates a transport that splits files of at least `min_chunk_size`
    /// bytes into ranges
    pub fn new(min_chunk_size: u64) -> Self {
        Self::with_client(Client::new(), min_chunk_size)
    }

    /// Creates a transport on top of an existing reqwest client
    pub fn with_client(client: Client, min_chunk_size: u64) -> Self {
        Self {
            client,
            min_chunk_size: min_chunk_size.max(1),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            limiter: Mutex::new(None),
        }
    }

    /// Overrides the base delay between attempts on a failed range
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn limiter_for(&self, cap: u64) -> Option<Arc<ThroughputLimiter>> {
        if cap == 0 {
            return None;
        }
        let mut slot = self.limiter.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(limiter) if limiter.bytes_per_sec() == cap => Some(Arc::clone(limiter)),
            _ => {
                let limiter = Arc::new(ThroughputLimiter::new(cap));
                *slot = Some(Arc::clone(&limiter));
                Some(limiter)
            }
        }
    }

    /// Reads `Content-Length` from a `HEAD` response
    async fn head_size(&self, url: &str) -> Option<u64> {
        let response = match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "HEAD refused, size unknown");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "HEAD failed, size unknown");
                return None;
            }
        };
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Fetches one span into the part file, continuing after `*written`
    #[allow(clippy::too_many_arguments)]
    async fn fetch_span(
        &self,
        url: &str,
        part: &Path,
        span: Span,
        ranged: bool,
        limiter: Option<&ThroughputLimiter>,
        progress: &ProgressState<'_>,
        written: &mut u64,
    ) -> Result<()> {
        let offset = span.start + *written;
        let send_range = ranged || *written > 0;

        let mut request = self.client.get(url);
        if send_range {
            let value = match span.end {
                Some(end) => format!("bytes={offset}-{end}"),
                None => format!("bytes={offset}-"),
            };
            request = request.header(header::RANGE, value);
        }

        let response = request.send().await.context("Request failed")?;
        let status = response.status();
        if send_range && status != StatusCode::PARTIAL_CONTENT {
            bail!("Expected 206 for range starting at {offset}, got {status}");
        }
        if !status.is_success() {
            bail!("Server answered {status}");
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(part)
            .await
            .with_context(|| format!("Failed to open {}", part.display()))?;
        file.seek(SeekFrom::Start(offset)).await?;

        let expected = span.len();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Connection dropped mid-transfer")?;
            let len = chunk.len() as u64;
            if expected.is_some_and(|expected| *written + len > expected) {
                bail!("Server sent more bytes than requested for range at {offset}");
            }
            if let Some(limiter) = limiter {
                limiter.acquire(len).await;
            }
            file.write_all(&chunk).await?;
            *written += len;
            progress.add(len);
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if *written != expected {
                bail!(
                    "Range at {} ended after {} of {} bytes",
                    span.start,
                    written,
                    expected
                );
            }
        }
        Ok(())
    }

    /// Fetches one span, resuming and retrying up to `max_retries` times
    #[allow(clippy::too_many_arguments)]
    async fn fetch_with_retries(
        &self,
        url: &str,
        part: &Path,
        span: Span,
        ranged: bool,
        limiter: Option<&ThroughputLimiter>,
        progress: &ProgressState<'_>,
        max_retries: u32,
    ) -> Result<u64> {
        let mut written = 0u64;
        let mut attempt = 0u32;
        loop {
            progress.active.fetch_add(1, Ordering::Relaxed);
            let result = self
                .fetch_span(url, part, span, ranged, limiter, progress, &mut written)
                .await;
            progress.active.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(()) => return Ok(written),
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        start = span.start,
                        written,
                        attempt,
                        error = %err,
                        "Range failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => {
                    return Err(err.context(format!(
                        "range at {} failed after {} attempts",
                        span.start,
                        attempt + 1
                    )))
                }
            }
        }
    }

    async fn run(&self, request: &TransferRequest, part: &Path, progress: &ProgressFn) -> Result<u64> {
        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let total = match request.expected_size {
            Some(size) => Some(size),
            None => self.head_size(&request.source_url).await,
        };

        let file = fs::File::create(part)
            .await
            .with_context(|| format!("Failed to create {}", part.display()))?;
        if let Some(total) = total {
            file.set_len(total).await?;
        }
        drop(file);

        let spans = match total {
            Some(total) => plan_spans(total, request.chunk_concurrency, self.min_chunk_size),
            None => vec![Span {
                start: 0,
                end: None,
            }],
        };
        let ranged = spans.len() > 1;
        let limiter = self.limiter_for(request.throughput_cap_bytes_per_sec);
        let state = ProgressState::new(progress, total);

        debug!(
            path = %request.destination.display(),
            total,
            ranges = spans.len(),
            "Starting transfer"
        );

        let bytes = stream::iter(spans)
            .map(|span| {
                self.fetch_with_retries(
                    &request.source_url,
                    part,
                    span,
                    ranged,
                    limiter.as_deref(),
                    &state,
                    request.max_retries,
                )
            })
            .buffer_unordered(request.chunk_concurrency.max(1))
            .try_fold(0u64, |acc, bytes| async move { Ok(acc + bytes) })
            .await?;

        fs::rename(part, &request.destination)
            .await
            .with_context(|| format!("Failed to move {} into place", part.display()))?;

        info!(path = %request.destination.display(), bytes, "Transfer complete");
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl IChunkedTransport for HttpChunkedTransport {
    async fn transfer(
        &self,
        request: &TransferRequest,
        progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled;
        }

        let part = part_path(&request.destination);
        let outcome = tokio::select! {
            biased;
            result = self.run(request, &part, progress) => match result {
                Ok(bytes) => TransferOutcome::Completed { bytes },
                Err(err) => TransferOutcome::Failed { reason: format!("{err:#}") },
            },
            _ = cancel.cancelled() => TransferOutcome::Cancelled,
        };

        if !outcome.is_completed() {
            if let Err(e) = fs::remove_file(&part).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %part.display(), error = %e, "Failed to remove partial file");
                }
            }
        }
        outcome
    }
}
