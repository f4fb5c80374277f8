//! Chunked transport port (driven/secondary port)
//!
//! The engine never performs HTTP range splitting itself. It configures a
//! [`TransferRequest`], hands it to an [`IChunkedTransport`] together with a
//! progress callback and a cancellation token, and interprets the returned
//! [`TransferOutcome`].

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Everything a transport needs to fetch one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Pre-authorized content URL
    pub source_url: String,
    /// Final local path of the file
    pub destination: PathBuf,
    /// Expected content size, when the provider reported one
    pub expected_size: Option<u64>,
    /// Global throughput cap in bytes per second (0 = unlimited)
    pub throughput_cap_bytes_per_sec: u64,
    /// Maximum byte-range requests in flight for this file
    pub chunk_concurrency: usize,
    /// Failover attempts per byte range before the transfer fails
    pub max_retries: u32,
}

/// Progress snapshot delivered while a transfer is running
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    /// Bytes written so far
    pub received: u64,
    /// Total bytes, when known
    pub total: Option<u64>,
    /// Byte-range requests currently in flight
    pub active_chunks: usize,
    /// Average throughput since the transfer started
    pub bytes_per_sec: f64,
}

impl TransferProgress {
    /// Completion percentage, when the total is known and non-zero
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.received as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

/// Terminal result of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes were written to the destination
    Completed {
        /// Number of bytes written
        bytes: u64,
    },
    /// The transfer failed; nothing is left at the destination
    Failed {
        /// Human-readable failure reason
        reason: String,
    },
    /// The transfer was cancelled through its token
    Cancelled,
}

impl TransferOutcome {
    /// Returns true for [`TransferOutcome::Completed`]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }
}

/// Progress callback type
pub type ProgressFn = dyn Fn(TransferProgress) + Send + Sync;

/// Port trait for content transfer
#[async_trait::async_trait]
pub trait IChunkedTransport: Send + Sync {
    /// Transfers the full content of `request.source_url` to `request.destination`
    ///
    /// `progress` may be invoked any number of times while the transfer runs.
    /// Cancellation is cooperative: once `cancel` fires the transport stops
    /// at the next chunk boundary and returns [`TransferOutcome::Cancelled`].
    async fn transfer(
        &self,
        request: &TransferRequest,
        progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> TransferOutcome;
}
