//! Single file download attempt
//!
//! A [`DownloadTask`] owns the [`DownloadStatus`] of one attempt. It fetches
//! the short-lived content URL, hands the transfer to the transport and maps
//! the outcome. Verification is the coordinator's concern.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ripdrive_core::domain::{DownloadStatus, RemoteItem};
use ripdrive_core::ports::{
    IChunkedTransport, IRemoteDrive, TransferOutcome, TransferProgress, TransferRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::humanize::{format_bytes, format_size};
use crate::MirrorError;

/// Transport tuning shared by every attempt in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub chunk_concurrency: usize,
    pub throughput_cap_bytes_per_sec: u64,
    pub max_retries: u32,
}

/// What a successful attempt produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadResult {
    /// Content was written to the destination
    Finished { bytes: u64 },
    /// The provider offers no content URL for this item; nothing was done
    NoContentUrl,
}

/// One download attempt for one remote file
#[derive(Debug)]
pub struct DownloadTask<'a> {
    item: &'a RemoteItem,
    destination: &'a Path,
    status: DownloadStatus,
}

impl<'a> DownloadTask<'a> {
    pub fn new(item: &'a RemoteItem, destination: &'a Path) -> Self {
        Self {
            item,
            destination,
            status: DownloadStatus::NotStarted,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    /// Runs the attempt to a terminal state
    ///
    /// Returns [`DownloadResult::NoContentUrl`] without leaving `NotStarted`
    /// when the provider cannot serve the item directly.
    ///
    /// # Errors
    /// [`MirrorError::Transfer`] when the URL lookup fails or the transport
    /// reports failure or cancellation. The status is `Failed` afterwards.
    #[instrument(skip_all, fields(id = %self.item.id(), path = %self.destination.display()))]
    pub async fn run(
        &mut self,
        drive: &dyn IRemoteDrive,
        transport: &dyn IChunkedTransport,
        settings: &TransferSettings,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, MirrorError> {
        let url = match drive.get_download_url(self.item.id()).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                info!(name = self.item.name(), "No download URL, skipping");
                return Ok(DownloadResult::NoContentUrl);
            }
            Err(err) => {
                return self.fail(format!("download URL lookup failed: {err:#}"));
            }
        };

        self.status.transition_to(DownloadStatus::InProgress)?;
        match self.item.size() {
            Some(size) => info!("Downloading {} - {} total", self.item.name(), format_size(size)),
            None => info!("Downloading {}", self.item.name()),
        }

        let request = TransferRequest {
            source_url: url,
            destination: self.destination.to_path_buf(),
            expected_size: self.item.size(),
            throughput_cap_bytes_per_sec: settings.throughput_cap_bytes_per_sec,
            chunk_concurrency: settings.chunk_concurrency,
            max_retries: settings.max_retries,
        };
        let reporter = ProgressReporter::new();
        let progress = move |p: TransferProgress| {
            reporter.report(p);
        };

        match transport.transfer(&request, &progress, cancel).await {
            TransferOutcome::Completed { bytes } => {
                self.status.transition_to(DownloadStatus::Finished)?;
                debug!(bytes, "Transfer completed");
                Ok(DownloadResult::Finished { bytes })
            }
            TransferOutcome::Failed { reason } => self.fail(reason),
            TransferOutcome::Cancelled => self.fail("cancelled".to_string()),
        }
    }

    fn fail(&mut self, reason: String) -> Result<DownloadResult, MirrorError> {
        self.status.transition_to(DownloadStatus::Failed)?;
        Err(MirrorError::Transfer {
            path: self.destination.to_path_buf(),
            reason,
        })
    }
}

/// Logs progress, skipping updates whose percentage (truncated to two
/// decimals) has not changed
struct ProgressReporter {
    last_basis_points: AtomicU64,
}

impl ProgressReporter {
    const NONE: u64 = u64::MAX;

    fn new() -> Self {
        Self {
            last_basis_points: AtomicU64::new(Self::NONE),
        }
    }

    /// Returns true when the update was logged
    fn report(&self, progress: TransferProgress) -> bool {
        let Some(total) = progress.total.filter(|total| *total > 0) else {
            debug!(received = progress.received, "Transfer progress");
            return false;
        };
        let basis_points = (u128::from(progress.received) * 10_000 / u128::from(total)) as u64;
        if self.last_basis_points.swap(basis_points, Ordering::Relaxed) == basis_points {
            return false;
        }
        info!(
            "[{} jobs total] - {}% completed. Average speed: {}/s",
            progress.active_chunks,
            basis_points as f64 / 100.0,
            format_bytes(progress.bytes_per_sec)
        );
        true
    }
}
