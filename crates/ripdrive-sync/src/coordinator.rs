//! Mirror run orchestration
//!
//! The [`DownloadCoordinator`] drives one complete run:
//!
//! 1. **Walk**: list the root, then pop frames from a LIFO work-stack.
//!    Directories are created and their children pushed; files are downloaded
//!    when absent and verified either way.
//! 2. **Replay**: retryable failures from the walk are attempted exactly once
//!    more. A second failure is final.
//! 3. **Summary**: counts plus the path of the run's error log.
//!
//! Only a failed root listing aborts the run. Every other error is logged,
//! counted and the walk continues.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ripdrive_core::config::MirrorOptions;
use ripdrive_core::domain::{RemoteId, RemoteItem};
use ripdrive_core::ports::{IChunkedTransport, IRemoteDrive};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::download::{DownloadResult, DownloadTask, TransferSettings};
use crate::error_log::ErrorLog;
use crate::humanize::format_size;
use crate::path_resolver::PathResolver;
use crate::retry_ledger::RetryLedger;
use crate::verifier::{IntegrityVerifier, VerifyResult};
use crate::walker::{RemoteTreeWalker, TraversalFrame};
use crate::MirrorError;

/// Summary of a completed mirroring run
#[derive(Debug, Clone, Default)]
pub struct MirrorSummary {
    /// Items that could not be mirrored (final failures)
    pub failures: usize,
    /// Path of this run's error log
    pub error_log: PathBuf,
    pub directories_created: usize,
    pub files_downloaded: usize,
    /// Existing files whose digests matched
    pub files_verified: usize,
    /// Existing files accepted without verification, and items with no content URL
    pub files_skipped: usize,
    /// Records replayed after the walk
    pub retries: usize,
    pub bytes_downloaded: u64,
    /// True when the run stopped early because it was cancelled
    pub cancelled: bool,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// Messages of the final failures, in the order they occurred
    pub errors: Vec<String>,
}

impl MirrorSummary {
    pub fn is_success(&self) -> bool {
        self.failures == 0 && !self.cancelled
    }
}

/// How one file was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Downloaded { bytes: u64 },
    Verified,
    Skipped,
}

/// Mutable state of one run, owned by [`DownloadCoordinator::run`]
struct RunState {
    ledger: RetryLedger,
    log: ErrorLog,
    summary: MirrorSummary,
    transfers_started: usize,
}

impl RunState {
    async fn fail(&mut self, err: MirrorError) {
        error!(%err, "Item failed");
        self.log.append(&err).await;
        self.summary.failures += 1;
        self.summary.errors.push(err.to_string());
    }

    fn tally(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { bytes } => {
                self.summary.files_downloaded += 1;
                self.summary.bytes_downloaded += bytes;
            }
            FileOutcome::Verified => self.summary.files_verified += 1,
            FileOutcome::Skipped => self.summary.files_skipped += 1,
        }
    }
}

/// Mirrors a remote tree below a local root
pub struct DownloadCoordinator {
    drive: Arc<dyn IRemoteDrive>,
    transport: Arc<dyn IChunkedTransport>,
    options: MirrorOptions,
    walker: RemoteTreeWalker,
    resolver: PathResolver,
    verifier: IntegrityVerifier,
    cancel: CancellationToken,
}

impl DownloadCoordinator {
    pub fn new(
        drive: Arc<dyn IRemoteDrive>,
        transport: Arc<dyn IChunkedTransport>,
        options: MirrorOptions,
    ) -> Self {
        Self {
            walker: RemoteTreeWalker::new(Arc::clone(&drive)),
            resolver: PathResolver::new(options.root.clone()),
            verifier: IntegrityVerifier::new(options.buffer_size_bytes),
            drive,
            transport,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to cancel in-flight transfers and stop the walk
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this coordinator's run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the walk, the replay pass and returns the summary
    ///
    /// # Errors
    /// Only [`MirrorError::RootListing`], when the root container cannot be
    /// listed at all.
    #[instrument(skip(self), fields(root = %self.options.root.display()))]
    pub async fn run(&self) -> Result<MirrorSummary, MirrorError> {
        let started = Instant::now();
        let log = ErrorLog::open(&self.options.error_log_path).await;
        let mut state = RunState {
            ledger: RetryLedger::new(),
            summary: MirrorSummary {
                error_log: log.path().to_path_buf(),
                ..MirrorSummary::default()
            },
            log,
            transfers_started: 0,
        };

        info!("Starting mirror run");

        if let Err(source) = tokio::fs::create_dir_all(&self.options.root).await {
            state
                .fail(MirrorError::DirectoryCreate {
                    path: self.options.root.clone(),
                    source,
                })
                .await;
            return Ok(self.finish(state, started));
        }

        let root = RemoteId::root();
        let root_frame = match self.walker.list_children(&root).await {
            Ok(frame) => frame,
            Err(err) => {
                let fatal = MirrorError::RootListing(err.to_string());
                state.log.append(&fatal).await;
                return Err(fatal);
            }
        };

        self.walk(root, root_frame, &mut state).await;
        self.replay(&mut state).await;

        Ok(self.finish(state, started))
    }

    /// Depth-first walk over an explicit stack of frames
    async fn walk(&self, root: RemoteId, root_frame: TraversalFrame, state: &mut RunState) {
        let mut stack: Vec<(RemoteId, TraversalFrame)> = vec![(root, root_frame)];

        while let Some((container, frame)) = stack.pop() {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled, stopping traversal");
                state.summary.cancelled = true;
                return;
            }
            debug!(
                container = %container,
                files = frame.files.len(),
                directories = frame.directories.len(),
                remaining = stack.len(),
                "Processing frame"
            );

            for detail in frame.rejected {
                state
                    .fail(MirrorError::MissingIdentity {
                        container: container.to_string(),
                        detail,
                    })
                    .await;
            }

            for directory in frame.directories {
                let path = self.resolver.local_path(&directory);
                match self.ensure_directory(&path).await {
                    Ok(created) => {
                        if created {
                            state.summary.directories_created += 1;
                        }
                    }
                    Err(err) => {
                        state.fail(err).await;
                        continue;
                    }
                }

                match self.walker.list_children(directory.id()).await {
                    Ok(children) => stack.push((directory.id().clone(), children)),
                    Err(err) => state.fail(err).await,
                }
            }

            for file in frame.files {
                if self.cancel.is_cancelled() {
                    warn!("Run cancelled, stopping traversal");
                    state.summary.cancelled = true;
                    return;
                }
                let path = self.resolver.local_path(&file);
                match self.process_file(&file, &path, state).await {
                    Ok(outcome) => state.tally(outcome),
                    Err(err) if err.is_retryable() => {
                        warn!(%err, "Deferring item to the replay pass");
                        remove_partial(&path).await;
                        state.ledger.record(file, path);
                    }
                    Err(err) => state.fail(err).await,
                }
            }
        }
    }

    /// Re-attempts every deferred record once
    async fn replay(&self, state: &mut RunState) {
        let records = state.ledger.drain();
        if records.is_empty() {
            return;
        }
        info!(count = records.len(), "Replaying failed downloads");
        state.summary.retries = records.len();

        for record in records {
            let result = if self.cancel.is_cancelled() {
                state.summary.cancelled = true;
                Err(MirrorError::Transfer {
                    path: record.intended_local_path.clone(),
                    reason: "cancelled before replay".to_string(),
                })
            } else {
                self.process_file(&record.item, &record.intended_local_path, state)
                    .await
            };

            match result {
                Ok(outcome) => {
                    info!(id = %record.id, "Replay succeeded");
                    state.tally(outcome);
                }
                Err(err) => {
                    remove_partial(&record.intended_local_path).await;
                    state.fail(err).await;
                }
            }
        }
    }

    /// Creates `path` if needed; returns whether it was created
    async fn ensure_directory(&self, path: &Path) -> Result<bool, MirrorError> {
        if tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Ok(false);
        }
        debug!(path = %path.display(), "Creating local directory");
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| MirrorError::DirectoryCreate {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(true)
    }

    #[instrument(skip(self, item, state), fields(id = %item.id(), path = %path.display()))]
    async fn process_file(
        &self,
        item: &RemoteItem,
        path: &Path,
        state: &mut RunState,
    ) -> Result<FileOutcome, MirrorError> {
        let exists = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if exists {
            if !self.options.verify_on_existing {
                debug!("File exists, verification disabled");
                return Ok(FileOutcome::Skipped);
            }
            info!("File exists, verifying");
            return match self.verify(item, path).await? {
                VerifyResult::Verified => Ok(FileOutcome::Verified),
                _ => Ok(FileOutcome::Skipped),
            };
        }

        self.pause_before_transfer(state).await;
        state.transfers_started += 1;

        let settings = TransferSettings {
            chunk_concurrency: self.options.max_parallel_chunks,
            throughput_cap_bytes_per_sec: self.options.throughput_cap_bytes_per_sec,
            max_retries: self.options.max_retries,
        };
        let mut task = DownloadTask::new(item, path);
        let bytes = match task
            .run(
                self.drive.as_ref(),
                self.transport.as_ref(),
                &settings,
                &self.cancel,
            )
            .await?
        {
            DownloadResult::Finished { bytes } => bytes,
            DownloadResult::NoContentUrl => return Ok(FileOutcome::Skipped),
        };

        info!("Verifying download");
        self.verify(item, path).await.map_err(|err| match err {
            MirrorError::Io(source) => MirrorError::Transfer {
                path: path.to_path_buf(),
                reason: format!("downloaded file could not be verified: {source}"),
            },
            other => other,
        })?;
        info!(bytes, size = %format_size(bytes), "Success");
        Ok(FileOutcome::Downloaded { bytes })
    }

    /// Verifies `path`; a mismatch becomes a retryable error
    async fn verify(&self, item: &RemoteItem, path: &Path) -> Result<VerifyResult, MirrorError> {
        match self.verifier.verify(path, item.file_metadata()).await? {
            VerifyResult::Mismatch {
                kind,
                expected,
                actual,
            } => Err(MirrorError::VerificationMismatch {
                path: path.to_path_buf(),
                kind,
                expected,
                actual,
            }),
            result => Ok(result),
        }
    }

    async fn pause_before_transfer(&self, state: &RunState) {
        let pause = self.options.pause_between_files;
        if state.transfers_started == 0 || pause.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    fn finish(&self, state: RunState, started: Instant) -> MirrorSummary {
        let mut summary = state.summary;
        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            failures = summary.failures,
            downloaded = summary.files_downloaded,
            verified = summary.files_verified,
            skipped = summary.files_skipped,
            directories = summary.directories_created,
            retries = summary.retries,
            duration_ms = summary.duration_ms,
            error_log = %summary.error_log.display(),
            "Mirror run finished"
        );
        summary
    }
}

/// Removes whatever a failed attempt left at `path`
async fn remove_partial(path: &Path) {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
            if let Err(err) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), %err, "Failed to remove partial file");
            }
        }
        _ => {}
    }
}
