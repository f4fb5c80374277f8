//! RipDrive Sync - Remote tree mirroring engine
//!
//! Provides:
//! - Depth-first traversal of a paginated remote tree
//! - Remote-to-local path resolution
//! - Content verification against provider digests
//! - A deferred retry ledger replayed once per run
//!
//! ## Modules
//!
//! - [`coordinator`] - Run orchestration and the final [`coordinator::MirrorSummary`]
//! - [`walker`] - Paginated children listing merged into traversal frames
//! - [`download`] - Per-file download attempt state machine
//! - [`verifier`] - SHA-256 / SHA-1 / quickXorHash verification
//! - [`path_resolver`] - Provider parent paths to local path fragments
//! - [`retry_ledger`] - Deferred failures awaiting the replay pass
//! - [`error_log`] - Run-scoped, append-only error log file

pub mod coordinator;
pub mod download;
pub mod error_log;
pub mod humanize;
pub mod path_resolver;
pub mod quick_xor;
pub mod retry_ledger;
pub mod verifier;
pub mod walker;

use std::path::PathBuf;

use ripdrive_core::domain::HashKind;
use thiserror::Error;

/// Errors raised while mirroring
///
/// Every variant except [`MirrorError::RootListing`] is recovered inside the
/// run: it is written to the error log, counted and the walk continues.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A container listing failed; the subtree is skipped
    #[error("Failed to list children of {container}: {reason}")]
    Enumeration { container: String, reason: String },

    /// A local directory could not be created; its files are not placed
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport failed, was cancelled, or no URL could be obtained
    #[error("Transfer of {path} failed: {reason}")]
    Transfer { path: PathBuf, reason: String },

    /// Local bytes do not match the provider digest; the file was deleted
    #[error("{kind} mismatch for {path}: expected {expected}, got {actual}")]
    VerificationMismatch {
        path: PathBuf,
        kind: HashKind,
        expected: String,
        actual: String,
    },

    /// An entry lacks the id or name needed to place or enumerate it
    #[error("Entry in {container} is missing its identity: {detail}")]
    MissingIdentity { container: String, detail: String },

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The root container could not be listed; nothing can be mirrored
    #[error("Failed to list the root container: {0}")]
    RootListing(String),

    /// A domain-level error propagated from ripdrive-core
    #[error("Domain error: {0}")]
    Domain(#[from] ripdrive_core::domain::DomainError),
}

impl MirrorError {
    /// Returns true for errors that abort the whole run
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, MirrorError::RootListing(_))
    }

    /// Returns true for errors routed into the retry ledger
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MirrorError::Transfer { .. } | MirrorError::VerificationMismatch { .. }
        )
    }
}
