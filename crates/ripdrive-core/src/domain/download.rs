//! Per-file download state and deferred retry records

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RemoteId;
use super::remote_item::RemoteItem;

// ============================================================================
// DownloadStatus
// ============================================================================

/// Lifecycle of a single file-download attempt
///
/// ```text
/// NotStarted ──► InProgress ──► Finished
///      │              │
///      └──────────────┴───────► Failed
/// ```
///
/// `Finished` and `Failed` are terminal. A status value is owned by exactly
/// one attempt and never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    NotStarted,
    InProgress,
    Finished,
    Failed,
}

impl DownloadStatus {
    /// Returns the state name as a string slice
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DownloadStatus::NotStarted => "NotStarted",
            DownloadStatus::InProgress => "InProgress",
            DownloadStatus::Finished => "Finished",
            DownloadStatus::Failed => "Failed",
        }
    }

    /// Returns true for `Finished` and `Failed`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Finished | DownloadStatus::Failed)
    }

    /// Checks whether a transition to `target` is allowed
    ///
    /// `Finished` is only reachable from `InProgress`; `Failed` is reachable
    /// from either non-terminal state (e.g. the URL lookup fails before any
    /// byte is transferred).
    #[must_use]
    pub fn can_transition_to(&self, target: DownloadStatus) -> bool {
        matches!(
            (self, target),
            (DownloadStatus::NotStarted, DownloadStatus::InProgress)
                | (DownloadStatus::NotStarted, DownloadStatus::Failed)
                | (DownloadStatus::InProgress, DownloadStatus::Finished)
                | (DownloadStatus::InProgress, DownloadStatus::Failed)
        )
    }

    /// Performs a checked transition
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: DownloadStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// RetryRecord
// ============================================================================

/// Snapshot of a file whose download or verification failed during the
/// primary walk, deferred to the replay pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    /// Remote id of the failed item
    pub id: RemoteId,
    /// Local path the item was meant to land at
    pub intended_local_path: PathBuf,
    /// The item as enumerated
    pub item: RemoteItem,
}

impl RetryRecord {
    /// Creates a record for `item` destined for `intended_local_path`
    #[must_use]
    pub fn new(item: RemoteItem, intended_local_path: PathBuf) -> Self {
        Self {
            id: item.id().clone(),
            intended_local_path,
            item,
        }
    }
}
