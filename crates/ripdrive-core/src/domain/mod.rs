//! Domain entities
//!
//! This module contains the core domain types for RipDrive:
//! - Newtypes for validated identifiers
//! - Remote tree nodes and their content hashes
//! - Per-file download state and deferred retry records
//! - Domain-specific error types

pub mod download;
pub mod errors;
pub mod newtypes;
pub mod remote_item;

// Re-export commonly used types
pub use download::{DownloadStatus, RetryRecord};
pub use errors::DomainError;
pub use newtypes::RemoteId;
pub use remote_item::{ContentHash, FileMetadata, HashKind, ItemKind, RemoteItem};
