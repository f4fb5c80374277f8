//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the mirroring engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteDrive`] - Paginated children listing and download-URL lookup
//! - [`IChunkedTransport`] - Chunked, throttled, cancellable content transfer
//! - [`IAuthProvider`] - Opaque bearer credential source

pub mod auth;
pub mod remote_drive;
pub mod transport;

pub use auth::{IAuthProvider, Tokens};
pub use remote_drive::{ChildrenPage, IRemoteDrive, RemoteEntry};
pub use transport::{
    IChunkedTransport, ProgressFn, TransferOutcome, TransferProgress, TransferRequest,
};
