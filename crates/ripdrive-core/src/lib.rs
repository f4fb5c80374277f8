//! RipDrive Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteItem`, `ContentHash`, `RetryRecord`, `DownloadStatus`
//! - **Port definitions** - Traits for adapters: `IRemoteDrive`, `IChunkedTransport`, `IAuthProvider`
//! - **Configuration** - YAML-backed `Config` and the explicit `MirrorOptions` value
//!
//! # Architecture
//!
//! The domain module contains plain value types with no I/O. Ports define
//! the trait interfaces that the mirroring engine (`ripdrive-sync`) depends
//! on and that adapter crates (`ripdrive-graph`) implement.

pub mod config;
pub mod domain;
pub mod ports;
