//! Deferred download failures
//!
//! Failures from the primary walk are appended in order and drained exactly
//! once by the replay pass. Records that fail again during replay are final
//! and never re-enter the ledger.

use std::collections::VecDeque;
use std::path::PathBuf;

use ripdrive_core::domain::{RemoteItem, RetryRecord};

/// Ordered collection of [`RetryRecord`]s owned by one run
#[derive(Debug, Default)]
pub struct RetryLedger {
    records: VecDeque<RetryRecord>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failed item
    pub fn record(&mut self, item: RemoteItem, intended_local_path: PathBuf) {
        self.records
            .push_back(RetryRecord::new(item, intended_local_path));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RetryRecord> {
        self.records.iter()
    }

    /// Removes and returns every record, leaving the ledger empty
    pub fn drain(&mut self) -> Vec<RetryRecord> {
        self.records.drain(..).collect()
    }
}
