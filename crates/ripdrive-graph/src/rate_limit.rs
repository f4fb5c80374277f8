//! Byte-rate throttling for content transfers
//!
//! Provides a token bucket measured in bytes rather than requests, used by
//! [`crate::transfer::HttpChunkedTransport`] to enforce a global throughput
//! cap across every byte-range request it has in flight.
//!
//! ## Architecture
//!
//! - [`ThroughputLimiter`]: token bucket holding up to one second of budget.
//!   Reservations larger than the remaining budget drive the bucket into
//!   debt; the caller sleeps until the debt has been refilled.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ripdrive_graph::rate_limit::ThroughputLimiter;
//!
//! # async fn example() {
//! let limiter = ThroughputLimiter::new(1024 * 1024);
//! limiter.acquire(64 * 1024).await;
//! // ... write the 64 KiB that were just received ...
//! # }
//! ```

use std::{sync::Mutex, time::Duration};

use tokio::time::Instant;
use tracing::debug;

/// Internal mutable state for the bucket, protected by a Mutex.
#[derive(Debug)]
struct BucketState {
    /// Available bytes; negative while in debt
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Token bucket limiting throughput in bytes per second.
///
/// A rate of `0` means unlimited: every reservation is granted immediately.
#[derive(Debug)]
pub struct ThroughputLimiter {
    /// Refill rate in bytes per second, also the bucket capacity
    bytes_per_sec: u64,
    inner: Mutex<BucketState>,
}

impl ThroughputLimiter {
    /// Creates a limiter for the given rate. The bucket starts full.
    pub fn new(bytes_per_sec: u64) -> Self {
        Self {
            bytes_per_sec,
            inner: Mutex::new(BucketState {
                tokens: bytes_per_sec as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Creates a limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Returns the configured rate in bytes per second
    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec
    }

    /// Returns true if this limiter never waits
    pub fn is_unlimited(&self) -> bool {
        self.bytes_per_sec == 0
    }

    /// Adds the budget earned since the last refill, capped at one second
    fn refill(state: &mut BucketState, rate: f64) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed_secs > 0.0 {
            state.tokens = (state.tokens + elapsed_secs * rate).min(rate);
            state.last_refill = now;
        }
    }

    /// Reserves `bytes` and returns how long the caller must wait before
    /// using them.
    ///
    /// The reservation always succeeds; an oversized one puts the bucket in
    /// debt so that concurrent callers queue up behind it.
    pub fn reserve(&self, bytes: u64) -> Duration {
        if self.is_unlimited() || bytes == 0 {
            return Duration::ZERO;
        }

        let rate = self.bytes_per_sec as f64;
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::refill(&mut state, rate);
        state.tokens -= bytes as f64;

        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / rate)
        }
    }

    /// Reserves `bytes`, sleeping until the budget allows them.
    pub async fn acquire(&self, bytes: u64) {
        let wait = self.reserve(bytes);
        if !wait.is_zero() {
            debug!(
                bytes,
                wait_ms = wait.as_millis() as u64,
                "Throughput cap reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
