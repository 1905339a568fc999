// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync loop state visible outside the loop.
//!
//! Uses atomic fields so status queries never wait on the consumer.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// Phase of the consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncPhase {
    /// Nothing to send; waiting for new operations.
    Idle = 0,
    /// A batch is in flight.
    Sending = 1,
    /// Waiting before the next retry.
    Backoff = 2,
    /// Shut down.
    Stopped = 3,
    /// Retry budget exhausted; only a manual sync resumes.
    GaveUp = 4,
}

impl SyncPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SyncPhase::Idle,
            1 => SyncPhase::Sending,
            2 => SyncPhase::Backoff,
            4 => SyncPhase::GaveUp,
            _ => SyncPhase::Stopped,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Sending => "sending",
            SyncPhase::Backoff => "backoff",
            SyncPhase::Stopped => "stopped",
            SyncPhase::GaveUp => "gave up",
        };
        f.write_str(s)
    }
}

/// Loop state shared between the consumer and status readers.
pub struct SharedSyncState {
    phase: AtomicU8,
    /// Consecutive failed attempts in the current outage.
    attempt: AtomicU32,
    /// Current retry delay in milliseconds (0 when not backing off).
    backoff_ms: AtomicU64,
}

impl SharedSyncState {
    /// Creates a state in the given phase.
    pub fn new(phase: SyncPhase) -> Self {
        Self {
            phase: AtomicU8::new(phase as u8),
            attempt: AtomicU32::new(0),
            backoff_ms: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set(&self, phase: SyncPhase) {
        self.phase.store(phase as u8, Ordering::Release);
        if phase != SyncPhase::Backoff {
            self.backoff_ms.store(0, Ordering::Release);
        }
    }

    /// Enters backoff for `delay` after the given failed attempt.
    pub fn set_backoff(&self, attempt: u32, delay: Duration) {
        self.attempt.store(attempt, Ordering::Release);
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.backoff_ms.store(ms, Ordering::Release);
        self.phase.store(SyncPhase::Backoff as u8, Ordering::Release);
    }

    /// Clears the failure counter after a success.
    pub fn reset_attempts(&self) {
        self.attempt.store(0, Ordering::Release);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms.load(Ordering::Acquire))
    }

    /// Returns true once the loop can no longer make progress on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self.get(), SyncPhase::Stopped | SyncPhase::GaveUp)
    }

    /// Human-readable status, e.g. `backoff (attempt 3, retry in 8s)`.
    pub fn status_string(&self) -> String {
        match self.get() {
            SyncPhase::Backoff => format!(
                "backoff (attempt {}, retry in {}s)",
                self.attempt(),
                self.backoff().as_secs()
            ),
            phase => phase.to_string(),
        }
    }
}

impl Default for SharedSyncState {
    fn default() -> Self {
        Self::new(SyncPhase::Idle)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
