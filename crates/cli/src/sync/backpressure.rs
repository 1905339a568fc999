// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lag observation and backpressure signals.
//!
//! Lag is the number of appended but unacknowledged operations. The monitor
//! turns a stream of lag observations into two rate-limited conditions:
//! lag above a threshold for too long, and no acknowledgement at all for too
//! long while operations are pending.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::events::SyncEvent;

/// What a producer does while lag is above the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Keep accepting operations; the lag signal is only logged.
    #[default]
    Warn,
    /// Hold producers back until lag falls under the threshold.
    Block,
}

/// Thresholds of a [`LagMonitor`].
#[derive(Debug, Clone)]
pub struct LagLimits {
    pub lag_threshold: u64,
    pub lag_duration: Duration,
    pub no_progress: Duration,
    pub callback_interval: Duration,
}

/// Tracks lag over time and decides when to raise a signal.
#[derive(Debug)]
pub struct LagMonitor {
    limits: LagLimits,
    above_since: Option<Instant>,
    last_ack_at: Instant,
    last_lag_signal: Option<Instant>,
    last_stall_signal: Option<Instant>,
}

impl LagMonitor {
    pub fn new(limits: LagLimits, now: Instant) -> Self {
        LagMonitor {
            limits,
            above_since: None,
            last_ack_at: now,
            last_lag_signal: None,
            last_stall_signal: None,
        }
    }

    /// Records that an acknowledgement moved the offset.
    pub fn on_ack(&mut self, now: Instant) {
        self.last_ack_at = now;
        self.last_stall_signal = None;
    }

    /// Feeds one lag observation and returns the signals due now.
    pub fn observe(&mut self, lag: u64, now: Instant) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        if lag > self.limits.lag_threshold {
            let since = *self.above_since.get_or_insert(now);
            if now.duration_since(since) >= self.limits.lag_duration
                && self.due(self.last_lag_signal, now)
            {
                self.last_lag_signal = Some(now);
                events.push(SyncEvent::LagExceeded { lag });
            }
        } else {
            self.above_since = None;
            self.last_lag_signal = None;
        }

        if lag == 0 {
            self.last_ack_at = now;
            self.last_stall_signal = None;
        } else {
            let since_ack = now.duration_since(self.last_ack_at);
            if since_ack >= self.limits.no_progress && self.due(self.last_stall_signal, now) {
                self.last_stall_signal = Some(now);
                events.push(SyncEvent::NoProgress { lag, since_ack });
            }
        }

        events
    }

    fn due(&self, last: Option<Instant>, now: Instant) -> bool {
        last.map_or(true, |at| now.duration_since(at) >= self.limits.callback_interval)
    }
}

#[cfg(test)]
#[path = "backpressure_tests.rs"]
mod tests;
