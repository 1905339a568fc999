// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive batch sizing.
//!
//! Batches start small, grow multiplicatively while sends succeed, and drop
//! back to the initial size after any failure so a degraded link is retried
//! with small requests.

use rq_core::{Batch, OpLogReader, Seq};

/// Bounds and growth rule for batches.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    pub initial_size: usize,
    pub growth_factor: f64,
    pub max_size: usize,
    pub max_bytes: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            initial_size: 16,
            growth_factor: 2.0,
            max_size: 1000,
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Builds batches from the log using the current adaptive size.
#[derive(Debug, Clone)]
pub struct Batcher {
    policy: BatchPolicy,
    size: usize,
}

impl Batcher {
    pub fn new(policy: BatchPolicy) -> Self {
        let size = policy.initial_size.clamp(1, policy.max_size.max(1));
        Batcher { policy, size }
    }

    /// Current item limit.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reads the next batch, starting right after `after`.
    pub fn next_batch(&self, reader: &mut OpLogReader, after: Seq) -> rq_core::Result<Batch> {
        reader.read_batch(after + 1, self.size, self.policy.max_bytes)
    }

    /// Grows the size after a successful send.
    pub fn on_success(&mut self) {
        let grown = (self.size as f64 * self.policy.growth_factor) as usize;
        self.size = grown.max(self.size + 1).min(self.policy.max_size.max(1));
    }

    /// Resets the size after a failure.
    pub fn on_failure(&mut self) {
        self.size = self.policy.initial_size.clamp(1, self.policy.max_size.max(1));
    }

    /// Narrows the next batch to a single operation.
    pub fn isolate(&mut self) {
        self.size = 1;
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
