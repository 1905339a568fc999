// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Signals published by the sync loop for observers.

use std::time::Duration;

use rq_core::Seq;

/// Something observers of a queue may want to react to.
///
/// Delivered through [`QueueHandle::subscribe`](crate::QueueHandle::subscribe).
/// Every event is also logged, so subscribing is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The first transient failure of an outage.
    ConnectionInterrupted {
        error: String,
        /// How long the loop will keep retrying.
        retry_for: Duration,
    },
    /// A send succeeded after an outage.
    ConnectionRestored { after: Duration },
    /// The retry budget ran out; operations stay on disk.
    ReconnectFailed { unsynced: u64 },
    /// The server refused one operation for good; the queue moved past it.
    OperationRejected { seq: Seq, reason: String },
    /// Lag stayed above the configured threshold for too long.
    LagExceeded { lag: u64 },
    /// No acknowledgement arrived for too long while operations were pending.
    NoProgress { lag: u64, since_ack: Duration },
}
