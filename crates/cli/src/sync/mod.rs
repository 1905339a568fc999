// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Moving queued operations to the server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Operation  │────►│  Consumer   │────►│ RemoteSink  │────► server
//! │     log     │     │ (batching,  │◄────│   (trait)   │◄────
//! └─────────────┘     │  retries)   │     └─────────────┘
//!                     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │   Offsets   │  (acknowledged position)
//!                     └─────────────┘
//! ```
//!
//! # Features
//!
//! - Adaptive batch size, grown on success and reset on failure
//! - Exponential backoff bounded by a total reconnect budget
//! - Permanent rejections isolated down to a single operation and skipped
//! - Lag and stall signals published as [`SyncEvent`]s
//! - Injectable sink trait for testing

mod backoff;
mod backpressure;
mod batcher;
mod consumer;
mod events;
mod sink;
mod state;

pub use backoff::Backoff;
pub use backpressure::{BackpressurePolicy, LagLimits, LagMonitor};
pub use batcher::{BatchPolicy, Batcher};
pub use consumer::{Consumer, Step, SyncContext};
pub use events::SyncEvent;
pub use sink::{Acknowledgement, RemoteSink, SinkError, SinkResult, WebSocketSink};
pub use state::{SharedSyncState, SyncPhase};

#[cfg(test)]
pub(crate) mod test_helpers;
