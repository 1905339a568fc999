// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rq-core: Shared primitives for the runq metadata queue
//!
//! This crate provides the operation model and the on-disk structures of a
//! queue directory: the durable segmented operation log and the sync offset
//! file. The sync engine in `runq` builds on top of these.

pub mod batch;
pub mod error;
pub mod offsets;
pub mod op;
pub mod oplog;
pub mod protocol;

pub use batch::Batch;
pub use error::{Error, Result};
pub use offsets::{OffsetTracker, Offsets};
pub use op::{AttributePath, LogEntry, OpKind, OpPayload, Operation, PendingOperation, Seq};
pub use oplog::{peek_tail, OpLog, OpLogReader, DEFAULT_MAX_SEGMENT_BYTES};
pub use protocol::Rejection;
