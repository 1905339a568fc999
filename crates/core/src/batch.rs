// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contiguous runs of operations read from the log for one send attempt.

use crate::op::{Operation, Seq};

/// An ordered, contiguous slice of operations `[first_seq, last_seq]`.
///
/// Batches are never persisted; a fresh one is read from the log for every
/// send attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<Operation>,
    bytes: usize,
}

impl Batch {
    /// Builds a batch from operations that are already contiguous.
    pub fn from_ops(ops: Vec<Operation>) -> Self {
        let bytes = ops
            .iter()
            .map(|op| serde_json::to_string(op).map_or(0, |s| s.len() + 1))
            .sum();
        Batch { ops, bytes }
    }

    pub(crate) fn push(&mut self, op: Operation, size: usize) {
        debug_assert!(self.ops.last().map_or(true, |last| last.seq + 1 == op.seq));
        self.bytes += size;
        self.ops.push(op);
    }

    /// Returns the operations in sequence order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }

    /// Serialized size of the batch as stored in the log.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Sequence number of the first operation.
    pub fn first_seq(&self) -> Option<Seq> {
        self.ops.first().map(|op| op.seq)
    }

    /// Sequence number of the last operation.
    pub fn last_seq(&self) -> Option<Seq> {
        self.ops.last().map(|op| op.seq)
    }
}
