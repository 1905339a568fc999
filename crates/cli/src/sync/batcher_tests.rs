// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use rq_core::{OpLog, PendingOperation};
use serde_json::json;
use tempfile::TempDir;

fn policy(initial: usize, factor: f64, max: usize) -> BatchPolicy {
    BatchPolicy {
        initial_size: initial,
        growth_factor: factor,
        max_size: max,
        max_bytes: usize::MAX,
    }
}

#[test]
fn test_grows_to_cap() {
    let mut batcher = Batcher::new(policy(2, 2.0, 10));
    let mut sizes = vec![batcher.size()];
    for _ in 0..5 {
        batcher.on_success();
        sizes.push(batcher.size());
    }
    assert_eq!(sizes, vec![2, 4, 8, 10, 10, 10]);
}

#[test]
fn test_growth_is_non_decreasing_and_bounded() {
    let mut batcher = Batcher::new(policy(16, 1.3, 1000));
    let mut previous = batcher.size();
    for _ in 0..100 {
        batcher.on_success();
        assert!(batcher.size() >= previous);
        assert!(batcher.size() <= 1000);
        previous = batcher.size();
    }
    assert_eq!(previous, 1000);
}

#[test]
fn test_factor_one_still_grows() {
    let mut batcher = Batcher::new(policy(1, 1.0, 3));
    batcher.on_success();
    assert_eq!(batcher.size(), 2);
}

#[test]
fn test_failure_resets_to_initial() {
    let mut batcher = Batcher::new(policy(4, 2.0, 100));
    batcher.on_success();
    batcher.on_success();
    assert_eq!(batcher.size(), 16);

    batcher.on_failure();
    assert_eq!(batcher.size(), 4);
}

#[test]
fn test_isolate_then_grow() {
    let mut batcher = Batcher::new(policy(8, 2.0, 100));
    batcher.isolate();
    assert_eq!(batcher.size(), 1);
    batcher.on_success();
    assert_eq!(batcher.size(), 2);
}

#[test]
fn test_next_batch_reads_after_offset() {
    let temp = TempDir::new().unwrap();
    let mut log = OpLog::open(temp.path(), rq_core::DEFAULT_MAX_SEGMENT_BYTES).unwrap();
    for n in 0..10 {
        log.append(PendingOperation::assign("x".parse().unwrap(), json!(n)))
            .unwrap();
    }
    let mut reader = log.reader();
    let batcher = Batcher::new(policy(3, 2.0, 100));

    let batch = batcher.next_batch(&mut reader, 4).unwrap();
    assert_eq!(batch.first_seq(), Some(5));
    assert_eq!(batch.last_seq(), Some(7));
}
