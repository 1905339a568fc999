// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::sync::test_helpers::pending;
use std::time::Duration;
use tempfile::TempDir;

async fn abandoned_queue(dir: &std::path::Path, ops: u64) {
    let queue = SyncQueue::open(dir, SyncMode::Offline, None, QueueConfig::default()).unwrap();
    for i in 1..=ops {
        queue.enqueue(pending(i)).await.unwrap();
    }
    queue.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn test_clear_synced_queue() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("q");
    abandoned_queue(&dir, 0).await;

    run(vec![dir.clone()], false, QueueConfig::default())
        .await
        .unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_clear_refuses_unsynced_queue() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("q");
    abandoned_queue(&dir, 2).await;

    let err = run(vec![dir.clone()], false, QueueConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSynced { unsynced: 2 }));
    assert!(dir.exists());
}

#[tokio::test]
async fn test_force_discards_unsynced_queue() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("q");
    abandoned_queue(&dir, 2).await;

    run(vec![dir.clone()], true, QueueConfig::default())
        .await
        .unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_clear_plain_directory_fails() {
    let tmp = TempDir::new().unwrap();
    let err = run(vec![tmp.path().to_path_buf()], true, QueueConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAQueue(_)));
    assert!(tmp.path().exists());
}
