// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `runq clear` specs.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::Path;
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use rq_core::PendingOperation;
use runq::{QueueConfig, SyncMode, SyncQueue};
use serde_json::json;
use tempfile::TempDir;

fn runq() -> Command {
    cargo_bin_cmd!("runq")
}

fn make_queue(dir: &Path, ops: u64) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let queue = SyncQueue::open(dir, SyncMode::Offline, None, QueueConfig::default()).unwrap();
        for i in 1..=ops {
            let op = PendingOperation::assign("sys/tags".parse().unwrap(), json!(i));
            queue.enqueue(op).await.unwrap();
        }
        queue.stop(Duration::ZERO).await.unwrap();
    });
}

#[test]
fn clear_removes_synced_queue() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 0);

    runq()
        .arg("clear")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    assert!(!dir.exists());
}

#[test]
fn clear_refuses_unsynced_queue() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 4);

    runq()
        .arg("clear")
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("4 operations are not synced"))
        .stderr(predicate::str::contains("--force"));
    assert!(dir.exists());
}

#[test]
fn clear_force_discards_unsynced_queue() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 4);

    runq()
        .args(["clear", "--force"])
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 unsynced operations discarded"));
    assert!(!dir.exists());
}

#[test]
fn clear_requires_a_directory() {
    runq()
        .arg("clear")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn clear_of_plain_directory_fails() {
    let temp = TempDir::new().unwrap();
    runq()
        .args(["clear", "-f"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a queue directory"));
    assert!(temp.path().exists());
}
