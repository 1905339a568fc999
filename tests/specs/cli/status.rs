// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `runq status` specs.

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
use yare::parameterized;

fn runq() -> Command {
    cargo_bin_cmd!("runq")
}

/// Leaves an offline queue with `ops` unsynced operations in `dir`.
fn make_queue(dir: &Path, ops: u64) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let queue = SyncQueue::open(dir, SyncMode::Offline, None, QueueConfig::default()).unwrap();
        for i in 1..=ops {
            let op = PendingOperation::assign("params/lr".parse().unwrap(), json!(i));
            queue.enqueue(op).await.unwrap();
        }
        queue.stop(Duration::ZERO).await.unwrap();
    });
}

#[test]
fn status_with_no_queues() {
    let temp = TempDir::new().unwrap();
    runq()
        .args(["status", "--base"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No queues found."));
}

#[test]
fn status_lists_discovered_queues() {
    let temp = TempDir::new().unwrap();
    make_queue(&temp.path().join("run-a"), 3);
    make_queue(&temp.path().join("run-b"), 0);

    runq()
        .args(["status", "--base"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("run-a"))
        .stdout(predicate::str::contains("3 of 3 unsynced"))
        .stdout(predicate::str::contains("run-b"));
}

#[test]
fn status_uses_data_dir_env() {
    let temp = TempDir::new().unwrap();
    make_queue(&temp.path().join("run-env"), 1);

    runq()
        .arg("status")
        .env("RUNQ_DATA_DIR", temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("run-env"));
}

#[test]
fn status_json_output() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 2);

    let output = runq()
        .arg("status")
        .arg(&dir)
        .args(["-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let queues = parsed.as_array().unwrap();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0]["mode"], "offline");
    assert_eq!(queues[0]["last_put"], 2);
    assert_eq!(queues[0]["unsynced"], 2);
    assert_eq!(queues[0]["locked"], false);
}

#[test]
fn status_of_plain_directory_fails() {
    let temp = TempDir::new().unwrap();
    runq()
        .arg("status")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a queue directory"));
}

#[parameterized(
    text = { "text" },
    json = { "json" },
)]
fn status_accepts_output_format(format: &str) {
    let temp = TempDir::new().unwrap();
    runq()
        .args(["status", "--base"])
        .arg(temp.path())
        .args(["--output", format])
        .assert()
        .success();
}
