// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `runq sync` specs.
//!
//! A WebSocket server acknowledging every batch runs on a background thread
//! for the duration of each test.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use rq_core::protocol::{ClientMessage, ServerMessage};
use rq_core::PendingOperation;
use runq::{QueueConfig, SyncMode, SyncQueue};
use serde_json::json;
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message;

fn runq() -> Command {
    cargo_bin_cmd!("runq")
}

fn make_queue(dir: &Path, ops: u64) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let queue = SyncQueue::open(dir, SyncMode::Offline, None, QueueConfig::default()).unwrap();
        for i in 1..=ops {
            let op = PendingOperation::log("metrics/acc".parse().unwrap(), json!(i), None);
            queue.enqueue(op).await.unwrap();
        }
        queue.stop(Duration::ZERO).await.unwrap();
    });
}

/// Starts an ack-all server; returns its address and the `(run_id, seq)`
/// pairs it received.
fn ack_server() -> (SocketAddr, Arc<Mutex<Vec<(String, u64)>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    let (addr_tx, addr_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut tx, mut rx) = ws.split();
                    while let Some(Ok(Message::Text(text))) = rx.next().await {
                        let ClientMessage::Batch { run_id, ops } =
                            ClientMessage::from_json(&text).unwrap();
                        let last = ops.last().map_or(0, |op| op.seq);
                        log.lock()
                            .unwrap()
                            .extend(ops.iter().map(|op| (run_id.clone(), op.seq)));
                        let ack = ServerMessage::ack(last).to_json().unwrap();
                        if tx.send(Message::Text(ack.into())).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
    });

    (addr_rx.recv().unwrap(), received)
}

/// A port nothing listens on.
fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[test]
fn sync_uploads_and_removes_queue() {
    let (addr, received) = ack_server();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 5);

    runq()
        .arg("sync")
        .arg(&dir)
        .args(["--url", &format!("ws://{addr}")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 5 operations"));

    assert!(!dir.exists());
    let received = received.lock().unwrap();
    let seqs: Vec<u64> = received.iter().map(|(_, seq)| *seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    assert!(received.iter().all(|(run, _)| run == "run-1"));
}

#[test]
fn sync_uses_explicit_run_id() {
    let (addr, received) = ack_server();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 2);

    runq()
        .arg("sync")
        .arg(&dir)
        .args(["--url", &format!("ws://{addr}"), "--run-id", "exp-42"])
        .assert()
        .success();

    assert!(received
        .lock()
        .unwrap()
        .iter()
        .all(|(run, _)| run == "exp-42"));
}

#[test]
fn sync_keeps_queue_when_server_unreachable() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("run-1");
    make_queue(&dir, 3);

    runq()
        .arg("sync")
        .arg(&dir)
        .args(["--url", &format!("ws://{}", closed_port()), "--timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("3 operations remain saved on disk"));

    assert!(dir.exists());
}

#[test]
fn sync_requires_url() {
    let temp = TempDir::new().unwrap();
    runq()
        .arg("sync")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn sync_rejects_empty_url() {
    let temp = TempDir::new().unwrap();
    runq()
        .arg("sync")
        .arg(temp.path())
        .args(["--url", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be empty"));
}
