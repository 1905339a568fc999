// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rq_core::{Operation, PendingOperation};
use serde_json::json;
use tokio::net::TcpListener;

type Reply = fn(&ClientMessage) -> Option<ServerMessage>;

/// Runs a WebSocket server on a random port answering each batch with `reply`.
///
/// A `None` reply closes the connection instead of answering.
async fn serve(reply: Reply) -> (SocketAddr, Arc<Mutex<Vec<ClientMessage>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut tx, mut rx) = ws.split();
                while let Some(Ok(msg)) = rx.next().await {
                    let Message::Text(text) = msg else { continue };
                    let msg = ClientMessage::from_json(&text).unwrap();
                    let answer = reply(&msg);
                    log.lock().unwrap().push(msg);
                    match answer {
                        Some(answer) => {
                            let json = answer.to_json().unwrap();
                            if tx.send(Message::Text(json.into())).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            let _ = tx.close().await;
                            return;
                        }
                    }
                }
            });
        }
    });

    (addr, received)
}

fn batch(seqs: std::ops::RangeInclusive<Seq>) -> Batch {
    let ops: Vec<Operation> = seqs
        .map(|seq| {
            PendingOperation::assign("metrics/acc".parse().unwrap(), json!(seq))
                .into_operation(seq, Utc::now())
        })
        .collect();
    Batch::from_ops(ops)
}

fn ack_all(msg: &ClientMessage) -> Option<ServerMessage> {
    let ClientMessage::Batch { ops, .. } = msg;
    Some(ServerMessage::ack(ops.last().map_or(0, |op| op.seq)))
}

#[tokio::test]
async fn test_send_receives_ack() {
    let (addr, received) = serve(ack_all).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run-7");

    let ack = sink.send(&batch(1..=3)).await.unwrap();
    assert_eq!(ack, Acknowledgement::upto(3));
    assert!(sink.is_connected());

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let ClientMessage::Batch { run_id, ops } = &received[0];
    assert_eq!(run_id, "run-7");
    assert_eq!(ops.iter().map(|op| op.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_connection_is_reused() {
    let (addr, received) = serve(ack_all).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");

    sink.send(&batch(1..=1)).await.unwrap();
    sink.send(&batch(2..=2)).await.unwrap();
    assert_eq!(received.lock().unwrap().len(), 2);
    sink.close().await;
    assert!(!sink.is_connected());
}

#[tokio::test]
async fn test_abandoned_request_drops_connection() {
    let (addr, _) = serve(ack_all).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");
    sink.send(&batch(1..=1)).await.unwrap();

    let abandoned = tokio::time::timeout(Duration::ZERO, sink.send(&batch(2..=2))).await;
    assert!(abandoned.is_err());
    assert!(!sink.is_connected());

    // The reply to batch 2 went away with the old socket.
    let ack = sink.send(&batch(3..=3)).await.unwrap();
    assert_eq!(ack, Acknowledgement::upto(3));
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_rejections_are_passed_through() {
    let (addr, _) = serve(|_| {
        Some(ServerMessage::Ack {
            highest_accepted: 2,
            rejections: vec![Rejection {
                seq: 2,
                reason: "bad type".into(),
            }],
        })
    })
    .await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");

    let ack = sink.send(&batch(1..=2)).await.unwrap();
    assert_eq!(ack.highest_accepted, 2);
    assert_eq!(ack.rejections[0].seq, 2);
}

#[tokio::test]
async fn test_permanent_server_error() {
    let (addr, _) = serve(|_| Some(ServerMessage::error(true, "run deleted"))).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");

    let err = sink.send(&batch(1..=1)).await.unwrap_err();
    assert_eq!(err, SinkError::Permanent("run deleted".into()));
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_transient_server_error_drops_connection() {
    let (addr, _) = serve(|_| Some(ServerMessage::error(false, "busy"))).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");

    let err = sink.send(&batch(1..=1)).await.unwrap_err();
    assert_eq!(err, SinkError::Transient("busy".into()));
    assert!(!sink.is_connected());
}

#[tokio::test]
async fn test_closed_connection_is_transient() {
    let (addr, _) = serve(|_| None).await;
    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");

    let err = sink.send(&batch(1..=1)).await.unwrap_err();
    assert!(matches!(err, SinkError::Transient(_)));
    assert!(!sink.is_connected());
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut sink = WebSocketSink::new(format!("ws://{addr}"), "run");
    let err = sink.send(&batch(1..=1)).await.unwrap_err();
    assert!(matches!(err, SinkError::Transient(m) if m.contains("connection failed")));
}
