// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rq_core::{AttributePath, Batch, PendingOperation, Rejection, Seq};
use serde_json::json;

use super::sink::{Acknowledgement, RemoteSink, SinkError, SinkResult};

/// Scripted answer of a [`MockSink`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// Acknowledge the whole batch (minus configured rejections).
    Ack,
    /// Acknowledge up to a fixed sequence.
    AckUpto(Seq),
    Transient(String),
    Permanent(String),
    /// Never answer.
    Hang,
    /// Apply the whole batch, then never answer.
    ApplyThenHang,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Reply>,
    fail_always: bool,
    hang: bool,
    rejected: HashMap<Seq, String>,
    refused: HashSet<Seq>,
    batches: Vec<Vec<Seq>>,
    accepted: Vec<Seq>,
    highest: Seq,
}

/// In-memory sink recording everything it receives.
///
/// Clones share state, so a test keeps one clone to inspect what the queue
/// sent through another.
#[derive(Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<MockState>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues replies used before the default behavior.
    pub fn push_replies(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().script.extend(replies);
    }

    /// Makes every unscripted send fail transiently.
    pub fn fail_always(&self, fail: bool) {
        self.state.lock().unwrap().fail_always = fail;
    }

    /// Makes every unscripted send hang forever.
    pub fn hang(&self, hang: bool) {
        self.state.lock().unwrap().hang = hang;
    }

    /// Lists `seq` as rejected in acknowledgements covering it.
    pub fn reject_op(&self, seq: Seq, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .insert(seq, reason.to_string());
    }

    /// Fails any batch containing `seq` with a permanent error.
    pub fn refuse_op(&self, seq: Seq) {
        self.state.lock().unwrap().refused.insert(seq);
    }

    /// Sequence numbers of every send attempt, in order.
    pub fn batches(&self) -> Vec<Vec<Seq>> {
        self.state.lock().unwrap().batches.clone()
    }

    /// Sequence numbers applied by the server, each at most once.
    pub fn accepted(&self) -> Vec<Seq> {
        self.state.lock().unwrap().accepted.clone()
    }

    /// Highest sequence acknowledged so far.
    pub fn highest(&self) -> Seq {
        self.state.lock().unwrap().highest
    }

    fn decide(&self, batch: &Batch) -> (Reply, Vec<Seq>) {
        let mut state = self.state.lock().unwrap();
        let seqs: Vec<Seq> = batch.ops().iter().map(|op| op.seq).collect();
        state.batches.push(seqs.clone());

        let reply = match state.script.pop_front() {
            Some(reply) => reply,
            None if state.hang => Reply::Hang,
            None if state.fail_always => Reply::Transient("mock outage".into()),
            None if seqs.iter().any(|s| state.refused.contains(s)) => {
                Reply::Permanent("refused".into())
            }
            None => Reply::Ack,
        };
        (reply, seqs)
    }

    fn acknowledge(&self, seqs: &[Seq], upto: Seq) -> Acknowledgement {
        let mut state = self.state.lock().unwrap();
        let mut rejections = Vec::new();
        for &seq in seqs.iter().filter(|&&s| s <= upto) {
            if let Some(reason) = state.rejected.get(&seq).cloned() {
                rejections.push(Rejection { seq, reason });
            } else if seq > state.highest {
                state.accepted.push(seq);
            }
        }
        state.highest = state.highest.max(upto);
        Acknowledgement {
            highest_accepted: upto,
            rejections,
        }
    }
}

impl RemoteSink for MockSink {
    fn send<'a>(
        &'a mut self,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = SinkResult<Acknowledgement>> + Send + 'a>> {
        Box::pin(async move {
            let (reply, seqs) = self.decide(batch);
            match reply {
                Reply::Ack => {
                    let upto = seqs.last().copied().unwrap_or(0);
                    Ok(self.acknowledge(&seqs, upto))
                }
                Reply::AckUpto(upto) => Ok(self.acknowledge(&seqs, upto)),
                Reply::Transient(msg) => Err(SinkError::Transient(msg)),
                Reply::Permanent(msg) => Err(SinkError::Permanent(msg)),
                Reply::Hang => std::future::pending().await,
                Reply::ApplyThenHang => {
                    let upto = seqs.last().copied().unwrap_or(0);
                    self.acknowledge(&seqs, upto);
                    std::future::pending().await
                }
            }
        })
    }
}

/// Builds an Assign operation on `metrics/step` carrying `n`.
pub fn pending(n: u64) -> PendingOperation {
    let path: AttributePath = "metrics/step".parse().unwrap();
    PendingOperation::assign(path, json!(n))
}
