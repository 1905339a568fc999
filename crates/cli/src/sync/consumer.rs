// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The consumer side of a queue: reads batches from the log, hands them to
//! the sink and moves the acknowledged offset.
//!
//! The acknowledged offset only advances after the sink answered, and all
//! await points come before any local state changes, so dropping a step
//! half way never loses or skips an operation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use rq_core::{Batch, OffsetTracker, OpLogReader, Seq};

use super::backoff::Backoff;
use super::backpressure::{LagLimits, LagMonitor};
use super::batcher::Batcher;
use super::events::SyncEvent;
use super::sink::{Acknowledgement, RemoteSink, SinkError};
use super::state::{SharedSyncState, SyncPhase};
use crate::config::QueueConfig;
use crate::error::{Error, Result};

/// Handles shared between a consumer and the queue that owns it.
#[derive(Clone)]
pub struct SyncContext {
    pub offsets: Arc<Mutex<OffsetTracker>>,
    pub acked: Arc<watch::Sender<Seq>>,
    pub state: Arc<SharedSyncState>,
    pub events: broadcast::Sender<SyncEvent>,
}

impl SyncContext {
    /// Creates a context starting from the given tracker.
    pub fn new(tracker: OffsetTracker) -> Self {
        let (acked, _) = watch::channel(tracker.read().last_ack);
        let (events, _) = broadcast::channel(64);
        SyncContext {
            offsets: Arc::new(Mutex::new(tracker)),
            acked: Arc::new(acked),
            state: Arc::new(SharedSyncState::default()),
            events,
        }
    }

    /// Highest acknowledged sequence number.
    pub fn acked(&self) -> Seq {
        *self.acked.borrow()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Outcome of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing left to send.
    Idle,
    /// The acknowledged offset moved.
    Progress,
    /// Try again after the delay.
    Retry(Duration),
    /// The reconnect budget ran out.
    GaveUp { unsynced: u64 },
}

struct Outage {
    started: Instant,
    attempts: u32,
}

/// Drives operations from the log to a [`RemoteSink`].
pub struct Consumer {
    reader: OpLogReader,
    sink: Box<dyn RemoteSink>,
    ctx: SyncContext,
    batcher: Batcher,
    backoff: Backoff,
    monitor: LagMonitor,
    request_timeout: Duration,
    max_reconnect_wait: Duration,
    poll_interval: Duration,
    trim: bool,
    cancel: CancellationToken,
    outage: Option<Outage>,
    synced: u64,
    rejected: u64,
}

impl Consumer {
    pub fn new(
        reader: OpLogReader,
        sink: Box<dyn RemoteSink>,
        ctx: SyncContext,
        config: &QueueConfig,
    ) -> Self {
        let limits = LagLimits {
            lag_threshold: config.lag_threshold,
            lag_duration: config.lag_duration(),
            no_progress: config.no_progress(),
            callback_interval: config.callback_interval(),
        };
        Consumer {
            reader,
            sink,
            ctx,
            batcher: Batcher::new(config.batch_policy()),
            backoff: Backoff::new(config.backoff_initial(), config.backoff_max()),
            monitor: LagMonitor::new(limits, Instant::now()),
            request_timeout: config.request_timeout(),
            max_reconnect_wait: config.max_reconnect_wait(),
            poll_interval: config.poll_interval(),
            trim: config.trim_acknowledged,
            cancel: CancellationToken::new(),
            outage: None,
            synced: 0,
            rejected: 0,
        }
    }

    /// Operations acknowledged by this consumer, rejections excluded.
    pub fn synced(&self) -> u64 {
        self.synced
    }

    /// Operations the server refused for good.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Token that aborts [`drain`](Self::drain) at its next send or retry
    /// wait.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Appended operations not yet acknowledged.
    pub fn unsynced(&self) -> u64 {
        self.reader.current_tail().saturating_sub(self.ctx.acked())
    }

    /// Sends the next batch, if any, and applies the outcome.
    pub async fn step(&mut self) -> Result<Step> {
        let acked = self.ctx.acked();
        let batch = self.batcher.next_batch(&mut self.reader, acked)?;
        let (Some(first), Some(last)) = (batch.first_seq(), batch.last_seq()) else {
            return Ok(Step::Idle);
        };
        if first > acked + 1 {
            tracing::warn!(
                missing_from = acked + 1,
                missing_to = first - 1,
                "possible data loss: operations were removed from the log before being synced"
            );
        }

        self.ctx.state.set(SyncPhase::Sending);
        tracing::debug!(first, last, ops = batch.len(), bytes = batch.bytes(), "sending batch");
        let result = match tokio::time::timeout(self.request_timeout, self.sink.send(&batch)).await
        {
            Ok(result) => result,
            Err(_) => Err(SinkError::Transient(format!(
                "no response within {}s",
                self.request_timeout.as_secs_f64()
            ))),
        };

        match result {
            Ok(ack) => self.on_ack(first, last, ack).await,
            Err(SinkError::Transient(error)) => Ok(self.on_transient(error)),
            Err(SinkError::Permanent(error)) => self.on_permanent(&batch, first, error).await,
        }
    }

    async fn on_ack(&mut self, first: Seq, last: Seq, ack: Acknowledgement) -> Result<Step> {
        let mut highest = ack.highest_accepted;
        if highest > last {
            tracing::warn!(highest, last, "server acknowledged operations it was never sent");
            highest = last;
        }
        if highest < first {
            return Ok(self.on_transient(format!(
                "server acknowledged {highest}, expected at least {first}"
            )));
        }

        let mut rejected = 0;
        for rejection in ack.rejections {
            if rejection.seq < first || rejection.seq > highest {
                tracing::debug!(seq = rejection.seq, "ignoring rejection outside the batch");
                continue;
            }
            self.reject(rejection.seq, rejection.reason);
            rejected += 1;
        }
        let moved = self.advance(highest).await?;
        self.synced += moved.saturating_sub(rejected);
        self.batcher.on_success();
        self.restored();
        Ok(Step::Progress)
    }

    async fn on_permanent(&mut self, batch: &Batch, first: Seq, error: String) -> Result<Step> {
        if batch.len() > 1 {
            tracing::debug!(first, ops = batch.len(), %error, "batch refused, isolating the failing operation");
            self.batcher.isolate();
            return Ok(Step::Retry(Duration::ZERO));
        }
        self.reject(first, error);
        self.advance(first).await?;
        Ok(Step::Progress)
    }

    fn on_transient(&mut self, error: String) -> Step {
        self.batcher.on_failure();
        let now = Instant::now();
        if self.outage.is_none() {
            tracing::warn!(
                %error,
                retry_for_secs = self.max_reconnect_wait.as_secs(),
                "experiencing connection interruptions, will keep trying to reach the server"
            );
            self.ctx.emit(SyncEvent::ConnectionInterrupted {
                error: error.clone(),
                retry_for: self.max_reconnect_wait,
            });
            self.outage = Some(Outage {
                started: now,
                attempts: 0,
            });
        }
        let Some(outage) = self.outage.as_mut() else {
            return Step::Retry(Duration::ZERO);
        };
        outage.attempts += 1;
        let attempts = outage.attempts;
        let elapsed = now.duration_since(outage.started);

        if elapsed >= self.max_reconnect_wait {
            let unsynced = self.unsynced();
            tracing::error!(
                unsynced,
                attempts,
                "failed to reconnect after {}s; {unsynced} operations are saved on disk, run 'runq sync {}' to upload them",
                self.max_reconnect_wait.as_secs(),
                self.reader.dir().display()
            );
            self.ctx.state.set(SyncPhase::GaveUp);
            self.ctx.emit(SyncEvent::ReconnectFailed { unsynced });
            self.outage = None;
            self.backoff.reset();
            return Step::GaveUp { unsynced };
        }

        let delay = self
            .backoff
            .next_delay()
            .min(self.max_reconnect_wait - elapsed);
        tracing::debug!(attempts, delay_ms = delay.as_millis() as u64, %error, "send failed, retrying");
        self.ctx.state.set_backoff(attempts, delay);
        Step::Retry(delay)
    }

    fn reject(&mut self, seq: Seq, reason: String) {
        tracing::warn!(seq, %reason, "server rejected operation, skipping it");
        self.rejected += 1;
        self.ctx.emit(SyncEvent::OperationRejected { seq, reason });
    }

    /// Moves the acknowledged offset to `seq`; returns how far it moved.
    async fn advance(&mut self, seq: Seq) -> Result<u64> {
        let before = self.ctx.acked();
        let acked = {
            let mut offsets = self.ctx.offsets.lock().await;
            offsets.record_put(seq);
            offsets.advance_ack(seq)?;
            offsets.read().last_ack
        };
        self.ctx.acked.send_replace(acked);
        self.monitor.on_ack(Instant::now());

        if self.trim {
            if let Err(e) = self.reader.trim(acked) {
                tracing::warn!(error = %e, "cannot trim acknowledged operations");
            }
        }
        Ok(acked.saturating_sub(before))
    }

    /// Closes an open outage once the server acknowledged operations again.
    fn restored(&mut self) {
        if let Some(outage) = self.outage.take() {
            let after = outage.started.elapsed();
            tracing::info!(
                after_secs = after.as_secs(),
                "communication with the server restored"
            );
            self.ctx.emit(SyncEvent::ConnectionRestored { after });
        }
        self.backoff.reset();
        self.ctx.state.reset_attempts();
    }

    /// Checks the lag and publishes any resulting signal.
    pub fn observe_lag(&mut self) {
        let lag = self.unsynced();
        for event in self.monitor.observe(lag, Instant::now()) {
            match &event {
                SyncEvent::LagExceeded { lag } => {
                    tracing::warn!(lag, "sync is falling behind the producer")
                }
                SyncEvent::NoProgress { lag, since_ack } => tracing::warn!(
                    lag,
                    since_ack_secs = since_ack.as_secs(),
                    "no operation acknowledged for a while"
                ),
                _ => {}
            }
            self.ctx.emit(event);
        }
    }

    /// Runs until cancelled, the reconnect budget runs out, or a local
    /// failure. `wake` shortens the idle wait after an append.
    pub async fn run(mut self, wake: Arc<Notify>, cancel: CancellationToken) {
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                step = self.step() => step,
            };
            self.observe_lag();

            match step {
                Ok(Step::Progress) => {}
                Ok(Step::Idle) => {
                    self.ctx.state.set(SyncPhase::Idle);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = wake.notified() => {}
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Ok(Step::Retry(delay)) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Ok(Step::GaveUp { .. }) => {
                    self.sink.close().await;
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "sync stopped by a local failure");
                    self.ctx.state.set(SyncPhase::GaveUp);
                    self.sink.close().await;
                    return;
                }
            }
        }
        self.ctx.state.set(SyncPhase::Stopped);
        self.sink.close().await;
    }

    /// Sends until everything up to `target` is acknowledged.
    ///
    /// Fails with [`Error::ReconnectTimeout`] once the reconnect budget is
    /// exhausted; calling again starts a fresh budget. Fails with
    /// [`Error::Stopped`] once the [`cancellation`](Self::cancellation)
    /// token fires.
    pub async fn drain(&mut self, target: Seq) -> Result<()> {
        let cancel = self.cancel.clone();
        while self.ctx.acked() < target {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Stopped),
                step = self.step() => step,
            };
            self.observe_lag();
            match step? {
                Step::Progress => {}
                Step::Idle => break,
                Step::Retry(delay) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Stopped),
                    _ = tokio::time::sleep(delay) => {}
                },
                Step::GaveUp { unsynced } => return Err(Error::ReconnectTimeout { unsynced }),
            }
        }
        self.ctx.state.set(SyncPhase::Idle);
        Ok(())
    }

    /// Closes the sink connection.
    pub async fn close(&mut self) {
        self.sink.close().await;
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
