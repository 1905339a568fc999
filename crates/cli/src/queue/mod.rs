// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue lifecycle: opening, producing, waiting and stopping.
//!
//! A queue lives in one directory:
//!
//! ```text
//! <dir>/
//!   data-<first_seq>.log   operation log segments
//!   offsets.json           last_put / last_ack
//!   queue.json             creation metadata
//!   queue.lock             held by the owning process
//! ```
//!
//! The [`SyncMode`] picks who drains it. `Sync` drains inline from
//! [`QueueHandle::enqueue`], `Async` spawns a background [`Consumer`] task,
//! `Offline` only drains on an explicit [`QueueHandle::sync`].

mod flush;
mod lock;
mod metadata;

pub use lock::{QueueLock, LOCK_FILE};
pub use metadata::{has_queue_state, QueueMetadata, METADATA_FILE};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rq_core::{OffsetTracker, OpLog, Offsets, PendingOperation, Seq};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::mode::SyncMode;
use crate::sync::{BackpressurePolicy, Consumer, RemoteSink, SyncContext, SyncEvent, SyncPhase};

/// Outcome of draining a queue against a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations accepted by the server.
    pub synced: u64,
    /// Operations the server refused for good.
    pub rejected: u64,
    /// Operations still waiting on disk.
    pub remaining: u64,
}

enum Storage {
    /// Debug mode: operations are counted and dropped.
    Discard { last: AtomicU64 },
    /// Read-only view of the offsets found on disk.
    Snapshot { offsets: Offsets },
    Log {
        log: Mutex<OpLog>,
        ctx: SyncContext,
        put: AtomicU64,
    },
}

enum Engine {
    None,
    Inline {
        consumer: Mutex<Consumer>,
        cancel: CancellationToken,
    },
    Background {
        wake: Arc<Notify>,
        cancel: CancellationToken,
        task: Mutex<Option<JoinHandle<()>>>,
    },
}

struct Shared {
    dir: PathBuf,
    mode: SyncMode,
    config: QueueConfig,
    storage: Storage,
    engine: Engine,
    lock: Mutex<Option<QueueLock>>,
    stopped: AtomicBool,
}

/// Entry point for opening queues.
pub struct SyncQueue;

impl SyncQueue {
    /// Creates or resumes the queue in `dir`.
    ///
    /// `Sync` and `Async` need a sink; the other modes must not get one.
    /// `Async` spawns its consumer, so it must be opened from within a tokio
    /// runtime.
    pub fn open(
        dir: impl AsRef<Path>,
        mode: SyncMode,
        sink: Option<Box<dyn RemoteSink>>,
        config: QueueConfig,
    ) -> Result<QueueHandle> {
        let dir = dir.as_ref().to_path_buf();
        match (mode.requires_sink(), sink.is_some()) {
            (true, false) => {
                return Err(Error::InvalidMode {
                    mode,
                    reason: "requires a remote sink",
                })
            }
            (false, true) => {
                return Err(Error::InvalidMode {
                    mode,
                    reason: "does not take a remote sink",
                })
            }
            _ => {}
        }

        let (storage, engine, lock) = match mode {
            SyncMode::Debug => {
                tracing::info!("debug mode: operations are discarded");
                let storage = Storage::Discard {
                    last: AtomicU64::new(0),
                };
                (storage, Engine::None, None)
            }
            SyncMode::ReadOnly => {
                if !has_queue_state(&dir) {
                    return Err(Error::NotAQueue(dir));
                }
                let offsets = OffsetTracker::inspect(&dir)?;
                (Storage::Snapshot { offsets }, Engine::None, None)
            }
            SyncMode::Sync | SyncMode::Async | SyncMode::Offline => {
                open_writable(&dir, mode, sink, &config)?
            }
        };

        Ok(QueueHandle {
            shared: Arc::new(Shared {
                dir,
                mode,
                config,
                storage,
                engine,
                lock: Mutex::new(lock),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}

fn open_writable(
    dir: &Path,
    mode: SyncMode,
    sink: Option<Box<dyn RemoteSink>>,
    config: &QueueConfig,
) -> Result<(Storage, Engine, Option<QueueLock>)> {
    fs::create_dir_all(dir).map_err(|e| Error::Persistence {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let lock = QueueLock::acquire(dir)?;
    let resumed = has_queue_state(dir);

    match QueueMetadata::load(dir)? {
        Some(meta) if meta.mode != mode => {
            tracing::info!(created_as = %meta.mode, %mode, "reopening queue in a different mode");
        }
        Some(_) => {}
        None => QueueMetadata::new(mode).save(dir)?,
    }

    let log = OpLog::open(dir, config.max_segment_bytes)?;
    let tracker = OffsetTracker::open(dir, log.tail())?;
    let offsets = tracker.read();
    if resumed {
        tracing::info!(
            dir = %dir.display(),
            last_put = offsets.last_put,
            last_ack = offsets.last_ack,
            "resuming queue"
        );
    }
    if offsets.lag() > 0 && log.first_available() > offsets.last_ack + 1 {
        tracing::warn!(
            last_ack = offsets.last_ack,
            first_available = log.first_available(),
            "possible data loss: unsynced operations are missing from the log"
        );
    }

    let ctx = SyncContext::new(tracker);
    let engine = match (mode, sink) {
        (SyncMode::Sync, Some(sink)) => {
            let consumer = Consumer::new(log.reader(), sink, ctx.clone(), config);
            Engine::Inline {
                cancel: consumer.cancellation(),
                consumer: Mutex::new(consumer),
            }
        }
        (SyncMode::Async, Some(sink)) => {
            let consumer = Consumer::new(log.reader(), sink, ctx.clone(), config);
            let wake = Arc::new(Notify::new());
            let cancel = CancellationToken::new();
            let task = tokio::spawn(consumer.run(Arc::clone(&wake), cancel.clone()));
            Engine::Background {
                wake,
                cancel,
                task: Mutex::new(Some(task)),
            }
        }
        _ => Engine::None,
    };

    let storage = Storage::Log {
        put: AtomicU64::new(log.tail()),
        log: Mutex::new(log),
        ctx,
    };
    Ok((storage, engine, Some(lock)))
}

impl Shared {
    fn lag(&self) -> u64 {
        match &self.storage {
            Storage::Discard { .. } => 0,
            Storage::Snapshot { offsets } => offsets.lag(),
            Storage::Log { ctx, put, .. } => put.load(Ordering::Acquire).saturating_sub(ctx.acked()),
        }
    }

    async fn enqueue(&self, op: PendingOperation) -> Result<Seq> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::Stopped);
        }
        let (log, ctx, put) = match &self.storage {
            Storage::Snapshot { .. } => return Err(Error::ReadOnly),
            Storage::Discard { last } => {
                let seq = last.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::debug!(seq, kind = %op.payload.kind(), path = %op.path, "discarding operation");
                return Ok(seq);
            }
            Storage::Log { log, ctx, put } => (log, ctx, put),
        };

        let seq = log.lock().await.append(op)?;
        put.fetch_max(seq, Ordering::AcqRel);
        ctx.offsets.lock().await.record_put(seq);

        match &self.engine {
            Engine::Inline { consumer, .. } => consumer.lock().await.drain(seq).await?,
            Engine::Background { wake, .. } => {
                wake.notify_one();
                self.hold_back(ctx).await;
            }
            Engine::None => {}
        }
        Ok(seq)
    }

    /// Makes the producer wait while the lag is too large, if configured.
    async fn hold_back(&self, ctx: &SyncContext) {
        if self.config.backpressure != BackpressurePolicy::Block {
            return;
        }
        let lag = self.lag();
        if lag <= self.config.lag_threshold || ctx.state.is_terminal() {
            return;
        }
        let target = lag - self.config.lag_threshold + ctx.acked();
        tracing::debug!(lag, target, "holding the producer back");
        let waited = tokio::time::timeout(
            self.config.block_timeout(),
            until_acked(ctx, target, self.config.poll_interval()),
        )
        .await;
        if waited.is_err() {
            tracing::warn!(
                lag = self.lag(),
                "lag still above the threshold after {}s, continuing",
                self.config.block_timeout().as_secs()
            );
        }
    }
}

/// Resolves once `target` is acknowledged (true) or the consumer can no
/// longer progress on its own (false).
async fn until_acked(ctx: &SyncContext, target: Seq, poll: Duration) -> bool {
    let mut acked = ctx.acked.subscribe();
    loop {
        if *acked.borrow_and_update() >= target {
            return true;
        }
        if ctx.state.is_terminal() {
            return false;
        }
        tokio::select! {
            changed = acked.changed() => {
                if changed.is_err() {
                    return ctx.acked() >= target;
                }
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

/// Owning handle of an open queue.
///
/// Dropping the handle without [`stop`](Self::stop) cancels the background
/// consumer without a final flush; operations stay on disk.
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl QueueHandle {
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    pub fn mode(&self) -> SyncMode {
        self.shared.mode
    }

    /// Appended operations not yet acknowledged.
    pub fn lag(&self) -> u64 {
        self.shared.lag()
    }

    /// Highest appended sequence number.
    pub fn last_put(&self) -> Seq {
        match &self.shared.storage {
            Storage::Discard { last } => last.load(Ordering::Acquire),
            Storage::Snapshot { offsets } => offsets.last_put,
            Storage::Log { put, .. } => put.load(Ordering::Acquire),
        }
    }

    /// Highest acknowledged sequence number.
    pub fn last_ack(&self) -> Seq {
        match &self.shared.storage {
            Storage::Discard { last } => last.load(Ordering::Acquire),
            Storage::Snapshot { offsets } => offsets.last_ack,
            Storage::Log { ctx, .. } => ctx.acked(),
        }
    }

    /// State of the consumer, e.g. `idle` or `backoff (attempt 2, retry in 4s)`.
    pub fn status(&self) -> String {
        if self.shared.stopped.load(Ordering::Acquire) {
            return SyncPhase::Stopped.to_string();
        }
        match (&self.shared.storage, &self.shared.engine) {
            (Storage::Log { ctx, .. }, Engine::Inline { .. } | Engine::Background { .. }) => {
                ctx.state.status_string()
            }
            _ => self.shared.mode.to_string(),
        }
    }

    /// Appends an operation.
    ///
    /// In `Sync` mode this returns once the operation is acknowledged and
    /// fails with [`Error::ReconnectTimeout`] if the server stays
    /// unreachable, or with [`Error::Stopped`] if the queue is stopped
    /// meanwhile; the operation is kept on disk either way.
    pub async fn enqueue(&self, op: PendingOperation) -> Result<Seq> {
        self.shared.enqueue(op).await
    }

    /// Returns a non-owning handle for producers.
    pub fn producer(&self) -> Producer {
        Producer {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribes to sync signals. Returns a receiver that never yields for
    /// modes without a consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        match &self.shared.storage {
            Storage::Log { ctx, .. } => ctx.events.subscribe(),
            _ => broadcast::channel(1).1,
        }
    }

    /// Waits until every appended operation is acknowledged.
    ///
    /// Returns whether the queue is fully synced; `None` waits without a
    /// deadline.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let shared = &self.shared;
        let Storage::Log { ctx, put, .. } = &shared.storage else {
            return Ok(shared.lag() == 0);
        };
        let target = put.load(Ordering::Acquire);

        let drained = async {
            match &shared.engine {
                Engine::None => Ok(ctx.acked() >= target),
                Engine::Background { .. } => {
                    Ok(until_acked(ctx, target, shared.config.poll_interval()).await)
                }
                Engine::Inline { consumer, .. } => match consumer.lock().await.drain(target).await {
                    Ok(()) => Ok(ctx.acked() >= target),
                    Err(Error::ReconnectTimeout { .. } | Error::Stopped) => Ok(false),
                    Err(e) => Err(e),
                },
            }
        };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, drained)
                .await
                .unwrap_or(Ok(false)),
            None => drained.await,
        }
    }

    /// Flushes for at most `timeout`, then halts the consumer.
    ///
    /// Returns the number of operations left unsynced; they stay on disk
    /// for a later resume. Calling it again only reports the lag.
    pub async fn stop(&self, timeout: Duration) -> Result<u64> {
        self.shutdown(Some(timeout)).await
    }

    /// Halts the consumer, flushing first when `flush` is given.
    async fn shutdown(&self, flush: Option<Duration>) -> Result<u64> {
        let shared = &self.shared;
        if shared.stopped.swap(true, Ordering::AcqRel) {
            return Ok(shared.lag());
        }
        let Storage::Log { ctx, put, .. } = &shared.storage else {
            return Ok(shared.lag());
        };
        let target = put.load(Ordering::Acquire);
        let lag = || shared.lag();
        let interval = shared.config.status_interval();

        match &shared.engine {
            Engine::Background { cancel, task, .. } => {
                if let Some(timeout) = flush.filter(|_| ctx.state.get() != SyncPhase::GaveUp) {
                    let poll = shared.config.poll_interval();
                    flush::flush_with_progress(
                        until_acked(ctx, target, poll),
                        lag,
                        &shared.dir,
                        timeout,
                        interval,
                    )
                    .await;
                }
                cancel.cancel();
                if let Some(task) = task.lock().await.take() {
                    if let Err(e) = task.await {
                        tracing::warn!(error = %e, "sync task ended abnormally");
                    }
                }
            }
            Engine::Inline { consumer, cancel } => {
                // An enqueue still sending holds the consumer, so waiting for
                // it counts against the flush deadline.
                if let Some(timeout) = flush {
                    let drain = async {
                        match consumer.lock().await.drain(target).await {
                            Ok(()) => true,
                            Err(Error::ReconnectTimeout { .. } | Error::Stopped) => false,
                            Err(e) => {
                                tracing::error!(error = %e, "final flush failed");
                                false
                            }
                        }
                    };
                    flush::flush_with_progress(drain, lag, &shared.dir, timeout, interval).await;
                }
                cancel.cancel();
                consumer.lock().await.close().await;
                ctx.state.set(SyncPhase::Stopped);
            }
            Engine::None => {}
        }

        ctx.offsets.lock().await.flush()?;
        if let Some(lock) = shared.lock.lock().await.take() {
            lock.release();
        }
        let unsynced = shared.lag();
        tracing::debug!(unsynced, dir = %shared.dir.display(), "queue stopped");
        Ok(unsynced)
    }

    /// Drains the queue inline against `sink`.
    ///
    /// Used for `Offline` queues and for `Async` queues whose consumer gave
    /// up; a successful sync of the latter restarts the background consumer
    /// with `sink`. Fails with [`Error::ReconnectTimeout`] if the server
    /// stays unreachable.
    pub async fn sync(&self, sink: Box<dyn RemoteSink>) -> Result<SyncReport> {
        let shared = &self.shared;
        if shared.stopped.load(Ordering::Acquire) {
            return Err(Error::Stopped);
        }
        let Storage::Log { log, ctx, put } = &shared.storage else {
            return Err(Error::InvalidMode {
                mode: shared.mode,
                reason: "cannot be synced",
            });
        };
        match &shared.engine {
            Engine::None => {}
            Engine::Background { .. } if ctx.state.get() == SyncPhase::GaveUp => {}
            _ => {
                return Err(Error::InvalidMode {
                    mode: shared.mode,
                    reason: "already syncs with its own sink",
                })
            }
        }

        let reader = log.lock().await.reader();
        let mut consumer = Consumer::new(reader, sink, ctx.clone(), &shared.config);
        let target = put.load(Ordering::Acquire);
        let result = consumer.drain(target).await;
        let report = SyncReport {
            synced: consumer.synced(),
            rejected: consumer.rejected(),
            remaining: shared.lag(),
        };

        match (&shared.engine, result) {
            // The server is reachable again: the new sink takes over in the
            // background.
            (Engine::Background { wake, cancel, task }, Ok(())) => {
                tracing::info!(dir = %shared.dir.display(), "resuming background sync");
                let handle = tokio::spawn(consumer.run(Arc::clone(wake), cancel.clone()));
                *task.lock().await = Some(handle);
                Ok(report)
            }
            (_, result) => {
                consumer.close().await;
                result.map(|()| report)
            }
        }
    }

    /// Stops the queue and removes its directory.
    ///
    /// Refuses with [`Error::NotSynced`] while operations are unsynced; use
    /// [`discard`](Self::discard) to drop them.
    pub async fn close_and_cleanup(&self) -> Result<()> {
        if self.shared.mode == SyncMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let unsynced = self.shared.lag();
        if unsynced > 0 {
            return Err(Error::NotSynced { unsynced });
        }
        self.stop(Duration::ZERO).await?;
        self.remove_dir()
    }

    /// Stops the queue and removes its directory, unsynced operations
    /// included.
    pub async fn discard(&self) -> Result<()> {
        if self.shared.mode == SyncMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let unsynced = self.shutdown(None).await?;
        if unsynced > 0 {
            tracing::warn!(unsynced, dir = %self.shared.dir.display(), "discarding unsynced operations");
        }
        self.remove_dir()
    }

    fn remove_dir(&self) -> Result<()> {
        if !self.shared.mode.persists() {
            return Ok(());
        }
        match fs::remove_dir_all(&self.shared.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence {
                path: self.shared.dir.clone(),
                source: e,
            }),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        match &self.engine {
            Engine::Background { cancel, .. } | Engine::Inline { cancel, .. } => cancel.cancel(),
            Engine::None => {}
        }
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        if let Storage::Log { ctx, .. } = &self.storage {
            if let Ok(mut offsets) = ctx.offsets.try_lock() {
                if let Err(e) = offsets.flush() {
                    tracing::warn!(error = %e, "cannot flush offsets on close");
                }
            }
        }
    }
}

/// Non-owning handle used by producers.
///
/// Fails with [`Error::Stopped`] once the owning [`QueueHandle`] is stopped
/// or dropped.
#[derive(Clone)]
pub struct Producer {
    shared: Weak<Shared>,
}

impl Producer {
    pub async fn enqueue(&self, op: PendingOperation) -> Result<Seq> {
        let shared = self.shared.upgrade().ok_or(Error::Stopped)?;
        shared.enqueue(op).await
    }

    /// Appended operations not yet acknowledged; 0 once the queue is gone.
    pub fn lag(&self) -> u64 {
        self.shared.upgrade().map_or(0, |shared| shared.lag())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
