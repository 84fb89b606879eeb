//! Background aggregation of target write results.
//!
//! Producers push results onto one of two bounded queues and never wait on
//! the stats backend. A single spawned task merges them into an
//! [`ObserverBuffer`] and flushes it to the sink every `report_interval`
//! and once more on shutdown.

mod aggregate_loop;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::ObserverConfig;
use crate::models::WriteResult;
use crate::sink::StatsSink;
use aggregate_loop::{AggregateLoop, Inputs};

/// Capacity of each result queue. Producers wait once a queue is full.
pub const QUEUE_CAPACITY: usize = 1000;

enum Lifecycle {
    /// Not running; the queues are parked here.
    Idle(Inputs),
    Running {
        shutdown: CancellationToken,
        handle: JoinHandle<Inputs>,
    },
    /// A `stop()` call is awaiting the loop.
    Stopping,
    /// The loop task panicked and took the queues with it.
    Failed,
}

/// Aggregates write telemetry and reports it periodically to a stats sink.
pub struct Observer {
    sink: Option<Arc<dyn StatsSink>>,
    config: ObserverConfig,
    normal_tx: mpsc::Sender<WriteResult>,
    oversized_tx: mpsc::Sender<WriteResult>,
    running: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Observer {
    /// Create a stopped observer. Without a sink, flushes only log.
    ///
    /// Zero durations in `config` are replaced by their defaults with a
    /// warning; a zero idle timeout would spin the loop.
    pub fn new(sink: Option<Arc<dyn StatsSink>>, config: ObserverConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                let fixed = config.or_defaults();
                tracing::warn!(component = "observer", error = %e, config = ?fixed, "Invalid observer config, using defaults");
                fixed
            }
        };
        let (normal_tx, normal) = mpsc::channel(QUEUE_CAPACITY);
        let (oversized_tx, oversized) = mpsc::channel(QUEUE_CAPACITY);

        Self {
            sink,
            config,
            normal_tx,
            oversized_tx,
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Idle(Inputs { normal, oversized })),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the aggregation loop on the current tokio runtime.
    ///
    /// Returns immediately. Calling it while the loop is running only logs
    /// a warning. While a `stop()` is still waiting on the loop, the call
    /// is ignored with a warning even though `is_running()` may already be
    /// false; start again once `stop()` has returned.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();

        let inputs = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
            Lifecycle::Idle(inputs) => inputs,
            // Loop already exited after a stop that was abandoned mid-wait.
            Lifecycle::Running { shutdown, mut handle } if handle.is_finished() => {
                match reap(&mut handle, &self.running) {
                    Some(Lifecycle::Idle(inputs)) => inputs,
                    Some(next) => {
                        *lifecycle = next;
                        tracing::warn!(component = "observer", "Observer loop failed earlier, not restarting");
                        return;
                    }
                    None => {
                        *lifecycle = Lifecycle::Running { shutdown, handle };
                        tracing::warn!(component = "observer", "Observer is already running");
                        return;
                    }
                }
            }
            Lifecycle::Failed => {
                *lifecycle = Lifecycle::Failed;
                tracing::warn!(component = "observer", "Observer loop failed earlier, not restarting");
                return;
            }
            Lifecycle::Stopping => {
                tracing::warn!(component = "observer", "Observer is stopping, start ignored");
                return;
            }
            running @ Lifecycle::Running { .. } => {
                *lifecycle = running;
                tracing::warn!(component = "observer", "Observer is already running");
                return;
            }
        };

        self.running.store(true, Ordering::Release);
        let shutdown = CancellationToken::new();
        let task = AggregateLoop {
            inputs,
            sink: self.sink.clone(),
            config: self.config,
            running: Arc::clone(&self.running),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(task.run());

        *lifecycle = Lifecycle::Running { shutdown, handle };
    }

    /// Request shutdown and wait for the loop to finish its final flush.
    ///
    /// Everything recorded before this call is flushed to the sink exactly
    /// once before it returns. Returns immediately when not running. The
    /// wait is unbounded: a sink that hangs in its final `send` hangs here.
    ///
    /// Cancel-safe: if the returned future is dropped before the loop
    /// exits, shutdown stays requested and the loop is handed back, so a
    /// later `stop()` or `start()` picks it up.
    pub async fn stop(&self) {
        let mut pending = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
                Lifecycle::Running { shutdown, handle } => PendingStop {
                    lifecycle: &self.lifecycle,
                    shutdown,
                    handle: Some(handle),
                },
                other => {
                    *lifecycle = other;
                    return;
                }
            }
        };

        pending.shutdown.cancel();

        let Some(handle) = pending.handle.as_mut() else { return };
        let joined = handle.await;
        pending.handle = None;

        *self.lifecycle.lock() = joined_state(joined, &self.running);
    }

    /// Queue a normal write result, waiting while the queue is full.
    pub async fn record_write(&self, result: WriteResult) {
        if self.normal_tx.send(result).await.is_err() {
            tracing::warn!(component = "observer", "Observer queues are gone, dropping write result");
        }
    }

    /// Queue a result for a write rejected as oversized.
    pub async fn record_oversized_write(&self, result: WriteResult) {
        if self.oversized_tx.send(result).await.is_err() {
            tracing::warn!(component = "observer", "Observer queues are gone, dropping oversized write result");
        }
    }

    /// Blocking form of [`record_write`](Self::record_write) for producers
    /// on plain threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn blocking_record_write(&self, result: WriteResult) {
        if self.normal_tx.blocking_send(result).is_err() {
            tracing::warn!(component = "observer", "Observer queues are gone, dropping write result");
        }
    }

    /// Blocking form of [`record_oversized_write`](Self::record_oversized_write).
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn blocking_record_oversized_write(&self, result: WriteResult) {
        if self.oversized_tx.blocking_send(result).is_err() {
            tracing::warn!(component = "observer", "Observer queues are gone, dropping oversized write result");
        }
    }

    /// Results waiting in the normal queue.
    pub fn queued_writes(&self) -> usize {
        self.normal_tx.max_capacity() - self.normal_tx.capacity()
    }

    /// Results waiting in the oversized queue.
    pub fn queued_oversized_writes(&self) -> usize {
        self.oversized_tx.max_capacity() - self.oversized_tx.capacity()
    }
}

impl Drop for Observer {
    // The detached loop still drains and performs its final flush.
    fn drop(&mut self) {
        if let Lifecycle::Running { shutdown, .. } = self.lifecycle.get_mut() {
            shutdown.cancel();
        }
    }
}

/// Puts an in-flight `stop()` back as `Running` if its future is dropped
/// before the loop has been joined.
struct PendingStop<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<Inputs>>,
}

impl Drop for PendingStop<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            *self.lifecycle.lock() = Lifecycle::Running {
                shutdown: self.shutdown.clone(),
                handle,
            };
        }
    }
}

fn joined_state(joined: Result<Inputs, JoinError>, running: &AtomicBool) -> Lifecycle {
    match joined {
        Ok(inputs) => Lifecycle::Idle(inputs),
        Err(e) => {
            tracing::error!(component = "observer", error = %e, "Observer loop terminated abnormally");
            running.store(false, Ordering::Release);
            Lifecycle::Failed
        }
    }
}

/// Collect a finished loop without awaiting. `None` if it is still running.
fn reap(handle: &mut JoinHandle<Inputs>, running: &AtomicBool) -> Option<Lifecycle> {
    handle
        .now_or_never()
        .map(|joined| joined_state(joined, running))
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
