//! The aggregation loop: drain both queues, merge, flush on deadline.
//!
//! Only this task touches the buffer, so it needs no locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::QUEUE_CAPACITY;
use crate::config::ObserverConfig;
use crate::models::{ObserverBuffer, WriteResult};
use crate::sink::StatsSink;

/// Receiving ends of the two result queues.
///
/// Moved into the loop while it runs and handed back when it exits, so a
/// stopped observer can be started again without losing queued results.
pub(super) struct Inputs {
    pub normal: mpsc::Receiver<WriteResult>,
    pub oversized: mpsc::Receiver<WriteResult>,
}

impl Inputs {
    /// Merge whatever is already queued. Bounded per queue so producers
    /// refilling a full queue cannot keep shutdown from completing.
    fn drain_into(&mut self, buffer: &mut ObserverBuffer) -> usize {
        let mut drained = 0;
        for (rx, oversized) in [(&mut self.normal, false), (&mut self.oversized, true)] {
            for _ in 0..QUEUE_CAPACITY {
                let Ok(result) = rx.try_recv() else { break };
                buffer.append(&result, oversized);
                drained += 1;
            }
        }
        drained
    }
}

pub(super) struct AggregateLoop {
    pub inputs: Inputs,
    pub sink: Option<Arc<dyn StatsSink>>,
    pub config: ObserverConfig,
    pub running: Arc<AtomicBool>,
    pub shutdown: CancellationToken,
}

impl AggregateLoop {
    /// Run until shutdown is requested. Returns the queues for reuse.
    pub(super) async fn run(self) -> Inputs {
        let AggregateLoop { mut inputs, sink, config, running, shutdown } = self;
        let sink = sink.as_deref();

        let mut buffer = ObserverBuffer::new();
        let mut report_at = Instant::now() + config.report_interval;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::warn!(component = "observer", "Received exit signal, shutting down observer");
                    let drained = inputs.drain_into(&mut buffer);
                    tracing::debug!(component = "observer", drained, "drained queued results before final flush");
                    flush(&buffer, sink).await;
                    running.store(false, Ordering::Release);
                    break;
                }
                Some(result) = inputs.normal.recv() => {
                    buffer.append(&result, false);
                }
                Some(result) = inputs.oversized.recv() => {
                    buffer.append(&result, true);
                }
                () = tokio::time::sleep(config.idle_timeout) => {
                    tracing::debug!(
                        component = "observer",
                        timeout_ms = config.idle_timeout.as_millis() as u64,
                        "observer timed out waiting for result"
                    );
                }
            }

            if Instant::now() >= report_at {
                flush(&buffer, sink).await;
                buffer = ObserverBuffer::new();
                report_at = Instant::now() + config.report_interval;
            }
        }

        inputs
    }
}

/// Log the summary and hand it to the sink. Sink failures are the sink's
/// business; nothing is retried or re-buffered here.
async fn flush(buffer: &ObserverBuffer, sink: Option<&dyn StatsSink>) {
    tracing::info!(component = "observer", entries = buffer.entries(), "{}", buffer);
    if let Some(sink) = sink {
        sink.send(buffer).await;
    }
}
