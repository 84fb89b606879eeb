//! Tests for observer lifecycle transitions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::models::{LatencyStats, ObserverBuffer};
use crate::sink::MemorySink;

fn config() -> ObserverConfig {
    ObserverConfig {
        report_interval: Duration::from_secs(60),
        idle_timeout: Duration::from_millis(100),
    }
}

fn result(sent: u64) -> WriteResult {
    WriteResult::new(sent, 0, LatencyStats::default(), LatencyStats::default())
}

fn setup() -> (Arc<MemorySink>, Observer) {
    let sink = Arc::new(MemorySink::new());
    let observer = Observer::new(Some(sink.clone()), config());
    (sink, observer)
}

fn is_idle(observer: &Observer) -> bool {
    matches!(*observer.lifecycle.lock(), Lifecycle::Idle(_))
}

struct PanickingSink;

#[async_trait]
impl StatsSink for PanickingSink {
    async fn send(&self, _: &ObserverBuffer) {
        panic!("sink exploded");
    }
}

/// Takes five seconds to deliver each buffer.
struct SlowSink(Arc<MemorySink>);

#[async_trait]
impl StatsSink for SlowSink {
    async fn send(&self, buffer: &ObserverBuffer) {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.0.send(buffer).await;
    }
}

fn slow_setup() -> (Arc<MemorySink>, Observer) {
    let memory = Arc::new(MemorySink::new());
    let observer = Observer::new(Some(Arc::new(SlowSink(memory.clone()))), config());
    (memory, observer)
}

#[tokio::test(start_paused = true)]
async fn new_observer_is_idle() {
    let (_sink, observer) = setup();
    assert!(!observer.is_running());
    assert!(is_idle(&observer));
}

#[tokio::test(start_paused = true)]
async fn start_twice_runs_one_loop() {
    let (sink, observer) = setup();

    observer.start();
    observer.start();
    assert!(observer.is_running());
    assert!(matches!(*observer.lifecycle.lock(), Lifecycle::Running { .. }));

    observer.stop().await;
    assert!(!observer.is_running());
    assert!(is_idle(&observer));
    assert_eq!(sink.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_when_idle_is_noop() {
    let (sink, observer) = setup();

    observer.stop().await;

    assert_eq!(sink.send_count(), 0);
    assert!(is_idle(&observer));
}

#[tokio::test(start_paused = true)]
async fn restart_reuses_queues() {
    let (sink, observer) = setup();

    observer.start();
    observer.record_write(result(1)).await;
    observer.stop().await;

    // Queued while stopped, picked up by the next loop.
    observer.record_write(result(2)).await;
    assert_eq!(observer.queued_writes(), 1);

    observer.start();
    observer.stop().await;

    let buffers = sink.buffers();
    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0].msg_sent, 1);
    assert_eq!(buffers[1].msg_sent, 2);
    assert_eq!(observer.queued_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn queued_counts_track_each_queue() {
    let (_sink, observer) = setup();

    observer.record_write(result(1)).await;
    observer.record_write(result(1)).await;
    observer.record_oversized_write(result(1)).await;

    assert_eq!(observer.queued_writes(), 2);
    assert_eq!(observer.queued_oversized_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_running_observer_flushes() {
    let (sink, observer) = setup();

    observer.start();
    observer.record_oversized_write(result(4)).await;
    drop(observer);

    tokio::time::sleep(Duration::from_millis(10)).await;

    let last = sink.last().expect("final flush");
    assert_eq!(last.oversized_target_results, 1);
    assert_eq!(last.oversized_msg_sent, 4);
}

#[tokio::test(start_paused = true)]
async fn observer_without_sink_stops_cleanly() {
    let observer = Observer::new(None, config());

    observer.start();
    observer.record_write(result(1)).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    observer.stop().await;

    assert!(!observer.is_running());
    assert!(is_idle(&observer));
}

#[tokio::test(start_paused = true)]
async fn panicking_sink_leaves_observer_failed() {
    let observer = Observer::new(Some(Arc::new(PanickingSink)), config());

    observer.start();
    observer.stop().await;

    assert!(!observer.is_running());
    assert!(matches!(*observer.lifecycle.lock(), Lifecycle::Failed));

    // Restart refused, and producers are not left hanging.
    observer.start();
    assert!(!observer.is_running());
    let pushed = tokio::time::timeout(Duration::from_secs(1), observer.record_write(result(1))).await;
    assert!(pushed.is_ok());
}

#[tokio::test(start_paused = true)]
async fn zero_durations_fall_back_to_defaults() {
    let config = ObserverConfig {
        report_interval: Duration::from_secs(30),
        idle_timeout: Duration::ZERO,
    };
    let sink = Arc::new(MemorySink::new());
    let observer = Observer::new(Some(sink.clone()), config);

    assert_eq!(observer.config().report_interval, Duration::from_secs(30));
    assert_eq!(observer.config().idle_timeout, ObserverConfig::default().idle_timeout);

    observer.start();
    tokio::time::sleep(Duration::from_secs(31)).await;
    observer.stop().await;
    assert_eq!(sink.send_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_stop_allows_restart() {
    let (memory, observer) = slow_setup();

    observer.start();
    observer.record_write(result(1)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(1), observer.stop()).await;
    assert!(stopped.is_err());
    assert!(matches!(*observer.lifecycle.lock(), Lifecycle::Running { .. }));

    // The loop finishes its final flush on its own.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(memory.send_count(), 1);
    assert!(!observer.is_running());

    observer.start();
    assert!(observer.is_running());
    observer.record_write(result(2)).await;
    observer.stop().await;

    let buffers = memory.buffers();
    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0].msg_sent, 1);
    assert_eq!(buffers[1].msg_sent, 2);
    assert!(is_idle(&observer));
}

#[tokio::test(start_paused = true)]
async fn stop_after_abandoned_stop_waits_for_loop() {
    let (memory, observer) = slow_setup();

    observer.start();
    observer.record_oversized_write(result(3)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(1), observer.stop()).await;
    assert!(stopped.is_err());

    observer.stop().await;

    assert_eq!(memory.send_count(), 1);
    assert_eq!(memory.last().expect("final flush").oversized_msg_sent, 3);
    assert!(!observer.is_running());
    assert!(is_idle(&observer));
}

#[tokio::test(start_paused = true)]
async fn start_while_stopping_is_ignored() {
    let (memory, observer) = slow_setup();
    let observer = Arc::new(observer);

    observer.start();
    let stopping = tokio::spawn({
        let observer = Arc::clone(&observer);
        async move { observer.stop().await }
    });

    // Final flush is in progress inside the slow sink.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(*observer.lifecycle.lock(), Lifecycle::Stopping));

    observer.start();
    assert!(matches!(*observer.lifecycle.lock(), Lifecycle::Stopping));

    stopping.await.expect("stop task");
    assert_eq!(memory.send_count(), 1);
    assert!(!observer.is_running());
    assert!(is_idle(&observer));

    observer.start();
    assert!(observer.is_running());
    observer.stop().await;
    assert_eq!(memory.send_count(), 2);
}
