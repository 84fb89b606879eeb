//! Write Observer
//!
//! Background aggregation of target write telemetry. Producers record the
//! outcome of every write; a single background task merges the results
//! and periodically flushes a summary to a stats sink.
//!
//! # Guarantees
//!
//! - Producers never wait on the stats backend, only on a full queue.
//! - Each queue is FIFO; there is no ordering between the two queues.
//! - A flush happens once `report_interval` has passed (checked after every
//!   result or idle tick) and unconditionally on shutdown.
//! - `stop()` returns only after everything recorded before it has been
//!   flushed exactly once. Dropping it mid-wait is safe; the loop still
//!   flushes and a later `stop()` or `start()` picks it up.
//!
//! ```no_run
//! use std::sync::Arc;
//! use write_observer::{MemorySink, Observer, ObserverConfig, WriteResult};
//!
//! # async fn run() {
//! let sink = Arc::new(MemorySink::new());
//! let observer = Observer::new(Some(sink.clone()), ObserverConfig::from_env());
//! observer.start();
//! observer.record_write(WriteResult::default()).await;
//! observer.stop().await;
//! assert_eq!(sink.send_count(), 1);
//! # }
//! ```

pub mod config;
pub mod models;
pub mod observer;
pub mod sink;
pub mod telemetry;

pub use config::{ConfigError, ObserverConfig};
pub use models::{LatencyStats, MessageTiming, ObserverBuffer, WriteResult};
pub use observer::{Observer, QUEUE_CAPACITY};
pub use sink::{MemorySink, MetricsSink, StatsSink};
