//! Write telemetry data model.
//!
//! `WriteResult` describes one finished target write; `ObserverBuffer`
//! accumulates many of them between flushes.

mod buffer;
mod write_result;

pub use buffer::ObserverBuffer;
pub use write_result::{LatencyStats, MessageTiming, WriteResult};
