//! Downstream destinations for flushed observer buffers.
//!
//! Delivery is fire-and-forget: a sink owns its own retry and error policy
//! and reports nothing back to the observer.

mod memory;
mod metrics_sink;

use async_trait::async_trait;

use crate::models::ObserverBuffer;

pub use memory::MemorySink;
pub use metrics_sink::MetricsSink;

/// Receives a snapshot of the observer buffer on every flush.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn send(&self, buffer: &ObserverBuffer);
}
