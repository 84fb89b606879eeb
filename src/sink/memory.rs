use async_trait::async_trait;
use parking_lot::Mutex;

use super::StatsSink;
use crate::models::ObserverBuffer;

/// Keeps every delivered buffer in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffers: Mutex<Vec<ObserverBuffer>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all buffers received so far.
    pub fn buffers(&self) -> Vec<ObserverBuffer> {
        self.buffers.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Most recently delivered buffer.
    pub fn last(&self) -> Option<ObserverBuffer> {
        self.buffers.lock().last().cloned()
    }
}

#[async_trait]
impl StatsSink for MemorySink {
    async fn send(&self, buffer: &ObserverBuffer) {
        self.buffers.lock().push(buffer.clone());
    }
}
