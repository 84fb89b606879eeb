//! Forwards flushed buffers to the `metrics` facade.
//!
//! Whatever recorder the host process installs (StatsD, Prometheus, ...)
//! owns the wire format. Without a recorder every call is a no-op.

use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram, Label};

use super::StatsSink;
use crate::models::ObserverBuffer;

/// Stats sink publishing counters and latency histograms (in ms).
#[derive(Debug, Clone)]
pub struct MetricsSink {
    prefix: String,
    labels: Vec<Label>,
}

impl MetricsSink {
    /// Metric names become `{prefix}.{name}`; an empty prefix uses bare names.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), labels: Vec::new() }
    }

    /// Attach a static label to every emitted metric.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push(Label::new(key.into(), value.into()));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Full metric name for `name` under this sink's prefix.
    pub fn metric_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    fn incr(&self, name: &str, value: u64) {
        counter!(self.metric_name(name), self.labels.clone()).increment(value);
    }

    fn timing(&self, name: &str, value: Duration) {
        histogram!(self.metric_name(name), self.labels.clone()).record(value.as_secs_f64() * 1000.0);
    }
}

#[async_trait]
impl StatsSink for MetricsSink {
    async fn send(&self, buffer: &ObserverBuffer) {
        self.incr("target_results", buffer.target_results);
        self.incr("message_sent", buffer.msg_sent);
        self.incr("message_failed", buffer.msg_failed);
        self.incr("oversized_target_results", buffer.oversized_target_results);
        self.incr("oversized_message_sent", buffer.oversized_msg_sent);
        self.incr("oversized_message_failed", buffer.oversized_msg_failed);

        self.timing("latency_processing_max", buffer.max_proc_latency);
        self.timing("latency_processing_min", buffer.min_proc_latency);
        self.timing("latency_processing_avg", buffer.avg_proc_latency());
        self.timing("latency_message_max", buffer.max_msg_latency);
        self.timing("latency_message_min", buffer.min_msg_latency);
        self.timing("latency_message_avg", buffer.avg_msg_latency());
    }
}
