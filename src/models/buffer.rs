//! Accumulator for write results between two flushes.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::write_result::WriteResult;

/// Aggregated write telemetry for one reporting interval.
///
/// Owned by the observer loop. A zero `min_*` latency means no result
/// with messages has been merged yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObserverBuffer {
    pub target_results: u64,
    pub msg_sent: u64,
    pub msg_failed: u64,
    pub msg_total: u64,

    pub oversized_target_results: u64,
    pub oversized_msg_sent: u64,
    pub oversized_msg_failed: u64,
    pub oversized_msg_total: u64,

    pub max_proc_latency: Duration,
    pub min_proc_latency: Duration,
    pub sum_proc_latency: Duration,

    pub max_msg_latency: Duration,
    pub min_msg_latency: Duration,
    pub sum_msg_latency: Duration,
}

impl ObserverBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one write result into the buffer.
    pub fn append(&mut self, result: &WriteResult, oversized: bool) {
        let total = result.total();

        if oversized {
            self.oversized_target_results += 1;
            self.oversized_msg_sent += result.sent;
            self.oversized_msg_failed += result.failed;
            self.oversized_msg_total += total;
        } else {
            self.target_results += 1;
            self.msg_sent += result.sent;
            self.msg_failed += result.failed;
            self.msg_total += total;
        }

        if total == 0 {
            return;
        }

        let proc = &result.processing_latency;
        merge_latency(
            &mut self.max_proc_latency,
            &mut self.min_proc_latency,
            &mut self.sum_proc_latency,
            proc.max,
            proc.min,
            weighted(proc.avg, total),
        );

        let msg = &result.message_latency;
        merge_latency(
            &mut self.max_msg_latency,
            &mut self.min_msg_latency,
            &mut self.sum_msg_latency,
            msg.max,
            msg.min,
            weighted(msg.avg, total),
        );
    }

    /// True when nothing has been merged since the last reset.
    pub fn is_empty(&self) -> bool {
        self.entries() == 0
    }

    /// Number of merged results, normal and oversized.
    pub fn entries(&self) -> u64 {
        self.target_results + self.oversized_target_results
    }

    /// Messages across both result classes.
    pub fn messages(&self) -> u64 {
        self.msg_total + self.oversized_msg_total
    }

    /// Message-weighted mean processing latency.
    pub fn avg_proc_latency(&self) -> Duration {
        average(self.sum_proc_latency, self.messages())
    }

    /// Message-weighted mean end-to-end latency.
    pub fn avg_msg_latency(&self) -> Duration {
        average(self.sum_msg_latency, self.messages())
    }
}

impl fmt::Display for ObserverBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TargetResults:{},MsgSent:{},MsgFailed:{},OversizedTargetResults:{},\
             OversizedMsgSent:{},OversizedMsgFailed:{},MaxProcLatency:{},\
             MaxMsgLatency:{},AvgProcLatency:{},AvgMsgLatency:{}",
            self.target_results,
            self.msg_sent,
            self.msg_failed,
            self.oversized_target_results,
            self.oversized_msg_sent,
            self.oversized_msg_failed,
            self.max_proc_latency.as_millis(),
            self.max_msg_latency.as_millis(),
            self.avg_proc_latency().as_millis(),
            self.avg_msg_latency().as_millis(),
        )
    }
}

fn merge_latency(
    max: &mut Duration,
    min: &mut Duration,
    sum: &mut Duration,
    sample_max: Duration,
    sample_min: Duration,
    sample_sum: Duration,
) {
    if sample_max > *max {
        *max = sample_max;
    }
    if min.is_zero() || sample_min < *min {
        *min = sample_min;
    }
    *sum = sum.saturating_add(sample_sum);
}

fn weighted(avg: Duration, count: u64) -> Duration {
    let nanos = avg.as_nanos().saturating_mul(u128::from(count));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn average(sum: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = sum.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
