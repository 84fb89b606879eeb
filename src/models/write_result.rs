//! Outcome of a single target write attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Min/max/average over a set of latency samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
}

impl LatencyStats {
    /// Compute stats from samples. No samples yields all-zero stats.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        let mut count: u64 = 0;
        let mut sum: u128 = 0;
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;

        for sample in samples {
            count += 1;
            sum += sample.as_nanos();
            min = min.min(sample);
            max = max.max(sample);
        }

        if count == 0 {
            return Self::default();
        }

        Self { min, max, avg: from_nanos(sum / u128::from(count)) }
    }
}

/// The mean of durations never exceeds `Duration::MAX`, so this only
/// saturates on inputs no average can produce.
fn from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Duration::new(secs, subsec)
}

/// Source timestamps carried by one message through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTiming {
    /// When the message was originally created upstream.
    pub created_at: DateTime<Utc>,
    /// When the message was pulled from the source.
    pub pulled_at: DateTime<Utc>,
}

impl MessageTiming {
    pub fn new(created_at: DateTime<Utc>, pulled_at: DateTime<Utc>) -> Self {
        Self { created_at, pulled_at }
    }
}

/// Immutable result of one write to a target.
///
/// Whether a result counts as oversized is decided by the queue it is
/// recorded on, not by anything stored here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub sent: u64,
    pub failed: u64,
    /// Time from pull to write completion.
    pub processing_latency: LatencyStats,
    /// Time from creation to write completion.
    pub message_latency: LatencyStats,
}

impl WriteResult {
    pub fn new(
        sent: u64,
        failed: u64,
        processing_latency: LatencyStats,
        message_latency: LatencyStats,
    ) -> Self {
        Self { sent, failed, processing_latency, message_latency }
    }

    /// Build a result from the messages of a finished write.
    ///
    /// Latencies cover sent and failed messages alike. Spans that come out
    /// negative because of clock skew are clamped to zero.
    pub fn from_messages(
        sent: &[MessageTiming],
        failed: &[MessageTiming],
        completed_at: DateTime<Utc>,
    ) -> Self {
        let all = || sent.iter().chain(failed.iter());

        let processing_latency =
            LatencyStats::from_samples(all().map(|m| elapsed(m.pulled_at, completed_at)));
        let message_latency =
            LatencyStats::from_samples(all().map(|m| elapsed(m.created_at, completed_at)));

        Self {
            sent: sent.len() as u64,
            failed: failed.len() as u64,
            processing_latency,
            message_latency,
        }
    }

    /// Number of messages covered by this result.
    pub fn total(&self) -> u64 {
        self.sent + self.failed
    }
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_600_000_000_000 + ms).unwrap()
    }

    #[test]
    fn latency_stats_empty_is_zero() {
        let stats = LatencyStats::from_samples(std::iter::empty());
        assert_eq!(stats, LatencyStats::default());
    }

    #[test]
    fn latency_stats_min_max_avg() {
        let stats = LatencyStats::from_samples([
            Duration::from_millis(10),
            Duration::from_millis(30),
            Duration::from_millis(20),
        ]);
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert_eq!(stats.avg, Duration::from_millis(20));
    }

    #[test]
    fn latency_stats_huge_samples_do_not_overflow() {
        let stats = LatencyStats::from_samples([Duration::MAX, Duration::MAX]);
        assert_eq!(stats.min, Duration::MAX);
        assert_eq!(stats.max, Duration::MAX);
        assert_eq!(stats.avg, Duration::MAX);

        let stats = LatencyStats::from_samples([Duration::MAX, Duration::ZERO]);
        assert_eq!(stats.avg, Duration::MAX / 2);
    }

    #[test]
    fn from_messages_counts_and_latencies() {
        let sent = [
            MessageTiming::new(at(0), at(100)),
            MessageTiming::new(at(50), at(200)),
        ];
        let failed = [MessageTiming::new(at(100), at(300))];

        let result = WriteResult::from_messages(&sent, &failed, at(400));

        assert_eq!(result.sent, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.total(), 3);
        assert_eq!(result.processing_latency.max, Duration::from_millis(300));
        assert_eq!(result.processing_latency.min, Duration::from_millis(100));
        assert_eq!(result.processing_latency.avg, Duration::from_millis(200));
        assert_eq!(result.message_latency.max, Duration::from_millis(400));
        assert_eq!(result.message_latency.min, Duration::from_millis(300));
    }

    #[test]
    fn from_messages_clamps_clock_skew() {
        let sent = [MessageTiming::new(at(500), at(600))];
        let result = WriteResult::from_messages(&sent, &[], at(0));
        assert_eq!(result.processing_latency.max, Duration::ZERO);
        assert_eq!(result.message_latency.max, Duration::ZERO);
    }

    #[test]
    fn from_messages_empty() {
        let result = WriteResult::from_messages(&[], &[], at(0));
        assert_eq!(result.total(), 0);
        assert_eq!(result.processing_latency, LatencyStats::default());
    }
}
