//! Aggregate queue metrics, updated only from `complete_request`'s single
//! code path so the outcome counters always sum to `total_processed`.

use serde::Serialize;

use super::request::RequestStatus;

/// Rolling counters over all terminal requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueMetrics {
    pub total_processed: u64,
    pub successful_completions: u64,
    pub partial_successes: u64,
    /// FAILED and TIMEOUT outcomes.
    pub failures: u64,
    /// Subset of `failures` that were timeouts.
    pub timeouts: u64,
    /// Requests that went through the chunker.
    pub chunking_usage: u64,
    pub average_processing_time_secs: f64,
}

impl QueueMetrics {
    /// Record one terminal outcome. `processing_secs` is the
    /// started-to-completed duration (0 for never-started requests).
    pub(crate) fn record_outcome(
        &mut self,
        status: RequestStatus,
        processing_secs: f64,
        chunking_applied: bool,
    ) {
        self.total_processed += 1;
        match status {
            RequestStatus::Completed => self.successful_completions += 1,
            RequestStatus::PartialSuccess => self.partial_successes += 1,
            RequestStatus::Timeout => {
                self.failures += 1;
                self.timeouts += 1;
            }
            _ => self.failures += 1,
        }
        if chunking_applied {
            self.chunking_usage += 1;
        }
        let n = self.total_processed as f64;
        self.average_processing_time_secs =
            (self.average_processing_time_secs * (n - 1.0) + processing_secs.max(0.0)) / n;
    }
}

/// Percentages derived from [`QueueMetrics`], with safe division.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkingStats {
    pub chunking_usage_rate: f64,
    pub partial_success_rate: f64,
    /// Completed plus partial successes over all processed.
    pub overall_success_rate: f64,
}

impl ChunkingStats {
    pub(crate) fn from_metrics(metrics: &QueueMetrics) -> Self {
        let denom = metrics.total_processed.max(1) as f64;
        Self {
            chunking_usage_rate: metrics.chunking_usage as f64 / denom * 100.0,
            partial_success_rate: metrics.partial_successes as f64 / denom * 100.0,
            overall_success_rate: (metrics.successful_completions + metrics.partial_successes)
                as f64
                / denom
                * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_always_sum_to_total() {
        let mut m = QueueMetrics::default();
        m.record_outcome(RequestStatus::Completed, 1.0, false);
        m.record_outcome(RequestStatus::Failed, 0.5, false);
        m.record_outcome(RequestStatus::PartialSuccess, 2.0, true);
        m.record_outcome(RequestStatus::Timeout, 10.0, true);
        assert_eq!(
            m.total_processed,
            m.successful_completions + m.partial_successes + m.failures
        );
        assert_eq!(m.timeouts, 1);
        assert_eq!(m.chunking_usage, 2);
    }

    #[test]
    fn average_tracks_processing_time() {
        let mut m = QueueMetrics::default();
        m.record_outcome(RequestStatus::Completed, 2.0, false);
        m.record_outcome(RequestStatus::Completed, 4.0, false);
        assert!((m.average_processing_time_secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn stats_divide_safely_when_empty() {
        let stats = ChunkingStats::from_metrics(&QueueMetrics::default());
        assert_eq!(stats.chunking_usage_rate, 0.0);
        assert_eq!(stats.partial_success_rate, 0.0);
        assert_eq!(stats.overall_success_rate, 0.0);
    }
}
