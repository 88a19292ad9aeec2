//! Metrics recording helpers.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners
//! and metric names live in one place. An application installs whatever
//! exporter it wants; without one these are no-ops.

use metrics::{counter, gauge, histogram};

/// Record a completed request (COMPLETED or PARTIAL_SUCCESS).
pub fn record_request_success(request_type: &str, latency_ms: u64) {
    counter!("helpline_requests_total", "request_type" => request_type.to_string(), "outcome" => "success")
        .increment(1);
    histogram!("helpline_request_latency_ms", "request_type" => request_type.to_string())
        .record(latency_ms as f64);
}

/// Record a failed or timed-out request.
pub fn record_request_failure(request_type: &str, reason: &str) {
    counter!("helpline_requests_total", "request_type" => request_type.to_string(), "outcome" => reason.to_string())
        .increment(1);
}

/// Record the current queue depth after an admission.
pub fn record_queue_depth(depth: usize) {
    gauge!("helpline_queue_depth").set(depth as f64);
}

/// Record time spent waiting for a GPU slot.
pub fn record_slot_wait(lane: &str, wait_ms: u64) {
    histogram!("helpline_slot_wait_ms", "lane" => lane.to_string()).record(wait_ms as f64);
}

/// Record that a request's payload was chunked.
pub fn record_chunking(strategy: &str, chunks: usize) {
    counter!("helpline_chunked_requests_total", "strategy" => strategy.to_string()).increment(1);
    histogram!("helpline_chunks_per_request", "strategy" => strategy.to_string())
        .record(chunks as f64);
}
