//! Queued request record and lifecycle types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Default priority for new requests (mid value; lower is more urgent).
pub const DEFAULT_PRIORITY: u8 = 5;

/// Lifecycle state of one queued unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Timeout,
    PartialSuccess,
}

impl RequestStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::PartialSuccess
        )
    }
}

/// Chunking and fallback progress for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingInfo {
    pub chunking_applied: bool,
    /// Monotonically increasing; never exceeds `total_chunks` once known.
    pub chunks_processed: u32,
    /// Fixed once known (first non-zero value wins).
    pub total_chunks: u32,
    /// Strategy names tried, in order.
    pub fallback_strategies_used: Vec<String>,
    /// Partial results keyed by chunk or sub-task.
    pub partial_results: BTreeMap<String, Value>,
}

impl ProcessingInfo {
    /// Chunk completion percentage; 0 when `total_chunks` is unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            0.0
        } else {
            self.chunks_processed as f64 / self.total_chunks as f64 * 100.0
        }
    }

    /// Merge a partial update, enforcing the monotonicity invariants.
    pub(crate) fn apply(&mut self, update: ProcessingUpdate) {
        if let Some(applied) = update.chunking_applied {
            self.chunking_applied |= applied;
        }
        if let Some(total) = update.total_chunks {
            if self.total_chunks == 0 {
                self.total_chunks = total;
            }
        }
        if let Some(processed) = update.chunks_processed {
            let mut processed = processed.max(self.chunks_processed);
            if self.total_chunks > 0 {
                processed = processed.min(self.total_chunks);
            }
            self.chunks_processed = processed;
        }
        if let Some(strategy) = update.fallback_strategy {
            self.fallback_strategies_used.push(strategy);
        }
        if let Some((key, value)) = update.partial_result {
            self.partial_results.insert(key, value);
        }
    }
}

/// Partial update merged into [`ProcessingInfo`] by the queue.
#[derive(Debug, Clone, Default)]
pub struct ProcessingUpdate {
    pub chunking_applied: Option<bool>,
    pub chunks_processed: Option<u32>,
    pub total_chunks: Option<u32>,
    pub fallback_strategy: Option<String>,
    pub partial_result: Option<(String, Value)>,
}

impl ProcessingUpdate {
    /// Mark the request as chunked with a known chunk count.
    pub fn chunking(total_chunks: u32) -> Self {
        Self {
            chunking_applied: Some(true),
            total_chunks: Some(total_chunks),
            ..Self::default()
        }
    }

    /// Record that `processed` chunks are now done.
    pub fn chunks_done(processed: u32) -> Self {
        Self { chunks_processed: Some(processed), ..Self::default() }
    }

    pub fn with_partial_result(mut self, key: impl Into<String>, value: Value) -> Self {
        self.partial_result = Some((key.into(), value));
        self
    }

    pub fn with_fallback_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.fallback_strategy = Some(strategy.into());
        self
    }
}

/// One unit of work tracked by the queue. Owned exclusively by
/// `RequestQueue`; callers mutate it only through queue methods.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedRequest {
    pub request_id: Uuid,
    /// Caller-defined label, e.g. "audio_transcribe" or "translate".
    pub request_type: String,
    /// Stored for callers building priority-aware scheduling; the queue
    /// itself dequeues in plain FIFO order.
    pub priority: u8,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on QUEUED -> PROCESSING.
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly once, on transition into a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only on FAILED.
    pub error_message: Option<String>,
    /// Opaque payload set on COMPLETED / PARTIAL_SUCCESS.
    pub result: Option<Value>,
    pub processing_info: ProcessingInfo,
}

impl QueuedRequest {
    pub(crate) fn new(request_type: &str, priority: u8) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request_type: request_type.to_string(),
            priority,
            status: RequestStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            result: None,
            processing_info: ProcessingInfo::default(),
        }
    }
}
