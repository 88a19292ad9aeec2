//! Bounded request queue with per-request status tracking.
//!
//! Admission is a hard rejection when full (backpressure signal), while
//! dequeue is a cooperative suspension on `Notify` — the same
//! mutex-plus-notify shape used for the worker hand-off throughout the
//! runtime.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::telemetry;

use super::metrics::{ChunkingStats, QueueMetrics};
use super::request::{
    ProcessingInfo, ProcessingUpdate, QueuedRequest, RequestStatus, DEFAULT_PRIORITY,
};

/// Queue admission errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("request queue is full: {current}/{max} pending")]
    QueueFull { current: usize, max: usize },
}

/// Terminal classification chosen by the worker.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// All work succeeded.
    Success(Value),
    /// Some chunks/sub-tasks succeeded; carries whatever was assembled.
    Partial(Value),
    /// Nothing usable; carries the error message.
    Failure(String),
}

/// Chunking progress block in a status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkingSnapshot {
    pub chunking_applied: bool,
    pub chunks_processed: u32,
    pub total_chunks: u32,
    pub progress_percent: f64,
    pub fallback_strategies_used: Vec<String>,
}

/// Point-in-time view of one request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusSnapshot {
    pub request_id: Uuid,
    pub request_type: String,
    pub priority: u8,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<Value>,
    /// 1-based position among still-queued requests; only for QUEUED.
    pub queue_position: Option<usize>,
    /// Only for PROCESSING, derived from historical averages and, when
    /// chunking, observed per-chunk throughput.
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Only for requests that went through the chunker.
    pub chunking_info: Option<ChunkingSnapshot>,
}

/// Aggregate operational view of the queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusSnapshot {
    pub queue_size: usize,
    pub max_queue_size: usize,
    pub processing_count: usize,
    pub total_requests: usize,
    pub metrics: QueueMetrics,
    pub chunking_stats: ChunkingStats,
}

/// Bounded FIFO admission queue with partial-success tracking.
pub struct RequestQueue {
    max_size: usize,
    /// FIFO of still-queued request ids.
    pending: Mutex<VecDeque<Uuid>>,
    /// Full history, retained after completion for status queries.
    requests: DashMap<Uuid, QueuedRequest>,
    /// Ids currently held by workers.
    processing: Mutex<HashSet<Uuid>>,
    metrics: Mutex<QueueMetrics>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            pending: Mutex::new(VecDeque::new()),
            requests: DashMap::new(),
            processing: Mutex::new(HashSet::new()),
            metrics: Mutex::new(QueueMetrics::default()),
            notify: Notify::new(),
        }
    }

    /// Admit a request at the default priority.
    pub fn add_request(&self, request_type: &str) -> Result<Uuid, QueueError> {
        self.add_request_with_priority(request_type, DEFAULT_PRIORITY)
    }

    /// Admit a request, rejecting hard when the queue is at capacity.
    pub fn add_request_with_priority(
        &self,
        request_type: &str,
        priority: u8,
    ) -> Result<Uuid, QueueError> {
        let depth;
        let request = QueuedRequest::new(request_type, priority);
        let id = request.request_id;
        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.max_size {
                return Err(QueueError::QueueFull {
                    current: pending.len(),
                    max: self.max_size,
                });
            }
            self.requests.insert(id, request);
            pending.push_back(id);
            depth = pending.len();
        }
        telemetry::metrics::record_queue_depth(depth);
        tracing::debug!(request_id = %id, request_type, priority, "request queued");
        self.notify.notify_one();
        Ok(id)
    }

    /// Suspend until a request is available, transition it to PROCESSING,
    /// stamp `started_at`, and return a copy of the record.
    ///
    /// Requests cancelled while still queued are skipped here.
    pub async fn get_next_request(&self) -> QueuedRequest {
        loop {
            let popped = {
                let mut pending = self.pending.lock();
                let id = pending.pop_front();
                // Notify permits coalesce; if work remains after this pop,
                // pass the wakeup on so another idle worker picks it up.
                if id.is_some() && !pending.is_empty() {
                    self.notify.notify_one();
                }
                id
            };
            let Some(id) = popped else {
                self.notify.notified().await;
                continue;
            };
            let snapshot = {
                let Some(mut entry) = self.requests.get_mut(&id) else {
                    continue; // cleaned up while queued
                };
                if entry.status != RequestStatus::Queued {
                    continue; // cancelled while queued
                }
                entry.status = RequestStatus::Processing;
                entry.started_at = Some(Utc::now());
                entry.clone()
            };
            self.processing.lock().insert(id);
            tracing::debug!(request_id = %id, "request dequeued for processing");
            return snapshot;
        }
    }

    /// Merge chunking/fallback progress into a live request. Unknown or
    /// already-terminal ids are a no-op.
    pub fn update_processing_info(&self, request_id: Uuid, update: ProcessingUpdate) {
        if let Some(mut entry) = self.requests.get_mut(&request_id) {
            if !entry.status.is_terminal() {
                entry.processing_info.apply(update);
            }
        }
    }

    /// Terminal transition. Chooses FAILED / PARTIAL_SUCCESS / COMPLETED
    /// from the outcome, stamps `completed_at`, and updates aggregate
    /// metrics. Returns `false` for unknown or already-terminal ids.
    ///
    /// Completing a still-QUEUED request with a failure acts as
    /// cooperative cancellation: the worker will skip it on dequeue.
    pub fn complete_request(&self, request_id: Uuid, outcome: RequestOutcome) -> bool {
        let now = Utc::now();
        let (status, was_queued, processing_secs, chunking_applied, request_type) = {
            let Some(mut entry) = self.requests.get_mut(&request_id) else {
                return false;
            };
            if entry.status.is_terminal() {
                return false;
            }
            let was_queued = entry.status == RequestStatus::Queued;
            match outcome {
                RequestOutcome::Failure(message) => {
                    entry.status = RequestStatus::Failed;
                    entry.error_message = Some(message);
                }
                RequestOutcome::Partial(result) => {
                    entry.status = RequestStatus::PartialSuccess;
                    entry.result = Some(result);
                }
                RequestOutcome::Success(result) => {
                    entry.status = RequestStatus::Completed;
                    entry.result = Some(result);
                }
            }
            entry.completed_at = Some(now);
            let secs = entry
                .started_at
                .map(|s| (now - s).num_milliseconds() as f64 / 1000.0)
                .unwrap_or(0.0);
            (
                entry.status,
                was_queued,
                secs,
                entry.processing_info.chunking_applied,
                entry.request_type.clone(),
            )
        };

        if was_queued {
            self.pending.lock().retain(|id| id != &request_id);
        } else {
            self.processing.lock().remove(&request_id);
        }
        self.metrics
            .lock()
            .record_outcome(status, processing_secs, chunking_applied);

        match status {
            RequestStatus::Completed | RequestStatus::PartialSuccess => {
                telemetry::metrics::record_request_success(
                    &request_type,
                    (processing_secs * 1000.0) as u64,
                );
            }
            _ => telemetry::metrics::record_request_failure(&request_type, "failed"),
        }
        tracing::info!(
            request_id = %request_id,
            request_type,
            status = ?status,
            processing_secs,
            "request completed"
        );
        true
    }

    /// Status snapshot for one request; `None` for unknown ids (which
    /// race benignly against cleanup).
    pub fn get_request_status(&self, request_id: Uuid) -> Option<RequestStatusSnapshot> {
        let entry = self.requests.get(&request_id)?;
        let request = entry.clone();
        drop(entry);

        let queue_position = (request.status == RequestStatus::Queued)
            .then(|| self.queue_position(request.created_at));
        let estimated_completion = (request.status == RequestStatus::Processing)
            .then(|| self.estimate_completion(&request))
            .flatten();
        let chunking_info = request
            .processing_info
            .chunking_applied
            .then(|| chunking_snapshot(&request.processing_info));

        Some(RequestStatusSnapshot {
            request_id: request.request_id,
            request_type: request.request_type,
            priority: request.priority,
            status: request.status,
            created_at: request.created_at,
            started_at: request.started_at,
            completed_at: request.completed_at,
            error_message: request.error_message,
            result: request.result,
            queue_position,
            estimated_completion,
            chunking_info,
        })
    }

    /// Aggregate queue status for an observability sink.
    pub fn get_queue_status(&self) -> QueueStatusSnapshot {
        let metrics = self.metrics.lock().clone();
        QueueStatusSnapshot {
            queue_size: self.pending.lock().len(),
            max_queue_size: self.max_size,
            processing_count: self.processing.lock().len(),
            total_requests: self.requests.len(),
            chunking_stats: ChunkingStats::from_metrics(&metrics),
            metrics,
        }
    }

    /// Purge terminal requests completed before the cutoff. QUEUED and
    /// PROCESSING requests are never removed, regardless of age.
    pub fn cleanup_old_requests(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let stale: Vec<Uuid> = self
            .requests
            .iter()
            .filter(|r| r.status.is_terminal() && r.completed_at.map_or(false, |t| t < cutoff))
            .map(|r| r.request_id)
            .collect();
        for id in &stale {
            self.requests.remove(id);
        }
        if !stale.is_empty() {
            tracing::info!(removed = stale.len(), "cleaned up old requests");
        }
        stale.len()
    }

    /// Mark PROCESSING requests older than `max_secs` as TIMEOUT.
    /// Cooperative: the worker driving such a request is responsible for
    /// noticing and abandoning it.
    pub fn fail_stale_processing(&self, max_secs: i64) -> usize {
        let now = Utc::now();
        let in_flight: Vec<Uuid> = self.processing.lock().iter().copied().collect();
        let stale: Vec<Uuid> = in_flight
            .into_iter()
            .filter(|id| {
                self.requests.get(id).map_or(false, |r| {
                    r.started_at
                        .map_or(false, |s| (now - s).num_seconds() > max_secs)
                })
            })
            .collect();

        let mut swept = 0;
        for id in stale {
            let (secs, chunking_applied, request_type) = {
                let Some(mut entry) = self.requests.get_mut(&id) else {
                    continue;
                };
                if entry.status != RequestStatus::Processing {
                    continue;
                }
                entry.status = RequestStatus::Timeout;
                entry.completed_at = Some(now);
                let secs = entry
                    .started_at
                    .map(|s| (now - s).num_milliseconds() as f64 / 1000.0)
                    .unwrap_or(0.0);
                (secs, entry.processing_info.chunking_applied, entry.request_type.clone())
            };
            self.processing.lock().remove(&id);
            self.metrics
                .lock()
                .record_outcome(RequestStatus::Timeout, secs, chunking_applied);
            telemetry::metrics::record_request_failure(&request_type, "timeout");
            tracing::warn!(request_id = %id, "stale processing request timed out");
            swept += 1;
        }
        swept
    }

    /// 1-based queue position: queued requests created at or before
    /// `created_at`, including the request itself.
    fn queue_position(&self, created_at: DateTime<Utc>) -> usize {
        self.requests
            .iter()
            .filter(|r| r.status == RequestStatus::Queued && r.created_at <= created_at)
            .count()
    }

    /// ETA for a PROCESSING request: per-chunk throughput when chunk
    /// progress is known, otherwise the historical average.
    fn estimate_completion(&self, request: &QueuedRequest) -> Option<DateTime<Utc>> {
        let started = request.started_at?;
        let info = &request.processing_info;
        let now = Utc::now();

        if info.total_chunks > 0 && info.chunks_processed > 0 {
            let elapsed_ms = (now - started).num_milliseconds().max(0) as f64;
            let per_chunk_ms = elapsed_ms / info.chunks_processed as f64;
            let remaining = info.total_chunks.saturating_sub(info.chunks_processed) as f64;
            return Some(now + Duration::milliseconds((per_chunk_ms * remaining) as i64));
        }

        let avg_secs = self.metrics.lock().average_processing_time_secs;
        if avg_secs > 0.0 {
            Some(started + Duration::milliseconds((avg_secs * 1000.0) as i64))
        } else {
            None
        }
    }
}

fn chunking_snapshot(info: &ProcessingInfo) -> ChunkingSnapshot {
    ChunkingSnapshot {
        chunking_applied: info.chunking_applied,
        chunks_processed: info.chunks_processed,
        total_chunks: info.total_chunks,
        progress_percent: info.progress_percent(),
        fallback_strategies_used: info.fallback_strategies_used.clone(),
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
