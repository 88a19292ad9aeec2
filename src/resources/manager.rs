//! Admission control for streaming and batch GPU inference slots.

use serde::Serialize;

use super::pool::{PoolStatus, SlotPool};

/// Active request ids per pool, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRequestIds {
    pub streaming: Vec<String>,
    pub batch: Vec<String>,
}

/// Point-in-time snapshot of both pools.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub streaming: PoolStatus,
    pub batch: PoolStatus,
    pub active_request_ids: ActiveRequestIds,
}

/// Arbitrates access to two independently sized GPU slot pools: streaming
/// (real-time call processing) and batch (deferred file processing).
///
/// Acquisition suspends until a slot frees; there is no built-in timeout.
/// A caller wanting a bounded wait races the acquire against
/// `tokio::time::timeout` and, if it gave up but the acquire later
/// completed, must release the orphaned slot itself.
///
/// The manager does not enforce cross-pool exclusivity: holding the same
/// request id in both pools at once is a caller error.
pub struct ResourceManager {
    streaming: SlotPool,
    batch: SlotPool,
}

impl ResourceManager {
    /// Build a manager with fixed pool sizes. Zero is legal and means
    /// that pool never grants.
    pub fn new(max_streaming_slots: usize, max_batch_slots: usize) -> Self {
        tracing::info!(max_streaming_slots, max_batch_slots, "resource manager initialized");
        Self {
            streaming: SlotPool::new("streaming", max_streaming_slots),
            batch: SlotPool::new("batch", max_batch_slots),
        }
    }

    /// Acquire a streaming slot, suspending until one is free. Returns
    /// `false` immediately for an empty request id.
    pub async fn acquire_streaming_gpu(&self, request_id: &str) -> bool {
        self.streaming.acquire(request_id).await
    }

    /// Acquire a batch slot, suspending until one is free. Returns
    /// `false` immediately for an empty request id.
    pub async fn acquire_batch_gpu(&self, request_id: &str) -> bool {
        self.batch.acquire(request_id).await
    }

    /// Release a streaming slot. Unknown ids are a no-op.
    pub fn release_streaming_gpu(&self, request_id: &str) {
        self.streaming.release(request_id);
    }

    /// Release a batch slot. Unknown ids are a no-op.
    pub fn release_batch_gpu(&self, request_id: &str) {
        self.batch.release(request_id);
    }

    /// Request ids currently holding streaming slots.
    pub fn active_streaming_requests(&self) -> Vec<String> {
        self.streaming.active_ids()
    }

    /// Request ids currently holding batch slots.
    pub fn active_batch_requests(&self) -> Vec<String> {
        self.batch.active_ids()
    }

    /// Snapshot both pools for an observability sink.
    pub fn get_resource_status(&self) -> ResourceStatus {
        ResourceStatus {
            streaming: self.streaming.status(),
            batch: self.batch.status(),
            active_request_ids: ActiveRequestIds {
                streaming: self.streaming.active_ids(),
                batch: self.batch.active_ids(),
            },
        }
    }
}
