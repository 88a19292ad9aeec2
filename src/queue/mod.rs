//! Bounded request queue with rich per-request status tracking,
//! partial-success semantics for chunked workloads, and aggregate metrics.

mod metrics;
#[allow(clippy::module_inception)]
mod queue;
mod request;

pub use metrics::{ChunkingStats, QueueMetrics};
pub use queue::{
    ChunkingSnapshot, QueueError, QueueStatusSnapshot, RequestOutcome, RequestQueue,
    RequestStatusSnapshot,
};
pub use request::{
    ProcessingInfo, ProcessingUpdate, QueuedRequest, RequestStatus, DEFAULT_PRIORITY,
};
