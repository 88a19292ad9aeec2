//! Helpline call-processing core engine.
//!
//! Arbitrates scarce GPU inference capacity between streaming (live call)
//! and batch (file upload) workloads, tracks queued work with
//! partial-success semantics, and chunks long transcripts to fit
//! downstream model token budgets.
//!
//! The crate is a library composed by an external worker/API layer:
//! construct one [`ResourceManager`] and one [`RequestQueue`] per
//! application context and pass references to workers. There is no
//! global state.
//!
//! # Composition
//!
//! An inbound request is admitted via [`RequestQueue::add_request`]
//! (hard rejection when full), pulled by a worker via
//! [`RequestQueue::get_next_request`], which then acquires a streaming
//! or batch slot from [`ResourceManager`] before touching any model.
//! Payloads over the model's token budget go through [`TextChunker`],
//! with chunk progress reported back into the queue. [`worker`] wires
//! this flow up for applications that don't need a custom loop.

pub mod chunking;
pub mod config;
pub mod queue;
pub mod resources;
pub mod telemetry;
pub mod worker;

pub use chunking::{ChunkConfig, ChunkError, ChunkStrategy, TextChunk, TextChunker};
pub use queue::{
    ProcessingInfo, ProcessingUpdate, QueueError, QueuedRequest, RequestOutcome, RequestQueue,
    RequestStatus,
};
pub use resources::{PoolStatus, ResourceManager, ResourceStatus};
pub use worker::{spawn_worker, Lane, ModelInvoker};
