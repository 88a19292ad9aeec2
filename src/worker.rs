//! Worker loop: dequeue requests, arbitrate GPU slots, chunk oversized
//! payloads, and drive the application's model invoker.
//!
//! The engine stays model-agnostic: the invoker resolves payloads and
//! runs inference; the worker owns ordering — acquire a slot only after
//! dequeue, release it before marking the request terminal.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunking::{ChunkStrategy, TextChunker};
use crate::queue::{ProcessingUpdate, QueuedRequest, RequestOutcome, RequestQueue};
use crate::resources::ResourceManager;
use crate::telemetry;

/// Which slot pool a request occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Real-time call processing.
    Streaming,
    /// Deferred file/batch processing.
    Batch,
}

impl Lane {
    fn name(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Batch => "batch",
        }
    }
}

/// Model invocation supplied by the application. The chunker and queue
/// never call a model directly.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Resolve the text payload for a dequeued request.
    async fn load_input(&self, request: &QueuedRequest) -> Result<String, String>;

    /// Run the model over one piece of text (the whole payload, or one
    /// chunk of it).
    async fn invoke(&self, text: &str, request_type: &str) -> Result<Value, String>;

    /// Route a request type to a slot pool.
    fn lane_for(&self, _request_type: &str) -> Lane {
        Lane::Batch
    }

    /// Chunking strategy for a request type.
    fn strategy_for(&self, request_type: &str) -> ChunkStrategy {
        ChunkStrategy::for_model(request_type)
    }
}

/// Spawn the worker loop. Returns a handle; cancel `shutdown` to stop it
/// after the in-flight request finishes.
pub fn spawn_worker(
    queue: Arc<RequestQueue>,
    resources: Arc<ResourceManager>,
    chunker: Arc<TextChunker>,
    invoker: Arc<dyn ModelInvoker>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        worker_loop(&queue, &resources, &chunker, invoker.as_ref(), shutdown).await;
    })
}

async fn worker_loop(
    queue: &RequestQueue,
    resources: &ResourceManager,
    chunker: &TextChunker,
    invoker: &dyn ModelInvoker,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("worker: shutdown signal received");
                break;
            }
            request = queue.get_next_request() => {
                execute_request(queue, resources, chunker, invoker, request).await;
            }
        }
    }
}

async fn execute_request(
    queue: &RequestQueue,
    resources: &ResourceManager,
    chunker: &TextChunker,
    invoker: &dyn ModelInvoker,
    request: QueuedRequest,
) {
    let id = request.request_id;
    let slot_key = id.to_string();
    let lane = invoker.lane_for(&request.request_type);

    let wait_start = std::time::Instant::now();
    let granted = match lane {
        Lane::Streaming => resources.acquire_streaming_gpu(&slot_key).await,
        Lane::Batch => resources.acquire_batch_gpu(&slot_key).await,
    };
    if !granted {
        queue.complete_request(
            id,
            RequestOutcome::Failure("gpu slot acquisition rejected".into()),
        );
        return;
    }
    telemetry::metrics::record_slot_wait(lane.name(), wait_start.elapsed().as_millis() as u64);

    let outcome = process(queue, chunker, invoker, &request).await;

    // Slot back before the terminal transition, so a completed request
    // can never still hold capacity.
    match lane {
        Lane::Streaming => resources.release_streaming_gpu(&slot_key),
        Lane::Batch => resources.release_batch_gpu(&slot_key),
    }
    queue.complete_request(id, outcome);
}

async fn process(
    queue: &RequestQueue,
    chunker: &TextChunker,
    invoker: &dyn ModelInvoker,
    request: &QueuedRequest,
) -> RequestOutcome {
    let text = match invoker.load_input(request).await {
        Ok(text) => text,
        Err(e) => return RequestOutcome::Failure(format!("input unavailable: {e}")),
    };

    let strategy = invoker.strategy_for(&request.request_type);
    if chunker.count_tokens(&text) <= strategy.config().max_tokens {
        return match invoker.invoke(&text, &request.request_type).await {
            Ok(value) => RequestOutcome::Success(value),
            Err(e) => RequestOutcome::Failure(e),
        };
    }

    let chunks = chunker.chunk_text(&text, strategy);
    if chunks.is_empty() {
        return RequestOutcome::Failure("empty payload after chunking".into());
    }
    telemetry::metrics::record_chunking(strategy.name(), chunks.len());
    queue.update_processing_info(request.request_id, ProcessingUpdate::chunking(chunks.len() as u32));
    tracing::debug!(
        request_id = %request.request_id,
        strategy = strategy.name(),
        chunks = chunks.len(),
        "processing chunked payload"
    );

    let mut results = Vec::with_capacity(chunks.len());
    let mut failed = 0usize;
    for chunk in &chunks {
        let key = format!("chunk_{}", chunk.chunk_id);
        match invoker.invoke(&chunk.text, &request.request_type).await {
            Ok(value) => {
                queue.update_processing_info(
                    request.request_id,
                    ProcessingUpdate::chunks_done(chunk.chunk_id as u32 + 1)
                        .with_partial_result(key, value.clone()),
                );
                results.push(value);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    request_id = %request.request_id,
                    chunk_id = chunk.chunk_id,
                    error = %e,
                    "chunk processing failed"
                );
                queue.update_processing_info(
                    request.request_id,
                    ProcessingUpdate::chunks_done(chunk.chunk_id as u32 + 1)
                        .with_partial_result(key, json!({ "error": e })),
                );
            }
        }
    }

    let assembled = json!({
        "chunks": results,
        "total_chunks": chunks.len(),
        "failed_chunks": failed,
    });
    if failed == 0 {
        RequestOutcome::Success(assembled)
    } else if failed == chunks.len() {
        RequestOutcome::Failure("all chunks failed".into())
    } else {
        RequestOutcome::Partial(assembled)
    }
}
