//! Adaptive, strategy-tuned text chunking.
//!
//! Keeps long call transcripts within downstream model token budgets while
//! preserving sentence boundaries and carrying overlap context across
//! chunk boundaries.

mod chunker;
mod config;
mod sentence;

pub use chunker::{TextChunk, TextChunker, TokenCounter};
pub use config::{ChunkConfig, ChunkError, ChunkStrategy};
