//! Chunking strategies and per-strategy policy.
//!
//! Each downstream consumer (translation, classification, summarization,
//! NER) gets its own token budget reflecting the model's context window
//! and its sensitivity to fragmentation.

use serde::Serialize;
use thiserror::Error;

/// Errors from chunking configuration and strategy lookup.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid chunk config: {0}")]
    InvalidConfig(String),
}

/// Named chunking strategy, one per downstream consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Translation,
    Classification,
    Summarization,
    Ner,
}

impl ChunkStrategy {
    /// All registered strategies.
    pub const ALL: [ChunkStrategy; 4] = [
        Self::Translation,
        Self::Classification,
        Self::Summarization,
        Self::Ner,
    ];

    /// Strict lookup by strategy name. Unknown names are an error.
    pub fn from_name(name: &str) -> Result<Self, ChunkError> {
        match name {
            "translation" => Ok(Self::Translation),
            "classification" => Ok(Self::Classification),
            "summarization" => Ok(Self::Summarization),
            "ner" => Ok(Self::Ner),
            other => Err(ChunkError::UnknownStrategy(other.to_string())),
        }
    }

    /// Lenient mapping from a model identifier. Unrecognized model names
    /// fall back to `Classification`, the safest (smallest-chunk) default.
    pub fn for_model(model_name: &str) -> Self {
        let name = model_name.to_ascii_lowercase();
        if name.contains("translat") || name.contains("nllb") {
            Self::Translation
        } else if name.contains("summar") {
            Self::Summarization
        } else if name.contains("ner") || name.contains("entity") || name.contains("spacy") {
            Self::Ner
        } else {
            Self::Classification
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Classification => "classification",
            Self::Summarization => "summarization",
            Self::Ner => "ner",
        }
    }

    /// The registered policy for this strategy.
    pub fn config(&self) -> ChunkConfig {
        match self {
            // Translation models choke on long inputs; moderate chunks
            // with generous overlap to keep phrasing consistent.
            Self::Translation => ChunkConfig::new(400, 50, 50),
            // Classifiers tolerate fragmentation.
            Self::Classification => ChunkConfig::new(450, 30, 40),
            // Summarization wants large chunks to preserve narrative flow.
            Self::Summarization => ChunkConfig::new(900, 100, 120),
            // NER works on local context; small chunks are fine.
            Self::Ner => ChunkConfig::new(350, 40, 30),
        }
    }
}

/// Immutable chunking policy for one consumer strategy.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChunkConfig {
    /// Hard token cap per chunk.
    pub max_tokens: usize,
    /// Tokens of trailing context duplicated into the next chunk.
    pub overlap_tokens: usize,
    /// Chunks below this are merged forward rather than emitted standalone.
    pub min_chunk_tokens: usize,
    /// Never split mid-sentence unless a single sentence exceeds the cap.
    pub preserve_sentences: bool,
    /// Prefer paragraph boundaries when accumulating sentences.
    pub preserve_paragraphs: bool,
}

impl ChunkConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize, min_chunk_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            min_chunk_tokens,
            preserve_sentences: true,
            preserve_paragraphs: true,
        }
    }

    /// Validate the policy invariants: overlap and minimum chunk size
    /// must both be strictly below the cap.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_tokens == 0 {
            return Err(ChunkError::InvalidConfig("max_tokens must be > 0".into()));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap_tokens ({}) must be < max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        if self.min_chunk_tokens >= self.max_tokens {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_tokens ({}) must be < max_tokens ({})",
                self.min_chunk_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}
