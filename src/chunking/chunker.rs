//! Adaptive text chunker for token-budgeted model inference.
//!
//! Splits long call transcripts into ordered, sentence-preserving chunks
//! sized for a consumer strategy's token budget, with whole-sentence
//! overlap carried across chunk boundaries for context continuity.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::config::{ChunkConfig, ChunkError, ChunkStrategy};
use super::sentence::{sentence_spans, SentenceSpan};

/// Swappable approximate token counter. The default is a word-count
/// heuristic; an exact tokenizer can be wired in without touching the
/// chunking algorithm.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// One bounded, sentence-respecting slice of a longer text.
#[derive(Debug, Clone, Serialize)]
pub struct TextChunk {
    /// Trimmed chunk content, including any leading overlap sentences.
    pub text: String,
    /// Character offset of the chunk's first sentence in the source text.
    pub start_pos: usize,
    /// Character offset one past the chunk's last sentence.
    pub end_pos: usize,
    /// 0-based sequential index, unique within one chunking call.
    pub chunk_id: usize,
    pub token_count: usize,
    pub sentence_count: usize,
    pub overlap_with_previous: bool,
    pub overlap_with_next: bool,
}

/// Working unit during assembly: a whole sentence, or a word-boundary
/// fragment of a sentence that exceeded the budget on its own.
#[derive(Debug, Clone)]
struct Unit {
    text: String,
    start: usize,
    end: usize,
    tokens: usize,
    fragment: bool,
}

/// Default heuristic: roughly 4 tokens per 3 words. Monotonic in word
/// count, which is all the budgeting logic relies on.
fn approx_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4 + 2) / 3
}

/// Strategy-tuned text chunker.
pub struct TextChunker {
    counter: TokenCounter,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChunker").finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Chunker with the default word-count token heuristic.
    pub fn new() -> Self {
        Self { counter: Arc::new(approx_token_count) }
    }

    /// Chunker with a caller-supplied token counter.
    pub fn with_counter(counter: TokenCounter) -> Self {
        Self { counter }
    }

    /// Approximate token count for budgeting. More words never yields
    /// fewer tokens.
    pub fn count_tokens(&self, text: &str) -> usize {
        (self.counter)(text)
    }

    /// Split on sentence-ending punctuation, preserving all non-whitespace
    /// content. Repeated terminators never produce empty sentences.
    pub fn split_into_sentences(&self, text: &str) -> Vec<String> {
        sentence_spans(text).into_iter().map(|s| s.text).collect()
    }

    /// Chunk `text` for the given strategy. Empty or whitespace-only input
    /// yields an empty sequence.
    pub fn chunk_text(&self, text: &str, strategy: ChunkStrategy) -> Vec<TextChunk> {
        let config = strategy.config();
        let spans = sentence_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let mut units = Vec::new();
        for span in &spans {
            let tokens = (self.counter)(&span.text);
            if tokens > config.max_tokens {
                units.extend(self.split_long_sentence(span, config.max_tokens));
            } else {
                units.push(Unit {
                    text: span.text.clone(),
                    start: span.start,
                    end: span.end,
                    tokens,
                    fragment: false,
                });
            }
        }

        let chunks = assemble(&units, &config);
        tracing::debug!(
            strategy = strategy.name(),
            sentences = spans.len(),
            chunks = chunks.len(),
            "chunked text"
        );
        chunks
    }

    /// Strict-mode entry point: resolves a strategy name first, failing on
    /// unknown names instead of silently defaulting.
    pub fn chunk_text_by_name(&self, text: &str, strategy: &str) -> Result<Vec<TextChunk>, ChunkError> {
        Ok(self.chunk_text(text, ChunkStrategy::from_name(strategy)?))
    }

    /// Rough wall-clock estimate for processing `chunks` under a strategy.
    /// Monotonic in chunk count and token volume; UX only, not a guarantee.
    pub fn estimate_processing_time(&self, chunks: &[TextChunk], strategy: ChunkStrategy) -> f64 {
        let (per_chunk, per_token) = match strategy {
            ChunkStrategy::Translation => (0.8, 0.010),
            ChunkStrategy::Classification => (0.3, 0.002),
            ChunkStrategy::Summarization => (1.5, 0.015),
            ChunkStrategy::Ner => (0.4, 0.003),
        };
        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        chunks.len() as f64 * per_chunk + total_tokens as f64 * per_token
    }

    /// Split one over-budget sentence at word boundaries. Every fragment
    /// respects the cap unless a single word alone exceeds it, in which
    /// case the word is emitted as its own fragment.
    fn split_long_sentence(&self, span: &SentenceSpan, max_tokens: usize) -> Vec<Unit> {
        let words = word_spans(span);
        let mut units = Vec::new();
        let mut piece = String::new();
        let mut pstart = span.start;
        let mut pend = span.start;

        for (word, wstart, wend) in words {
            let candidate = if piece.is_empty() {
                word.clone()
            } else {
                format!("{piece} {word}")
            };
            if !piece.is_empty() && (self.counter)(&candidate) > max_tokens {
                let tokens = (self.counter)(&piece);
                units.push(Unit { text: piece, start: pstart, end: pend, tokens, fragment: true });
                piece = word;
                pstart = wstart;
            } else {
                if piece.is_empty() {
                    pstart = wstart;
                }
                piece = candidate;
            }
            pend = wend;
        }
        if !piece.is_empty() {
            let tokens = (self.counter)(&piece);
            units.push(Unit { text: piece, start: pstart, end: pend, tokens, fragment: true });
        }
        units
    }
}

/// Word spans within a sentence, as (word, start, end) character offsets
/// into the original text.
fn word_spans(span: &SentenceSpan) -> Vec<(String, usize, usize)> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut wstart = 0usize;
    let mut wend = 0usize;
    for (k, ch) in span.text.chars().enumerate() {
        if ch.is_whitespace() {
            if !cur.is_empty() {
                words.push((std::mem::take(&mut cur), span.start + wstart, span.start + wend));
            }
        } else {
            if cur.is_empty() {
                wstart = k;
            }
            cur.push(ch);
            wend = k + 1;
        }
    }
    if !cur.is_empty() {
        words.push((cur, span.start + wstart, span.start + wend));
    }
    words
}

/// Greedy accumulation of units into chunks: close the current chunk when
/// the next unit would exceed the budget, absorbing one extra sentence
/// instead of emitting a chunk below `min_chunk_tokens`, and seed each new
/// chunk with whole-sentence overlap from the previous one.
fn assemble(units: &[Unit], config: &ChunkConfig) -> Vec<TextChunk> {
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut cur: Vec<Unit> = Vec::new();
    let mut overlap_len = 0usize;
    let mut cur_tokens = 0usize;

    let mut i = 0;
    while i < units.len() {
        let unit = &units[i];
        let over_budget = cur_tokens + unit.tokens > config.max_tokens;
        let has_core = cur.len() > overlap_len;

        if over_budget && has_core {
            if cur_tokens < config.min_chunk_tokens {
                // Closing now would emit a degenerate tiny chunk; absorb
                // one more sentence even though it puts us over budget.
                cur_tokens += unit.tokens;
                cur.push(unit.clone());
                i += 1;
                let seed_next = i < units.len();
                emit_chunk(&mut chunks, &mut cur, &mut overlap_len, &mut cur_tokens, config, seed_next);
                continue;
            }
            emit_chunk(&mut chunks, &mut cur, &mut overlap_len, &mut cur_tokens, config, true);
            continue; // re-examine this unit against the seeded chunk
        }

        if over_budget && !has_core && !cur.is_empty() {
            // Only the overlap seed stands between this unit and the cap;
            // overlap is best-effort context and must never push a chunk
            // over budget, so drop the seed and start the unit clean.
            if let Some(prev) = chunks.last_mut() {
                prev.overlap_with_next = false;
            }
            cur.clear();
            overlap_len = 0;
            cur_tokens = 0;
        }

        cur_tokens += unit.tokens;
        cur.push(unit.clone());
        i += 1;
    }

    if cur.len() > overlap_len {
        emit_chunk(&mut chunks, &mut cur, &mut overlap_len, &mut cur_tokens, config, false);
    }
    chunks
}

fn emit_chunk(
    chunks: &mut Vec<TextChunk>,
    cur: &mut Vec<Unit>,
    overlap_len: &mut usize,
    cur_tokens: &mut usize,
    config: &ChunkConfig,
    seed_next: bool,
) {
    let (Some(first), Some(last)) = (cur.first(), cur.last()) else {
        return;
    };
    let text = cur.iter().map(|u| u.text.as_str()).collect::<Vec<_>>().join(" ");
    chunks.push(TextChunk {
        text,
        start_pos: first.start,
        end_pos: last.end,
        chunk_id: chunks.len(),
        token_count: *cur_tokens,
        sentence_count: cur.len(),
        overlap_with_previous: *overlap_len > 0,
        overlap_with_next: false,
    });

    // Whole trailing sentences only; fragments never cross a boundary,
    // and the seed must not swallow the entire chunk.
    let mut seed: Vec<Unit> = Vec::new();
    let mut seed_tokens = 0usize;
    if seed_next && config.overlap_tokens > 0 {
        for unit in cur.iter().rev() {
            if unit.fragment
                || seed.len() + 1 >= cur.len()
                || seed_tokens + unit.tokens > config.overlap_tokens
            {
                break;
            }
            seed_tokens += unit.tokens;
            seed.push(unit.clone());
        }
        seed.reverse();
    }

    if !seed.is_empty() {
        if let Some(prev) = chunks.last_mut() {
            prev.overlap_with_next = true;
        }
    }
    *overlap_len = seed.len();
    *cur_tokens = seed_tokens;
    *cur = seed;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_inputs_yield_no_chunks() {
        let chunker = TextChunker::new();
        for strategy in ChunkStrategy::ALL {
            assert!(chunker.chunk_text("", strategy).is_empty());
            assert!(chunker.chunk_text("   \n  ", strategy).is_empty());
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = TextChunker::new();
        let chunks = chunker.chunk_text("Hi. No. Yes. Maybe. OK.", ChunkStrategy::Classification);
        assert_eq!(chunks.len(), 1);
        let text = &chunks[0].text;
        for sentence in ["Hi.", "No.", "Yes.", "Maybe.", "OK."] {
            assert!(text.contains(sentence), "missing {sentence:?} in {text:?}");
        }
        assert_eq!(chunks[0].sentence_count, 5);
        assert!(!chunks[0].overlap_with_previous);
        assert!(!chunks[0].overlap_with_next);
    }

    #[test]
    fn long_single_sentence_is_split_at_word_boundaries() {
        let chunker = TextChunker::new();
        let max = ChunkStrategy::Classification.config().max_tokens;
        // 500 words, no punctuation: well past the cap.
        let text = words(500);
        let chunks = chunker.chunk_text(&text, ChunkStrategy::Classification);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= max, "chunk {} over cap", chunk.chunk_id);
        }
        // No silent data loss: every word survives, in order.
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.text.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn chunk_ids_are_sequential_and_offsets_ordered() {
        let chunker = TextChunker::new();
        let text = (0..60)
            .map(|i| format!("Sentence number {i} has a handful of words in it."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk_text(&text, ChunkStrategy::Translation);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i);
            assert!(chunk.start_pos < chunk.end_pos);
        }
    }

    #[test]
    fn overlap_flags_are_symmetric() {
        let chunker = TextChunker::new();
        let text = (0..80)
            .map(|i| format!("Caller described incident detail {i} during the call review."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk_text(&text, ChunkStrategy::Translation);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].overlap_with_next, pair[1].overlap_with_previous);
        }
        // Translation config has a positive overlap budget, so interior
        // boundaries share content.
        assert!(chunks[0].overlap_with_next);
    }

    #[test]
    fn all_sentences_are_covered_in_order() {
        let chunker = TextChunker::new();
        let sentences: Vec<String> = (0..50)
            .map(|i| format!("Unique marker sentence {i} appears exactly here."))
            .collect();
        let text = sentences.join(" ");
        let chunks = chunker.chunk_text(&text, ChunkStrategy::Ner);
        let combined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        let mut cursor = 0;
        for sentence in &sentences {
            let found = combined[cursor..].find(sentence.as_str());
            assert!(found.is_some(), "sentence not covered: {sentence}");
            cursor += found.unwrap_or(0);
        }
    }

    #[test]
    fn token_budget_is_respected_for_sentence_input() {
        let chunker = TextChunker::new();
        for strategy in ChunkStrategy::ALL {
            let max = strategy.config().max_tokens;
            let text = (0..120)
                .map(|i| format!("Short sentence {i} with several plain words here."))
                .collect::<Vec<_>>()
                .join(" ");
            for chunk in chunker.chunk_text(&text, strategy) {
                assert!(chunk.token_count <= max, "{}: {} > {max}", strategy.name(), chunk.token_count);
            }
        }
    }

    #[test]
    fn overlap_seed_never_pushes_a_chunk_past_the_cap() {
        let chunker = TextChunker::new();
        let max = ChunkStrategy::Translation.config().max_tokens;
        // Ten 30-word sentences fill a chunk to the cap exactly, then a
        // near-cap 290-word sentence lands on the fresh overlap seed.
        let mut text = (0..10).map(|_| format!("{}.", words(30))).collect::<Vec<_>>().join(" ");
        text.push(' ');
        text.push_str(&format!("{}.", words(290)));

        let chunks = chunker.chunk_text(&text, ChunkStrategy::Translation);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.token_count <= max,
                "chunk {} has {} tokens, cap {max}",
                chunk.chunk_id,
                chunk.token_count
            );
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].overlap_with_next, pair[1].overlap_with_previous);
        }
    }

    #[test]
    fn unknown_strategy_name_is_an_error() {
        let chunker = TextChunker::new();
        assert!(chunker.chunk_text_by_name("Some text.", "sentiment").is_err());
        assert!(chunker.chunk_text_by_name("Some text.", "ner").is_ok());
    }

    #[test]
    fn custom_counter_is_used() {
        let chunker = TextChunker::with_counter(Arc::new(|text: &str| text.chars().count()));
        assert_eq!(chunker.count_tokens("abcde"), 5);
    }

    #[test]
    fn estimate_is_monotonic_in_chunk_count() {
        let chunker = TextChunker::new();
        let text = (0..100)
            .map(|i| format!("Sentence {i} for the estimator with some words."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk_text(&text, ChunkStrategy::Translation);
        assert!(chunks.len() > 1);
        let all = chunker.estimate_processing_time(&chunks, ChunkStrategy::Translation);
        let some = chunker.estimate_processing_time(&chunks[..1], ChunkStrategy::Translation);
        assert!(all > some);
        assert!(some > 0.0);
    }
}
