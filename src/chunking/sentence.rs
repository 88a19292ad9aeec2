//! Sentence segmentation with character offsets.
//!
//! Splits on sentence-ending punctuation (`.`, `!`, `?`), absorbing runs
//! of terminators so `??` or `!!!` never produce empty sentences. Offsets
//! are character positions into the original text.

/// One sentence with its character span in the source text.
#[derive(Debug, Clone)]
pub(crate) struct SentenceSpan {
    pub text: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// Segment `text` into sentence spans. Never drops non-whitespace content:
/// trailing text without a terminator becomes the final sentence.
pub(crate) fn sentence_spans(text: &str) -> Vec<SentenceSpan> {
    let mut spans = Vec::new();
    let mut buf = String::new();
    let mut start = 0usize;
    let mut end = 0usize;

    let mut chars = text.chars().enumerate().peekable();
    while let Some((i, ch)) = chars.next() {
        if buf.is_empty() {
            if ch.is_whitespace() {
                continue;
            }
            start = i;
        }
        buf.push(ch);
        if !ch.is_whitespace() {
            end = i + 1;
        }
        if is_terminator(ch) {
            // Absorb repeated terminators ("??", "!!!") into this sentence.
            while let Some(&(j, next)) = chars.peek() {
                if !is_terminator(next) {
                    break;
                }
                buf.push(next);
                end = j + 1;
                chars.next();
            }
            flush(&mut spans, &mut buf, start, end);
        }
    }
    flush(&mut spans, &mut buf, start, end);
    spans
}

fn flush(spans: &mut Vec<SentenceSpan>, buf: &mut String, start: usize, end: usize) {
    let trimmed = buf.trim_end();
    if !trimmed.is_empty() {
        spans.push(SentenceSpan { text: trimmed.to_string(), start, end });
    }
    buf.clear();
}
