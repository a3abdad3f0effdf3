//! Post-hoc rejection of passages too small to retrieve on.
//!
//! Typical rejects are header-only remnants such as a restated title with no
//! body, which carry no signal and crowd the index.

use sopcite_core::{Chunk, QualityThresholds};

/// Keep chunks whose trimmed text has at least `min_chars` characters and
/// `min_words` whitespace-separated words.
pub fn passes(chunk: &Chunk, thresholds: &QualityThresholds) -> bool {
    let text = chunk.text.trim();
    text.chars().count() >= thresholds.min_chars
        && text.split_whitespace().count() >= thresholds.min_words
}

/// `passes` with the default thresholds (80 chars, 12 words).
pub fn is_useful(chunk: &Chunk) -> bool {
    passes(chunk, &QualityThresholds::default())
}

/// Split `chunks` into retained chunks and the number dropped.
pub fn retain_useful(chunks: Vec<Chunk>, thresholds: &QualityThresholds) -> (Vec<Chunk>, usize) {
    let before = chunks.len();
    let kept: Vec<Chunk> = chunks.into_iter().filter(|c| passes(c, thresholds)).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
