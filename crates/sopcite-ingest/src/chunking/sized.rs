//! Size-bounded splitting: greedy line accumulation under a character budget.

use std::ops::Range;

use sopcite_core::Chunk;

use super::Block;

/// Accumulates consecutive lines until the next one would overflow the budget.
///
/// Each line costs its character count plus one for the newline. A single
/// line longer than the budget is still accepted whole into an empty
/// accumulator; lines are never subdivided.
#[derive(Debug)]
pub struct LineAccumulator {
    max_chars: usize,
    span: Option<Range<usize>>,
    chars: usize,
}

impl LineAccumulator {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            span: None,
            chars: 0,
        }
    }

    /// Add the line at `index` (indices must be consecutive). Returns the
    /// span flushed to make room, if any.
    pub fn push(&mut self, index: usize, line: &str) -> Option<Range<usize>> {
        let cost = line.chars().count() + 1;
        let flushed = if self.span.is_some() && self.chars + cost > self.max_chars {
            self.flush()
        } else {
            None
        };

        match self.span.as_mut() {
            Some(span) => span.end = index + 1,
            None => self.span = Some(index..index + 1),
        }
        self.chars += cost;
        flushed
    }

    /// Take the accumulated span, leaving the accumulator empty.
    pub fn flush(&mut self) -> Option<Range<usize>> {
        self.chars = 0;
        self.span.take()
    }
}

/// Split a whole block into size-bounded chunks.
pub fn split_by_chars(block: &Block<'_>, max_chars: usize) -> Vec<Chunk> {
    split_range_by_chars(block, 0..block.lines.len(), max_chars)
}

/// Split the block-local line range `range` into size-bounded chunks.
pub(crate) fn split_range_by_chars(
    block: &Block<'_>,
    range: Range<usize>,
    max_chars: usize,
) -> Vec<Chunk> {
    let mut acc = LineAccumulator::new(max_chars);
    let mut chunks = Vec::new();

    for idx in range {
        if let Some(span) = acc.push(idx, &block.lines[idx]) {
            chunks.push(block.assemble(span, None));
        }
    }
    if let Some(span) = acc.flush() {
        chunks.push(block.assemble(span, None));
    }

    chunks
}
