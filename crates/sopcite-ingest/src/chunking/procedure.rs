//! Procedure blocks: group numbered steps into step-count-bounded chunks.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use sopcite_core::{ChunkSettings, Chunk};

use super::sized::{split_by_chars, split_range_by_chars};
use super::Block;

/// `1)`, `2.`, `3:`, `4-`, with optional leading indent and required
/// whitespace after the marker.
static STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+)\s*[).:\-]\s+(.*)$").unwrap());

/// A numbered step found in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// The number as written in the source.
    pub number: u64,
    /// Block-local line index.
    pub line: usize,
}

/// Step number of a line, if it starts with a step marker.
pub fn parse_step(line: &str) -> Option<u64> {
    STEP_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn find_steps(lines: &[String]) -> Vec<Step> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line, text)| parse_step(text).map(|number| Step { number, line }))
        .collect()
}

/// Split a procedure block by numbered steps.
///
/// Each group of `procedure_steps_per_chunk` steps runs from its first step's
/// line up to the line before the next group's first step (or the block end).
/// Lines before the first step are split by size without a step range. A
/// block with no numbered steps falls back to size-based splitting.
pub fn split_procedure(block: &Block<'_>, settings: &ChunkSettings) -> Vec<Chunk> {
    let steps = find_steps(block.lines);

    let Some(first) = steps.first() else {
        debug!(
            "{}: no numbered steps in procedure block at line {}, splitting by size",
            block.doc.doc_id,
            block.start + 1
        );
        return split_by_chars(block, settings.max_chars);
    };

    if steps.windows(2).any(|w| w[1].number <= w[0].number) {
        debug!(
            "{}: non-monotonic step numbering at line {}, keeping literal numbers",
            block.doc.doc_id,
            block.start + 1
        );
    }

    let mut chunks = split_range_by_chars(block, 0..first.line, settings.max_chars);

    let per_chunk = settings.procedure_steps_per_chunk.max(1);
    let groups: Vec<&[Step]> = steps.chunks(per_chunk).collect();
    for (i, group) in groups.iter().enumerate() {
        let (head, tail) = (group[0], group[group.len() - 1]);
        let end = groups
            .get(i + 1)
            .map(|next| next[0].line)
            .unwrap_or(block.lines.len());
        chunks.push(block.assemble(head.line..end, Some((head.number, tail.number))));
    }

    chunks
}
