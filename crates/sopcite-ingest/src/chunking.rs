//! Section-aware chunking of SOP markdown.
//!
//! Headers (`#` to `####`) delimit blocks. Each block inherits the section
//! and subsection in force when it started, and is then split either by
//! numbered steps (Procedure blocks) or by a character budget (everything
//! else). Header lines themselves never land in a chunk.
//!
//! Section tracking:
//! - `#` sets the section from the classified header and clears the subsection
//! - `##` sets the subsection verbatim, and the section only when the header
//!   classifies as something other than `Other`
//! - `###`/`####` only set the subsection

pub mod assemble;
pub mod filter;
pub mod procedure;
pub mod section;
pub mod sized;

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use sopcite_core::{Chunk, ChunkSettings, Document, Section};

pub use assemble::{assemble, chunk_id};
pub use filter::{is_useful, passes, retain_useful};
pub use procedure::split_procedure;
pub use section::classify;
pub use sized::{split_by_chars, LineAccumulator};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,4})\s+(.*)$").unwrap());

/// A parsed markdown header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub level: usize,
    /// Header text, trimmed.
    pub text: &'a str,
}

/// Parse a header line. Anything that doesn't match is body text.
pub fn parse_header(line: &str) -> Option<Header<'_>> {
    let caps = HEADER_RE.captures(line)?;
    let hashes = caps.get(1)?;
    let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some(Header {
        level: hashes.as_str().len(),
        text,
    })
}

/// A contiguous run of non-header lines under one header region.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub doc: &'a Document,
    pub section: Section,
    pub subsection: Option<&'a str>,
    /// 0-based document index of `lines[0]`.
    pub start: usize,
    pub lines: &'a [String],
}

impl<'a> Block<'a> {
    /// 0-based, half-open document line range.
    pub fn line_range(&self) -> Range<usize> {
        self.start..self.start + self.lines.len()
    }

    /// Assemble the block-local line span `local` into a chunk.
    pub fn assemble(&self, local: Range<usize>, steps: Option<(u64, u64)>) -> Chunk {
        assemble(
            self.doc,
            self.section,
            self.subsection,
            self.start + local.start,
            &self.lines[local],
            steps,
        )
    }
}

/// Walk the document and cut it into header-delimited blocks.
///
/// Empty regions (two headers in a row) produce no block. A document with no
/// headers is a single `Other` block.
pub fn segment(doc: &Document) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut section = Section::Other;
    let mut subsection: Option<&str> = None;
    let mut block_start = 0;

    for (idx, line) in doc.lines.iter().enumerate() {
        let Some(header) = parse_header(line) else {
            continue;
        };

        push_block(&mut blocks, doc, section, subsection, block_start..idx);

        let label = classify(header.text);
        match header.level {
            1 => {
                section = label;
                subsection = None;
            }
            2 => {
                if label != Section::Other {
                    section = label;
                }
                subsection = Some(header.text);
            }
            _ => subsection = Some(header.text),
        }
        block_start = idx + 1;
    }
    push_block(&mut blocks, doc, section, subsection, block_start..doc.lines.len());

    blocks
}

/// Flush a buffered region; empty regions are a no-op.
fn push_block<'a>(
    blocks: &mut Vec<Block<'a>>,
    doc: &'a Document,
    section: Section,
    subsection: Option<&'a str>,
    range: Range<usize>,
) {
    if range.is_empty() {
        return;
    }
    blocks.push(Block {
        doc,
        section,
        subsection,
        start: range.start,
        lines: &doc.lines[range],
    });
}

/// Route one block to the procedure or size-bounded splitter.
pub fn chunk_block(block: &Block<'_>, settings: &ChunkSettings) -> Vec<Chunk> {
    let chunks = if block.section == Section::Procedure {
        split_procedure(block, settings)
    } else {
        split_by_chars(block, settings.max_chars)
    };
    debug!(
        "{} L{}-L{} [{}]: {} chunks",
        block.doc.doc_id,
        block.start + 1,
        block.start + block.lines.len(),
        block.section,
        chunks.len()
    );
    chunks
}

/// Chunk one document. Deterministic: identical input and settings give
/// identical chunks and ids.
pub fn chunk_document(doc: &Document, settings: &ChunkSettings) -> Vec<Chunk> {
    segment(doc)
        .iter()
        .flat_map(|block| chunk_block(block, settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document {
            doc_id: "sop-tc-004".into(),
            title: "Counting cells".into(),
            source_path: "sop-tc-004-counting.md".into(),
            version: None,
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_header_levels() {
        assert_eq!(parse_header("# Title"), Some(Header { level: 1, text: "Title" }));
        assert_eq!(parse_header("####   Deep   "), Some(Header { level: 4, text: "Deep" }));
        assert_eq!(parse_header("## "), Some(Header { level: 2, text: "" }));
    }

    #[test]
    fn test_parse_header_rejects() {
        assert_eq!(parse_header("##### Too deep"), None);
        assert_eq!(parse_header("#hashtag"), None);
        assert_eq!(parse_header(" # indented"), None);
        assert_eq!(parse_header("plain text"), None);
    }

    #[test]
    fn test_no_headers_single_other_block() {
        let d = doc(&["one", "two", "three"]);
        let blocks = segment(&d);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].section, Section::Other);
        assert_eq!(blocks[0].line_range(), 0..3);
    }

    #[test]
    fn test_empty_regions_emit_nothing() {
        let d = doc(&["# Title", "## Purpose", "# Safety"]);
        assert!(segment(&d).is_empty());
        assert!(chunk_document(&d, &ChunkSettings::default()).is_empty());
    }

    #[test]
    fn test_section_tracking() {
        let d = doc(&[
            "# Counting cells", // 0
            "intro",            // 1
            "# Safety",         // 2
            "wear gloves",      // 3
            "## Notes",         // 4
            "still safety",     // 5
            "## Reagents",      // 6
            "trypan blue",      // 7
            "### Storage",      // 8
            "keep cold",        // 9
            "# Procedure",      // 10
            "1. count",         // 11
        ]);
        let blocks = segment(&d);
        let summary: Vec<(Section, Option<&str>, usize)> = blocks
            .iter()
            .map(|b| (b.section, b.subsection, b.start))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Section::Other, None, 1),
                (Section::Safety, None, 3),
                (Section::Safety, Some("Notes"), 5),
                (Section::Materials, Some("Reagents"), 7),
                (Section::Materials, Some("Storage"), 9),
                (Section::Procedure, None, 11),
            ]
        );
    }

    #[test]
    fn test_deep_header_never_changes_section() {
        let d = doc(&["# Safety", "a", "### Procedure", "b"]);
        let blocks = segment(&d);
        assert_eq!(blocks[1].section, Section::Safety);
        assert_eq!(blocks[1].subsection, Some("Procedure"));
    }

    #[test]
    fn test_routing_by_section() {
        let d = doc(&["# Purpose", "1. not a step here", "# Procedure", "1. a", "2. b"]);
        let chunks = chunk_document(&d, &ChunkSettings::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, Section::Purpose);
        assert_eq!(chunks[0].step_range(), None);
        assert_eq!(chunks[1].section, Section::Procedure);
        assert_eq!(chunks[1].step_range(), Some((1, 2)));
    }

    #[test]
    fn test_header_lines_excluded() {
        let d = doc(&["# Safety", "gloves", "## PPE", "coat"]);
        let chunks = chunk_document(&d, &ChunkSettings::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].line_start, chunks[0].line_end), (2, 2));
        assert_eq!((chunks[1].line_start, chunks[1].line_end), (4, 4));
        assert!(chunks.iter().all(|c| !c.text.contains('#')));
    }
}
