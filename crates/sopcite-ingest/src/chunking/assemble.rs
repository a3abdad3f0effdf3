//! Materialize a provenance-tagged `Chunk` from a run of source lines.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use sopcite_core::{Chunk, Document, Section};

/// Separates identity fields inside the hashed byte stream.
const FIELD_SEP: u8 = 0x1f;

/// Deterministic chunk id from the fields that define a chunk's identity.
///
/// `line_start`/`line_end` are the 1-based values stored on the record, so
/// the id can be recomputed from any serialized chunk.
pub fn chunk_id(
    doc_id: &str,
    section: Section,
    subsection: Option<&str>,
    line_start: usize,
    line_end: usize,
) -> String {
    let start = line_start.to_string();
    let end = line_end.to_string();

    let mut hasher = Sha256::new();
    for field in [
        doc_id,
        section.as_str(),
        subsection.unwrap_or(""),
        start.as_str(),
        end.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([FIELD_SEP]);
    }
    hex::encode(&hasher.finalize()[..16])
}

/// Build a chunk from `raw_lines`, which start at 0-based line `first_line`
/// of `doc`. `raw_lines` must be non-empty.
pub fn assemble(
    doc: &Document,
    section: Section,
    subsection: Option<&str>,
    first_line: usize,
    raw_lines: &[String],
    steps: Option<(u64, u64)>,
) -> Chunk {
    debug_assert!(!raw_lines.is_empty());
    let line_start = first_line + 1;
    let line_end = first_line + raw_lines.len().max(1);

    Chunk {
        chunk_id: chunk_id(&doc.doc_id, section, subsection, line_start, line_end),
        doc_id: doc.doc_id.clone(),
        doc_title: doc.title.clone(),
        source_path: doc.source_path.clone(),
        version: doc.version.clone(),
        section,
        subsection: subsection.map(str::to_string),
        line_start,
        line_end,
        step_start: steps.map(|(start, _)| start),
        step_end: steps.map(|(_, end)| end),
        text: raw_lines.join("\n").trim().to_string(),
        tags: BTreeMap::new(),
    }
}
