//! Batch pipeline: SOP markdown → `docs.jsonl` → `chunks.jsonl`.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use sopcite_core::{Chunk, ChunkSettings, Document, Result, Section, Settings};
use sopcite_store::{read_jsonl, write_jsonl};

use crate::chunking::{chunk_document, retain_useful};
use crate::file;

/// Summary of one chunking run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkReport {
    pub documents: usize,
    pub produced: usize,
    pub retained: usize,
    pub dropped: usize,
    /// Retained chunks per section label.
    pub by_section: BTreeMap<Section, usize>,
}

/// Chunk every document, preserving document order in the output.
///
/// Documents share no state, so with `parallel` each one is chunked on the
/// rayon pool and the results are concatenated in input order.
pub fn chunk_corpus(docs: &[Document], settings: &ChunkSettings, parallel: bool) -> Vec<Chunk> {
    let per_doc: Vec<Vec<Chunk>> = if parallel {
        docs.par_iter().map(|d| chunk_document(d, settings)).collect()
    } else {
        docs.iter().map(|d| chunk_document(d, settings)).collect()
    };
    per_doc.into_iter().flatten().collect()
}

/// Chunk and quality-filter a corpus in memory.
pub fn build_chunks(docs: &[Document], settings: &Settings) -> (Vec<Chunk>, ChunkReport) {
    let produced = chunk_corpus(docs, &settings.chunking, settings.parallel);
    let produced_count = produced.len();
    let (kept, dropped) = retain_useful(produced, &settings.quality);

    let mut by_section = BTreeMap::new();
    for chunk in &kept {
        *by_section.entry(chunk.section).or_insert(0) += 1;
    }

    let report = ChunkReport {
        documents: docs.len(),
        produced: produced_count,
        retained: kept.len(),
        dropped,
        by_section,
    };
    (kept, report)
}

/// Runs the file-to-file ingest stages against the configured paths.
pub struct Ingester<'a> {
    settings: &'a Settings,
}

impl<'a> Ingester<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Load markdown SOPs and write `docs.jsonl`. Returns the document count.
    pub fn ingest_documents(&self) -> Result<usize> {
        let paths = &self.settings.paths;
        let docs = file::load_documents(&paths.sops_dir)?;
        let out = paths.docs_file();
        let written = write_jsonl(&out, &docs)?;
        info!("Wrote {} docs → {}", written, out.display());
        Ok(written)
    }

    /// Read `docs.jsonl`, chunk, filter, and write `chunks.jsonl`.
    pub fn chunk_documents(&self) -> Result<ChunkReport> {
        self.settings.chunking.validate()?;
        let paths = &self.settings.paths;

        let docs: Vec<Document> = read_jsonl(&paths.docs_file())?;
        let (chunks, report) = build_chunks(&docs, self.settings);

        let out = paths.chunks_file();
        write_jsonl(&out, &chunks)?;
        info!(
            "Wrote {} chunks → {} ({} produced, {} dropped by quality filter)",
            report.retained,
            out.display(),
            report.produced,
            report.dropped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopcite_core::DataPaths;

    const SOP: &str = "# Thawing cryopreserved cells\n\
## Purpose\n\
Describe how to thaw a cryovial of adherent cells quickly and safely so that viability stays high after recovery.\n\
# Safety\n\
Wear a lab coat, nitrile gloves and eye protection when handling liquid nitrogen and cryovials from storage.\n\
# Procedure\n\
1. Warm complete medium to 37 C in the bead bath before removing the vial.\n\
2. Thaw the vial in the bath until a small ice crystal remains.\n\
3. Transfer the contents dropwise into 9 mL of warm medium.\n\
4. Centrifuge at 200 g for 5 minutes and resuspend the pellet.\n";

    fn settings_in(root: &std::path::Path) -> Settings {
        Settings {
            paths: DataPaths::under(&root.join("data"), root.join("sops")),
            chunking: ChunkSettings {
                max_chars: 1400,
                procedure_steps_per_chunk: 2,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let docs: Vec<Document> = (0..8)
            .map(|i| Document {
                doc_id: format!("sop-tc-{:03}", i),
                title: "T".into(),
                source_path: format!("{}.md", i),
                version: None,
                lines: SOP.lines().map(str::to_string).collect(),
            })
            .collect();
        let settings = ChunkSettings::default();
        assert_eq!(
            chunk_corpus(&docs, &settings, true),
            chunk_corpus(&docs, &settings, false)
        );
    }

    #[test]
    fn test_end_to_end_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        std::fs::create_dir_all(&settings.paths.sops_dir).unwrap();
        std::fs::write(settings.paths.sops_dir.join("sop-tc-001-thawing.md"), SOP).unwrap();

        let ingester = Ingester::new(&settings);
        assert_eq!(ingester.ingest_documents().unwrap(), 1);
        let report = ingester.chunk_documents().unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.produced, 4);
        assert_eq!(report.retained + report.dropped, report.produced);
        assert_eq!(report.by_section.get(&Section::Procedure), Some(&2));

        let chunks: Vec<Chunk> = read_jsonl(&settings.paths.chunks_file()).unwrap();
        assert_eq!(chunks.len(), report.retained);
        let procedure: Vec<_> = chunks.iter().filter(|c| c.section == Section::Procedure).collect();
        assert_eq!(procedure[0].step_range(), Some((1, 2)));
        assert_eq!(procedure[1].step_range(), Some((3, 4)));
        assert!(procedure[0].text.starts_with("1. Warm complete medium"));
        assert!(procedure[0].text.ends_with("a small ice crystal remains."));
        assert!(!procedure[0].text.contains("3. Transfer"));
        assert!(procedure[1].text.starts_with("3. Transfer the contents"));
        assert!(procedure[1].text.ends_with("resuspend the pellet."));
        assert!(chunks.iter().all(|c| c.doc_id == "sop-tc-001"));
    }

    #[test]
    fn test_rechunking_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        std::fs::create_dir_all(&settings.paths.sops_dir).unwrap();
        std::fs::write(settings.paths.sops_dir.join("sop-tc-001-thawing.md"), SOP).unwrap();

        let ingester = Ingester::new(&settings);
        ingester.ingest_documents().unwrap();
        ingester.chunk_documents().unwrap();
        let first = std::fs::read(settings.paths.chunks_file()).unwrap();
        ingester.chunk_documents().unwrap();
        let second = std::fs::read(settings.paths.chunks_file()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.chunking.max_chars = 0;
        assert!(Ingester::new(&settings).chunk_documents().is_err());
    }
}
