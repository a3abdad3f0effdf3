//! Index build and dense retrieval.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use sopcite_core::{Chunk, Error, Result};
use sopcite_infer::{EmbedderBackend, QueryCache};
use sopcite_store::{
    read_jsonl, write_jsonl, FlatIndex, IndexManifest, INDEX_FILE, MANIFEST_FILE, META_FILE,
};

use crate::types::Hit;

/// Chunks embedded per `embed_batch` call.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Embed `chunks` and write `index.json`, `meta.jsonl` and `manifest.json`
/// into `index_dir`.
///
/// Row `i` of the index always describes line `i` of `meta.jsonl`. Chunks
/// the embedder can't represent (no tokens) are left out of both.
pub fn build_index(
    chunks: &[Chunk],
    embedder: &dyn EmbedderBackend,
    index_dir: &Path,
) -> Result<IndexManifest> {
    if chunks.is_empty() {
        return Err(Error::Index("no chunks to index".into()));
    }

    let mut index = FlatIndex::new(embedder.dimension());
    let mut meta: Vec<&Chunk> = Vec::with_capacity(chunks.len());

    for (n, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let results = embedder.embed_batch(&texts);
        for (chunk, result) in batch.iter().zip(results) {
            match result {
                Some(r) => {
                    index.add(r.embedding.view())?;
                    meta.push(chunk);
                }
                None => warn!("Skipping chunk {} ({}): no embedding", chunk.chunk_id, chunk.doc_id),
            }
        }
        debug!("Embedded batch {} ({} chunks)", n + 1, batch.len());
    }

    if index.is_empty() {
        return Err(Error::Embedding("no chunk produced an embedding".into()));
    }

    std::fs::create_dir_all(index_dir)?;
    index.save(&index_dir.join(INDEX_FILE))?;
    write_jsonl(&index_dir.join(META_FILE), meta.iter().copied())?;

    let manifest = IndexManifest::new(index.len(), index.dim(), embedder.name());
    manifest.save(&index_dir.join(MANIFEST_FILE))?;
    info!(
        "Index built: {} chunks, dim={}, model={}",
        manifest.n_chunks, manifest.dim, manifest.embedding_model
    );
    Ok(manifest)
}

/// Abstain when nothing was retrieved or the best score is under `threshold`.
pub fn should_abstain(top_score: Option<f32>, threshold: f32) -> bool {
    match top_score {
        Some(score) => score < threshold,
        None => true,
    }
}

/// Query-time view of a built index.
pub struct Retriever {
    index: FlatIndex,
    meta: Vec<Chunk>,
    embedder: Arc<dyn EmbedderBackend>,
    cache: QueryCache,
}

impl Retriever {
    /// Load `index.json` and `meta.jsonl` from `index_dir`.
    pub fn open(index_dir: &Path, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        let index = FlatIndex::load(&index_dir.join(INDEX_FILE))?;
        let meta: Vec<Chunk> = read_jsonl(&index_dir.join(META_FILE))?;

        let manifest_path = index_dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            let manifest = IndexManifest::load(&manifest_path)?;
            if manifest.embedding_model != embedder.name() {
                warn!(
                    "Index was built with {}, querying with {}",
                    manifest.embedding_model,
                    embedder.name()
                );
            }
        }

        let retriever = Self::from_parts(index, meta, embedder)?;
        info!("Loaded index from {} ({} chunks)", index_dir.display(), retriever.len());
        Ok(retriever)
    }

    /// Assemble a retriever from an in-memory index and its metadata.
    pub fn from_parts(
        index: FlatIndex,
        meta: Vec<Chunk>,
        embedder: Arc<dyn EmbedderBackend>,
    ) -> Result<Self> {
        if index.len() != meta.len() {
            return Err(Error::Index(format!(
                "index has {} vectors but metadata has {} chunks",
                index.len(),
                meta.len()
            )));
        }
        if index.dim() != embedder.dimension() {
            return Err(Error::Index(format!(
                "index dimension {} does not match embedder {} ({})",
                index.dim(),
                embedder.name(),
                embedder.dimension()
            )));
        }
        Ok(Self {
            index,
            meta,
            embedder,
            cache: QueryCache::default_cache(),
        })
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.meta
    }

    /// Top `k` chunks for `query`, best first. A query with no embeddable
    /// content retrieves nothing.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        let embedding = match self.cache.get(query) {
            Some(e) => e,
            None => match self.embedder.embed(query) {
                Some(r) => {
                    self.cache.put(query.to_string(), r.embedding.clone());
                    r.embedding
                }
                None => {
                    debug!("Query {:?} has no embedding", query);
                    return Ok(Vec::new());
                }
            },
        };

        let ranked = self.index.search(embedding.view(), k)?;
        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, (handle, score))| Hit {
                rank: i + 1,
                score,
                chunk: self.meta[handle].clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopcite_core::Section;
    use sopcite_infer::{EmbeddingResult, HashingEmbedder};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hashing embedder that counts `embed` calls.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl EmbedderBackend for CountingEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn name(&self) -> &str {
            self.inner.name()
        }
    }

    fn chunk(id: &str, section: Section, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            doc_id: format!("sop-tc-{}", id),
            doc_title: "T".into(),
            source_path: "t.md".into(),
            version: None,
            section,
            subsection: None,
            line_start: 1,
            line_end: 1,
            step_start: None,
            step_end: None,
            text: text.into(),
            tags: BTreeMap::new(),
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("001", Section::Procedure, "Thaw the frozen vial in a 37 C water bath"),
            chunk("002", Section::Safety, "Wear nitrile gloves and a lab coat in the hood"),
            chunk("003", Section::Qc, "Record viability from the trypan blue count"),
        ]
    }

    #[test]
    fn test_abstain_rule() {
        assert!(should_abstain(None, 0.25));
        assert!(should_abstain(Some(0.2), 0.25));
        assert!(!should_abstain(Some(0.25), 0.25));
        assert!(!should_abstain(Some(0.9), 0.25));
    }

    #[test]
    fn test_build_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::new(256));
        let manifest = build_index(&corpus(), embedder.as_ref(), dir.path()).unwrap();
        assert_eq!(manifest.n_chunks, 3);
        assert_eq!(manifest.dim, 256);
        assert_eq!(manifest.embedding_model, "feature-hashing");

        let retriever = Retriever::open(dir.path(), embedder).unwrap();
        assert_eq!(retriever.len(), 3);

        let hits = retriever.search("thaw the frozen vial", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].chunk.doc_id, "sop-tc-001");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_repeated_query_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::new(128));
        build_index(&corpus(), embedder.as_ref(), dir.path()).unwrap();
        let retriever = Retriever::open(dir.path(), embedder).unwrap();

        let first = retriever.search("gloves", 3).unwrap();
        let second = retriever.search("gloves", 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_query_embedded_once() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(128),
            calls: AtomicUsize::new(0),
        });
        build_index(&corpus(), embedder.as_ref(), dir.path()).unwrap();
        let indexed = embedder.calls.load(Ordering::SeqCst);
        assert_eq!(indexed, 3);

        let retriever = Retriever::open(dir.path(), embedder.clone()).unwrap();
        retriever.search("trypan blue", 2).unwrap();
        retriever.search("trypan blue", 2).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), indexed + 1);

        retriever.search("lab coat", 2).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), indexed + 2);
    }

    #[test]
    fn test_unembeddable_chunk_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunks = corpus();
        chunks.push(chunk("004", Section::Other, "--- ... ---"));
        let embedder = HashingEmbedder::new(64);
        let manifest = build_index(&chunks, &embedder, dir.path()).unwrap();
        assert_eq!(manifest.n_chunks, 3);

        let meta: Vec<Chunk> = read_jsonl(&dir.path().join(META_FILE)).unwrap();
        assert_eq!(meta.len(), 3);
        assert!(meta.iter().all(|c| c.chunk_id != "004"));
    }

    #[test]
    fn test_empty_query_retrieves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::new(64));
        build_index(&corpus(), embedder.as_ref(), dir.path()).unwrap();
        let retriever = Retriever::open(dir.path(), embedder).unwrap();
        assert!(retriever.search("???", 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        build_index(&corpus(), &HashingEmbedder::new(64), dir.path()).unwrap();
        let err = Retriever::open(dir.path(), Arc::new(HashingEmbedder::new(32)));
        assert!(matches!(err, Err(Error::Index(_))));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let index = FlatIndex::new(8);
        let err = Retriever::from_parts(index, corpus(), Arc::new(HashingEmbedder::new(8)));
        assert!(matches!(err, Err(Error::Index(_))));
    }

    #[test]
    fn test_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let err = Retriever::open(dir.path(), Arc::new(HashingEmbedder::new(8)));
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_index(&[], &HashingEmbedder::new(8), dir.path()).is_err());
    }
}
