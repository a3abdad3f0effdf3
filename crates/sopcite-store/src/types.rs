//! Index-level metadata persisted next to the vectors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use sopcite_core::Result;

pub const INDEX_FILE: &str = "index.json";
pub const META_FILE: &str = "meta.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Describes a built index: what was embedded, with which model, and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub n_chunks: usize,
    pub dim: usize,
    pub embedding_model: String,
    pub index_file: String,
    pub meta_file: String,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

impl IndexManifest {
    pub fn new(n_chunks: usize, dim: usize, embedding_model: &str) -> Self {
        Self {
            n_chunks,
            dim,
            embedding_model: embedding_model.to_string(),
            index_file: INDEX_FILE.to_string(),
            meta_file: META_FILE.to_string(),
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
