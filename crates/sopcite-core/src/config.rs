//! Configuration and data directory management.
//!
//! Settings are read from an optional JSON file (missing fields take their
//! defaults), then selected values are overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CHARS: usize = 1400;
pub const DEFAULT_PROCEDURE_STEPS_PER_CHUNK: usize = 6;
pub const DEFAULT_MIN_CHARS: usize = 80;
pub const DEFAULT_MIN_WORDS: usize = 12;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_NO_ANSWER_THRESHOLD: f32 = 0.25;
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Embedding width of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "sopcite.json";

/// Knobs for the chunking engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    /// Character budget per size-bounded passage.
    pub max_chars: usize,
    /// Numbered steps grouped per procedure passage.
    pub procedure_steps_per_chunk: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            procedure_steps_per_chunk: DEFAULT_PROCEDURE_STEPS_PER_CHUNK,
        }
    }
}

impl ChunkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(Error::Config("max_chars must be greater than zero".into()));
        }
        if self.procedure_steps_per_chunk == 0 {
            return Err(Error::Config(
                "procedure_steps_per_chunk must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Minimum size of a passage worth indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_chars: usize,
    pub min_words: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Abstain when the best inner-product score falls below this.
    pub no_answer_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            no_answer_threshold: DEFAULT_NO_ANSWER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_name: String,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_EMBEDDING_MODEL.into(),
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// Paths to all pipeline directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Markdown SOP sources (`data_raw/sops/`).
    pub sops_dir: PathBuf,
    /// `docs.jsonl` and `chunks.jsonl` (`data/processed/`).
    pub processed_dir: PathBuf,
    /// Vector index, chunk metadata and manifest (`data/index/`).
    pub index_dir: PathBuf,
    /// Optional ONNX model + tokenizer (`data/models/`).
    pub models_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::under(Path::new("data"), PathBuf::from("data_raw/sops"))
    }
}

impl DataPaths {
    /// Lay out derived directories under a data root.
    pub fn under(data_root: &Path, sops_dir: PathBuf) -> Self {
        Self {
            sops_dir,
            processed_dir: data_root.join("processed"),
            index_dir: data_root.join("index"),
            models_dir: data_root.join("models"),
        }
    }

    pub fn docs_file(&self) -> PathBuf {
        self.processed_dir.join("docs.jsonl")
    }

    pub fn chunks_file(&self) -> PathBuf {
        self.processed_dir.join("chunks.jsonl")
    }

    /// Create output directories if needed.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.processed_dir)?;
        std::fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }
}

/// Top-level SopCite configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: DataPaths,
    pub chunking: ChunkSettings,
    pub quality: QualityThresholds,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    /// Chunk documents on the rayon pool.
    pub parallel: bool,
}

impl Settings {
    /// Load settings from a JSON file (if present) and the environment.
    ///
    /// `SOPCITE_CONFIG` names the file; otherwise `sopcite.json` in the
    /// working directory is used when it exists.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SOPCITE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME));
        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let settings: Settings = serde_json::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SOPCITE_DATA_DIR") {
            self.paths = DataPaths::under(Path::new(&dir), self.paths.sops_dir.clone());
        }
        if let Some(dir) = lookup("SOPCITE_SOPS_DIR") {
            self.paths.sops_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("SOPCITE_MAX_CHARS") {
            self.chunking.max_chars = parse_env("SOPCITE_MAX_CHARS", &v)?;
        }
        if let Some(v) = lookup("SOPCITE_STEPS_PER_CHUNK") {
            self.chunking.procedure_steps_per_chunk = parse_env("SOPCITE_STEPS_PER_CHUNK", &v)?;
        }
        if let Some(v) = lookup("SOPCITE_TOP_K") {
            self.retrieval.top_k = parse_env("SOPCITE_TOP_K", &v)?;
        }
        if let Some(v) = lookup("SOPCITE_NO_ANSWER_THRESHOLD") {
            self.retrieval.no_answer_threshold = parse_env("SOPCITE_NO_ANSWER_THRESHOLD", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding dimension must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, value)))
}
