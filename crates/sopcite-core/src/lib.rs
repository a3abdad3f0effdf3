//! SopCite Core — data model, configuration, error types.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ChunkSettings, DataPaths, EmbeddingSettings, QualityThresholds, RetrievalSettings, Settings};
pub use error::{Error, Result};
pub use types::{Chunk, Document, Section};
