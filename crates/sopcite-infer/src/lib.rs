//! SopCite Infer — embedding backends and query cache.
//!
//! Provides the `EmbedderBackend` trait for mapping text to unit-norm
//! vectors. When the `onnx` feature is enabled and model files are present,
//! `OnnxEmbedder` loads all-MiniLM-L6-v2. Otherwise the deterministic
//! `HashingEmbedder` is used, which needs no model files at all.

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod onnx_embedder;

pub use cache::QueryCache;
pub use embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};
pub use hashing::HashingEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present),
/// falls back to `HashingEmbedder` of width `dim`.
pub fn create_embedder(model_dir: &Path, dim: usize) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) => {
                tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}. Falling back to feature hashing.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using feature-hashing embedder.");
    }

    Arc::new(HashingEmbedder::new(dim))
}
