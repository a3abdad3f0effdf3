//! Embedding backend trait.
//!
//! Implementations:
//! - `HashingEmbedder`: deterministic feature hashing, no model files
//! - `OnnxEmbedder`: ONNX Runtime with all-MiniLM-L6-v2 (requires `onnx` feature)

use ndarray::Array1;

/// Result of an embedding operation.
pub struct EmbeddingResult {
    /// Unit-norm float32 embedding vector.
    pub embedding: Array1<f32>,
}

/// Maps text to fixed-width unit-norm vectors.
pub trait EmbedderBackend: Send + Sync {
    /// Embed one string. Returns None when no vector can be produced
    /// (e.g. the text has no tokens, or inference failed).
    fn embed(&self, text: &str) -> Option<EmbeddingResult>;

    /// Embed a batch of strings, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<EmbeddingResult>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Width of every vector this backend produces.
    fn dimension(&self) -> usize;

    /// Model identifier recorded in the index manifest.
    fn name(&self) -> &str;
}

/// Scale a vector to unit L2 norm. Returns None for the zero vector.
pub fn l2_normalize(mut v: Array1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(&v).sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    v.mapv_inplace(|x| x / norm);
    Some(v)
}
