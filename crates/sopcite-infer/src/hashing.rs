//! Feature-hashing embedder.
//!
//! Lowercased alphanumeric tokens and adjacent-token bigrams are hashed with
//! SHA-256 into `dim` signed buckets, then the vector is L2-normalized. The
//! mapping is stable across runs and platforms, so an index built today can
//! be queried tomorrow without a model file.

use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[[:alnum:]]+").unwrap());

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn tokens(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        TOKEN_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Bucket index and sign for one feature.
    fn slot(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(word);
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Option<EmbeddingResult> {
        let tokens = Self::tokens(text);
        if tokens.is_empty() {
            return None;
        }

        let mut v = Array1::<f32>::zeros(self.dim);
        for token in &tokens {
            let (i, sign) = self.slot(token);
            v[i] += sign * UNIGRAM_WEIGHT;
        }
        for pair in tokens.windows(2) {
            let (i, sign) = self.slot(&format!("{} {}", pair[0], pair[1]));
            v[i] += sign * BIGRAM_WEIGHT;
        }

        l2_normalize(v).map(|embedding| EmbeddingResult { embedding })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed(e: &HashingEmbedder, text: &str) -> Array1<f32> {
        e.embed(text).unwrap().embedding
    }

    #[test]
    fn test_unit_norm_and_dimension() {
        let e = HashingEmbedder::new(384);
        let v = embed(&e, "Wash hands before donning gloves");
        assert_eq!(v.len(), 384);
        assert!((v.dot(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let e = HashingEmbedder::new(64);
        assert_eq!(embed(&e, "Aliquot the sample"), embed(&e, "Aliquot the sample"));
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(64);
        assert_eq!(embed(&e, "Label tubes."), embed(&e, "label TUBES"));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let e = HashingEmbedder::new(384);
        let q = embed(&e, "how do I thaw frozen cells");
        let related = embed(&e, "Thaw the frozen cells quickly in a water bath");
        let unrelated = embed(&e, "Dispose of sharps in the yellow container");
        assert!(q.dot(&related) > q.dot(&unrelated));
    }

    #[test]
    fn test_empty_text_has_no_embedding() {
        let e = HashingEmbedder::new(64);
        assert!(e.embed("   ...  ").is_none());
        let batch = e.embed_batch(&["cells", ""]);
        assert!(batch[0].is_some());
        assert!(batch[1].is_none());
    }
}
