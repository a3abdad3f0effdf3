//! ONNX-based sentence embedder (all-MiniLM-L6-v2).
//!
//! Loads a SentenceTransformers ONNX export and its tokenizer, mean-pools
//! token embeddings under the attention mask and L2-normalizes the result,
//! so inner products against the index are cosine similarities.
//! Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use sopcite_core::{Error, Result};

    use crate::embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};

    const MAX_SEQ_LEN: usize = 512;
    const MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::NotFound(model_path.display().to_string()));
            }
            if !tokenizer_path.exists() {
                return Err(Error::NotFound(tokenizer_path.display().to_string()));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Embedding(format!("session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Embedding(format!("intra threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Embedding(format!("load {}: {}", model_path.display(), e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Embedding(format!("load tokenizer: {}", e)))?;

            let mut embedder = Self {
                session: Mutex::new(session),
                tokenizer,
                dimension: 0,
            };

            // One warm-up inference fixes the output width.
            let sample = embedder
                .infer("dimension check")
                .ok_or_else(|| Error::Embedding("warm-up inference failed".into()))?;
            embedder.dimension = sample.len();

            info!(
                "ONNX embedder loaded: dim={}, model={}",
                embedder.dimension,
                model_path.display()
            );
            Ok(embedder)
        }

        fn infer(&self, text: &str) -> Option<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| warn!("Tokenization failed: {}", e))
                .ok()?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            if seq_len == 0 {
                return None;
            }
            let input_ids = &encoding.get_ids()[..seq_len];
            let attention_mask = &encoding.get_attention_mask()[..seq_len];

            let ids: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids = vec![0i64; seq_len];

            let ids = Tensor::from_array(([1usize, seq_len], ids))
                .map_err(|e| warn!("ids tensor: {}", e))
                .ok()?;
            let mask_tensor = Tensor::from_array(([1usize, seq_len], mask))
                .map_err(|e| warn!("mask tensor: {}", e))
                .ok()?;
            let type_ids = Tensor::from_array(([1usize, seq_len], type_ids))
                .map_err(|e| warn!("type_ids tensor: {}", e))
                .ok()?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids, mask_tensor, type_ids])
                .map_err(|e| warn!("ONNX inference failed: {}", e))
                .ok()?;

            // Either token embeddings [1, seq, dim] or pooled [1, dim].
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| warn!("output tensor: {}", e))
                .ok()?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let pooled = match dims.as_slice() {
                [_, _, dim] => {
                    let dim = *dim as usize;
                    let mut sum = Array1::<f32>::zeros(dim);
                    let mut weight = 0.0f32;
                    for (i, &m) in attention_mask.iter().enumerate() {
                        if m == 0 {
                            continue;
                        }
                        let row = &data[i * dim..(i + 1) * dim];
                        sum.iter_mut().zip(row).for_each(|(acc, &x)| *acc += x);
                        weight += 1.0;
                    }
                    if weight == 0.0 {
                        return None;
                    }
                    sum / weight
                }
                [_, dim] => Array1::from_vec(data[..*dim as usize].to_vec()),
                other => {
                    warn!("Unexpected output shape: {:?}", other);
                    return None;
                }
            };

            l2_normalize(pooled)
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            self.infer(text).map(|embedding| EmbeddingResult { embedding })
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            MODEL_NAME
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
