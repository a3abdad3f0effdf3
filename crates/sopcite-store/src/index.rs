//! Exact nearest-neighbour search by inner product.
//!
//! Vectors are expected to be unit-norm, so the inner product is the cosine
//! similarity. Handles are row positions, assigned in insertion order.

use std::path::Path;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use sopcite_core::{Error, Result};

/// Flat (brute-force) inner-product index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    vectors: Array2<f32>,
}

/// On-disk form of the index.
#[derive(Serialize, Deserialize)]
struct StoredIndex {
    dim: usize,
    metric: String,
    vectors: Vec<Vec<f32>>,
}

const METRIC_INNER_PRODUCT: &str = "inner_product";

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Array2::zeros((0, dim)),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector and return its handle.
    pub fn add(&mut self, vector: ArrayView1<f32>) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(Error::Index(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        self.vectors
            .push_row(vector)
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(self.len() - 1)
    }

    /// Return up to `k` `(handle, score)` pairs, best first.
    /// Equal scores are ordered by handle.
    pub fn search(&self, query: ArrayView1<f32>, k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dim
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.vectors.dot(&query);
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let stored = StoredIndex {
            dim: self.dim,
            metric: METRIC_INNER_PRODUCT.to_string(),
            vectors: self.vectors.outer_iter().map(|row| row.to_vec()).collect(),
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &stored)?;
        info!("Saved index ({} vectors, dim={}) to {}", self.len(), self.dim, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        let stored: StoredIndex = serde_json::from_reader(std::io::BufReader::new(file))?;
        if stored.metric != METRIC_INNER_PRODUCT {
            return Err(Error::Index(format!("unsupported metric {}", stored.metric)));
        }

        let mut index = Self::new(stored.dim);
        for row in &stored.vectors {
            index.add(ArrayView1::from(row.as_slice()))?;
        }
        Ok(index)
    }
}
