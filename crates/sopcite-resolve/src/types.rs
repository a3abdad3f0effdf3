//! Resolver types.

use serde::Serialize;

use sopcite_core::Chunk;

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// 1-based rank in the result list.
    pub rank: usize,
    /// Inner product with the query (cosine for unit vectors).
    pub score: f32,
    pub chunk: Chunk,
}

/// A composed response to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Numbered citation strings, in the order cited.
    pub citations: Vec<String>,
    /// True when retrieval was too weak to answer.
    pub abstained: bool,
}
