//! Retrieval over the chunk index — search, cited answers, evaluation.
//!
//! `build_index` embeds `chunks.jsonl` into a flat inner-product index.
//! `Retriever` answers queries against it; `compose_answer` turns hits into
//! a cited response or an abstention, and `eval` scores retrieval against a
//! gold question set.

pub mod answer;
pub mod eval;
pub mod retriever;
pub mod types;

pub use answer::{compose_answer, format_citation, REFUSAL};
pub use eval::{evaluate, load_gold, EvalReport, GoldRecord};
pub use retriever::{build_index, should_abstain, Retriever};
pub use types::*;
