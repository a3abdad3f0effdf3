//! SopCite Store — line-delimited JSON records + flat vector index.

pub mod index;
pub mod jsonl;
pub mod types;

pub use index::FlatIndex;
pub use jsonl::{read_jsonl, write_jsonl};
pub use types::*;
