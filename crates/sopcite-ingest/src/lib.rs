//! SopCite Ingest — markdown loading, section-aware chunking, quality filtering.

pub mod chunking;
pub mod file;
pub mod ingest;

pub use chunking::{chunk_document, classify, is_useful, segment, Block};
pub use file::{infer_doc_id, infer_title, load_documents};
pub use ingest::{build_chunks, chunk_corpus, ChunkReport, Ingester};
