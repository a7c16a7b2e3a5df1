//! Embedding store backing the discovery engines.
//!
//! # Architecture
//!
//! - `embeddings`: fastembed wrapper that turns note text into vectors
//! - `index`: in-memory embedding records, the engines' embedding store
//! - `storage`: binary vectors.bin persistence
//! - `preprocess`: note text preparation for embedding input

mod embeddings;
mod index;
mod preprocess;
mod storage;

pub use embeddings::EmbeddingModel;
pub use index::{EmbeddingIndex, EmbeddingRecord};
pub use preprocess::{note_text, truncate_chars};
pub use storage::VectorStorage;

/// Notes embedded per model call
pub const EMBED_BATCH_SIZE: usize = 32;

pub const VECTORS_FILE: &str = "vectors.bin";
