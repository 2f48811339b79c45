//! Document retrieval for RagChat.
//!
//! Documents are split into overlapping chunks, embedded, and kept in an
//! in-memory store that answers nearest-neighbour queries by cosine distance.

pub mod chunk;
pub mod embed;
pub mod format;
pub mod store;
pub mod vector;

pub use chunk::chunk_text;
pub use embed::{Embedder, HashingEmbedder, ProviderEmbedder};
pub use format::{format_hits, NO_RELEVANT_INFORMATION};
pub use store::{DocumentInfo, DocumentStore};
pub use vector::{cosine_distance, cosine_similarity};
