//! Retriever trait: similarity search over ingested documents.
//!
//! The chat pipeline only ever asks for the top-N chunks for a query. How the
//! chunks were embedded and stored is the implementation's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// One scored chunk returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The chunk text
    pub text: String,

    /// Chunk metadata (source file, document id, chunk index, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Cosine distance to the query (0.0 = identical, 2.0 = opposite)
    pub distance: f32,
}

impl SearchHit {
    /// Human-readable source label, falling back to "unknown".
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
    }
}

/// The core Retriever trait.
///
/// An empty result means the store has nothing to offer; "no relevant match"
/// is decided by the caller from the returned distances.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `n` hits, closest first.
    async fn search(&self, query: &str, n: usize) -> std::result::Result<Vec<SearchHit>, RetrievalError>;
}
