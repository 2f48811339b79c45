//! In-memory document store with cosine-distance search.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragchat_config::RetrievalConfig;
use ragchat_core::error::RetrievalError;
use ragchat_core::retriever::{Retriever, SearchHit};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::embed::Embedder;
use crate::vector::nearest;

/// Summary of one ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    /// File name or caller-supplied label, shown as the hit source
    pub name: String,
    pub chunk_count: usize,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredChunk {
    document_id: String,
    index: usize,
    text: String,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<DocumentInfo>,
    chunks: Vec<StoredChunk>,
}

/// Chunks, embeds and stores documents; answers similarity queries.
///
/// Cloning shares the underlying store.
#[derive(Clone)]
pub struct DocumentStore {
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
    inner: Arc<RwLock<Inner>>,
}

impl DocumentStore {
    pub fn new(embedder: Arc<dyn Embedder>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            embedder,
            chunk_size,
            chunk_overlap,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub fn from_config(config: &RetrievalConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(embedder, config.chunk_size, config.chunk_overlap)
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Chunk, embed and store `text` under a fresh document id.
    pub async fn add_document(
        &self,
        name: impl Into<String>,
        text: &str,
    ) -> Result<DocumentInfo, RetrievalError> {
        let name = name.into();
        let pieces = chunk_text(text, self.chunk_size, self.chunk_overlap);
        if pieces.is_empty() {
            return Err(RetrievalError::InvalidDocument(format!("'{name}' has no text content")));
        }

        let embeddings = self.embedder.embed(&pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let info = DocumentInfo {
            id: Uuid::new_v4().to_string(),
            name,
            chunk_count: pieces.len(),
            added_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.chunks.extend(
            pieces
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(index, (text, embedding))| StoredChunk {
                    document_id: info.id.clone(),
                    index,
                    text,
                    embedding,
                }),
        );
        inner.documents.push(info.clone());

        info!(document = %info.name, id = %info.id, chunks = info.chunk_count, "Document added");
        Ok(info)
    }

    /// Read a UTF-8 file and add it, named after the file.
    pub async fn add_file(&self, path: &Path) -> Result<DocumentInfo, RetrievalError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RetrievalError::InvalidDocument(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add_document(name, &text).await
    }

    /// Remove a document and all of its chunks.
    pub async fn delete_document(&self, id: &str) -> Result<DocumentInfo, RetrievalError> {
        let mut inner = self.inner.write().await;
        let pos = inner
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| RetrievalError::DocumentNotFound(id.to_string()))?;
        let removed = inner.documents.remove(pos);
        inner.chunks.retain(|c| c.document_id != id);
        info!(document = %removed.name, id, "Document deleted");
        Ok(removed)
    }

    pub async fn get_document(&self, id: &str) -> Option<DocumentInfo> {
        self.inner.read().await.documents.iter().find(|d| d.id == id).cloned()
    }

    /// Chunk texts of a document, in order.
    pub async fn document_chunks(&self, id: &str) -> Result<Vec<String>, RetrievalError> {
        let inner = self.inner.read().await;
        if !inner.documents.iter().any(|d| d.id == id) {
            return Err(RetrievalError::DocumentNotFound(id.to_string()));
        }
        let mut chunks: Vec<&StoredChunk> =
            inner.chunks.iter().filter(|c| c.document_id == id).collect();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks.into_iter().map(|c| c.text.clone()).collect())
    }

    /// All documents, oldest first.
    pub async fn list_documents(&self) -> Vec<DocumentInfo> {
        self.inner.read().await.documents.clone()
    }

    pub async fn chunk_count(&self) -> usize {
        self.inner.read().await.chunks.len()
    }

    /// Drop every document.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.documents.clear();
        inner.chunks.clear();
        info!("Document store cleared");
    }
}

#[async_trait]
impl Retriever for DocumentStore {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        let inner = self.inner.read().await;
        if inner.chunks.is_empty() || n == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("no embedding for query".into()))?;

        let ranked = nearest(
            inner.chunks.iter().map(|c| c.embedding.as_slice()),
            &query_embedding,
            n,
        );

        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .map(|(i, distance)| {
                let chunk = &inner.chunks[i];
                let source = inner
                    .documents
                    .iter()
                    .find(|d| d.id == chunk.document_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_default();

                let mut metadata = serde_json::Map::new();
                metadata.insert("source".into(), serde_json::json!(source));
                metadata.insert("document_id".into(), serde_json::json!(chunk.document_id));
                metadata.insert("chunk_index".into(), serde_json::json!(chunk.index));

                SearchHit {
                    text: chunk.text.clone(),
                    metadata,
                    distance,
                }
            })
            .collect();

        debug!(
            results = hits.len(),
            best_distance = hits.first().map(|h| h.distance),
            "Document search finished"
        );
        Ok(hits)
    }
}
