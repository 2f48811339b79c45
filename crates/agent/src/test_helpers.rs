//! Shared test helpers: scripted providers and retrievers.

use async_trait::async_trait;
use ragchat_core::error::{ProviderError, RetrievalError};
use ragchat_core::message::Turn;
use ragchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use ragchat_core::retriever::{Retriever, SearchHit};
use ragchat_providers::{ProviderKind, ResolvedProvider};
use std::sync::{Arc, Mutex};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Vec<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let count = requests.len();

        if count >= self.responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                self.responses.len()
            );
        }

        requests.push(request);
        Ok(self.responses[count].clone())
    }
}

/// A provider whose every call fails with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn network() -> Self {
        Self {
            error: ProviderError::Network("connection refused".into()),
        }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.error.clone())
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Turn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Wrap a provider as a resolved Groq client.
pub fn resolved(provider: Arc<dyn Provider>) -> ResolvedProvider {
    ResolvedProvider {
        kind: ProviderKind::Groq,
        provider,
        model: "mock-model".into(),
    }
}

/// Returns the same hits for every query.
pub struct FixedRetriever {
    hits: Vec<SearchHit>,
}

impl FixedRetriever {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// One hit from `source` at `distance`.
    pub fn single(source: &str, text: &str, distance: f32) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!(source));
        Self::new(vec![SearchHit {
            text: text.into(),
            metadata,
            distance,
        }])
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn search(&self, _query: &str, n: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        Ok(self.hits.iter().take(n).cloned().collect())
    }
}

/// A retriever whose store is unreachable.
pub struct BrokenRetriever;

#[async_trait]
impl Retriever for BrokenRetriever {
    async fn search(&self, _query: &str, _n: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        Err(RetrievalError::Storage("index unavailable".into()))
    }
}
