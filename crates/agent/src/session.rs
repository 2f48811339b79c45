//! One chat session: retrieve, assemble, dispatch, remember.
//!
//! # Flow
//!
//! 1. Search the document store for the question
//! 2. Refuse without an LLM call when nothing close enough was found
//! 3. Assemble a budgeted prompt from the hits and the session history
//! 4. Send it to the chosen provider
//! 5. Record the exchange only when every step succeeded

use std::sync::Arc;

use ragchat_config::{AppConfig, ConfigError};
use ragchat_core::retriever::{Retriever, SearchHit};
use ragchat_providers::ProviderDispatch;
use ragchat_retrieval::format_hits;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::assembler::{AssemblyMetadata, BudgetConfig, ContextAssembler};
use crate::context::history::HistoryStore;
use crate::context::summarizer::Summarizer;
use crate::context::token::TokenCounter;
use crate::prompt;

/// Reply used whenever the documents cannot answer the question.
pub const NOT_ENOUGH_INFORMATION: &str = "I don't have enough information to answer this question.";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// The LLM answered and the exchange was recorded.
    Answer,
    /// Declined before any LLM call: no relevant documents or over budget.
    Refused,
    /// Retrieval or the provider failed.
    Failed,
}

/// What the user sees for one question.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub kind: ReplyKind,
    pub text: String,
    /// Sources of the retrieved chunks, in rank order.
    pub sources: Vec<String>,
    /// Present once a prompt was assembled.
    pub metadata: Option<AssemblyMetadata>,
}

impl TurnReply {
    fn refused(text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Refused,
            text: text.into(),
            sources: Vec::new(),
            metadata: None,
        }
    }

    fn failed(text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Failed,
            text: text.into(),
            sources: Vec::new(),
            metadata: None,
        }
    }

    pub fn is_answer(&self) -> bool {
        self.kind == ReplyKind::Answer
    }
}

/// Retrieval knobs and the system prompt.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub n_results: usize,
    pub max_distance: f32,
    pub system_prompt: String,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            n_results: config.retrieval.n_results,
            max_distance: config.retrieval.max_distance,
            system_prompt: prompt::system_prompt(config),
        }
    }
}

/// A conversation over the ingested documents. Owns its history.
pub struct ChatSession {
    assembler: ContextAssembler,
    retriever: Arc<dyn Retriever>,
    dispatch: Arc<ProviderDispatch>,
    settings: SessionSettings,
}

impl ChatSession {
    pub fn new(
        assembler: ContextAssembler,
        retriever: Arc<dyn Retriever>,
        dispatch: Arc<ProviderDispatch>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            assembler,
            retriever,
            dispatch,
            settings,
        }
    }

    /// Build a session from the loaded config. Fails on an invalid budget.
    pub fn from_config(
        config: &AppConfig,
        retriever: Arc<dyn Retriever>,
        dispatch: Arc<ProviderDispatch>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, ConfigError> {
        let budget = BudgetConfig::from_memory_config(&config.memory)?;
        let assembler = ContextAssembler::new(budget, TokenCounter::cl100k(), summarizer);
        Ok(Self::new(
            assembler,
            retriever,
            dispatch,
            SessionSettings::from_config(config),
        ))
    }

    pub fn history(&self) -> &HistoryStore {
        self.assembler.history()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Forget the conversation. Documents are untouched.
    pub fn clear(&mut self) {
        self.assembler.clear();
        info!("Chat history cleared");
    }

    /// Answer one question with `provider`. Never fails; every outcome is a reply.
    pub async fn ask(&mut self, query: &str, provider: &str) -> TurnReply {
        // ── Step 1: Retrieve ──
        let hits = match self.retriever.search(query, self.settings.n_results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Document search failed");
                return TurnReply::failed(format!("Error: Failed to search documents: {e}"));
            }
        };

        // ── Step 2: Relevance cutoff ──
        if !self.is_relevant(&hits) {
            info!(
                hits = hits.len(),
                best = hits.first().map(|h| h.distance),
                max_distance = self.settings.max_distance,
                "No relevant documents, skipping LLM call"
            );
            return TurnReply::refused(NOT_ENOUGH_INFORMATION);
        }
        let sources: Vec<String> = hits.iter().map(|h| h.source().to_string()).collect();
        debug!(hits = hits.len(), ?sources, "Documents retrieved");

        // ── Step 3: Assemble ──
        let context = format_hits(&hits);
        let assembled = match self
            .assembler
            .prepare_context(query, &self.settings.system_prompt, &context)
            .await
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Context assembly refused the question");
                return TurnReply::refused(e.to_string());
            }
        };
        let metadata = assembled.metadata.clone();

        // ── Step 4: Dispatch ──
        let answer = match self.dispatch.dispatch(provider, assembled.messages).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, provider, "LLM call failed");
                return TurnReply {
                    metadata: Some(metadata),
                    sources,
                    ..TurnReply::failed(e.to_string())
                };
            }
        };

        // ── Step 5: Remember ──
        self.assembler.add_exchange(query, answer.clone());
        info!(
            provider,
            total_tokens = metadata.total_tokens,
            utilization_pct = metadata.utilization_pct,
            history_turns = self.assembler.history().len(),
            "Question answered"
        );

        TurnReply {
            kind: ReplyKind::Answer,
            text: answer,
            sources,
            metadata: Some(metadata),
        }
    }

    /// The closest hit must be within `max_distance`.
    fn is_relevant(&self, hits: &[SearchHit]) -> bool {
        hits.iter()
            .map(|h| h.distance)
            .reduce(f32::min)
            .is_some_and(|best| best <= self.settings.max_distance)
    }
}
