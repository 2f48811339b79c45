//! Condensing older turns into a short prose summary.
//!
//! `summarize` never fails: the LLM-backed summarizer falls back to a
//! deterministic digest whenever the provider is missing, errors, or
//! returns nothing.

use async_trait::async_trait;
use ragchat_core::message::Turn;
use ragchat_providers::ResolvedProvider;
use tracing::{debug, warn};

/// Turns at the head and tail kept by the deterministic digest.
const DIGEST_EDGE: usize = 5;

/// Condenses turns into text under a soft token target.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, turns: &[Turn], max_tokens_hint: usize) -> String;
}

/// `User: …` / `Assistant: …` lines; long histories keep the first and
/// last five with an elision line in between.
pub fn deterministic_summary(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "No earlier conversation.".to_string();
    }

    let lines: Vec<String> = turns.iter().map(Turn::transcript_line).collect();
    if lines.len() <= DIGEST_EDGE * 2 {
        return lines.join("\n");
    }

    let omitted = lines.len() - DIGEST_EDGE * 2;
    format!(
        "{}\n... [{omitted} earlier turns omitted] ...\n{}\n\nIn total: {} turns summarized.",
        lines[..DIGEST_EDGE].join("\n"),
        lines[lines.len() - DIGEST_EDGE..].join("\n"),
        lines.len()
    )
}

/// Always uses [`deterministic_summary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicSummarizer;

#[async_trait]
impl Summarizer for DeterministicSummarizer {
    async fn summarize(&self, turns: &[Turn], _max_tokens_hint: usize) -> String {
        deterministic_summary(turns)
    }
}

/// Asks an LLM for the summary.
pub struct LlmSummarizer {
    provider: Option<ResolvedProvider>,
}

impl LlmSummarizer {
    pub fn new(provider: ResolvedProvider) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A summarizer with no provider; always uses the fallback.
    pub fn unavailable() -> Self {
        Self { provider: None }
    }

    fn prompt(turns: &[Turn], max_tokens_hint: usize) -> Vec<Turn> {
        let transcript: Vec<String> = turns.iter().map(Turn::transcript_line).collect();
        vec![
            Turn::system(format!(
                "You summarize conversations between a user and an assistant. \
                 Capture the main topics discussed, the questions asked and the answers given, \
                 in 50 to 200 words. Keep the summary under {max_tokens_hint} tokens. \
                 Reply with the summary text only."
            )),
            Turn::user(format!(
                "Summarize this conversation:\n\n{}",
                transcript.join("\n")
            )),
        ]
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, turns: &[Turn], max_tokens_hint: usize) -> String {
        if turns.is_empty() {
            return deterministic_summary(turns);
        }

        let Some(provider) = &self.provider else {
            warn!("No summarization provider configured, using deterministic summary");
            return deterministic_summary(turns);
        };

        let max_tokens = u32::try_from(max_tokens_hint).unwrap_or(u32::MAX);
        match provider
            .complete_text(Self::prompt(turns, max_tokens_hint), 0.0, Some(max_tokens))
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                debug!(turns = turns.len(), provider = provider.kind.id(), "LLM summary generated");
                text.trim().to_string()
            }
            Ok(_) => {
                warn!(provider = provider.kind.id(), "Empty summary from provider, using deterministic summary");
                deterministic_summary(turns)
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed, using deterministic summary");
                deterministic_summary(turns)
            }
        }
    }
}
