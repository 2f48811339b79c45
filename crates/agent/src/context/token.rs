//! Token counting.
//!
//! Prefers a real BPE (`cl100k_base`, or the configured model's encoding
//! when tiktoken knows it). When no BPE can be loaded, falls back to a
//! character heuristic: ~4 bytes per token, rounded up.

use std::sync::Arc;

use ragchat_core::message::Turn;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Counts tokens for budget decisions. Cheap to clone.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
}

impl TokenCounter {
    /// The `cl100k_base` encoding, or the heuristic if it cannot be loaded.
    pub fn cl100k() -> Self {
        match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Self {
                bpe: Some(Arc::new(bpe)),
            },
            Err(e) => {
                warn!(error = %e, "cl100k_base unavailable, using character heuristic");
                Self::heuristic()
            }
        }
    }

    /// The model's own encoding when tiktoken knows the model, else `cl100k_base`.
    pub fn for_model(model: &str) -> Self {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Self {
                bpe: Some(Arc::new(bpe)),
            },
            Err(_) => Self::cl100k(),
        }
    }

    /// Character heuristic only. Deterministic and dependency-free.
    pub fn heuristic() -> Self {
        Self { bpe: None }
    }

    /// Whether counts come from a real BPE.
    pub fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }

    /// Count tokens in `text`. Zero only for the empty string.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len().max(1),
            None => estimate_tokens(text),
        }
    }

    /// Sum of content tokens over `turns`. Roles and framing are not counted.
    pub fn count_turns(&self, turns: &[Turn]) -> usize {
        turns.iter().map(|t| self.count(&t.content)).sum()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .finish()
    }
}
