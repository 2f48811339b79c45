//! Token-budgeted prompt assembly.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`token::TokenCounter`] | Counts tokens (BPE or heuristic) |
//! | [`history::HistoryStore`] | Ordered turns of one session |
//! | [`summarizer::Summarizer`] | Condenses older turns |
//! | [`assembler::ContextAssembler`] | Fits one question into the budget |

pub mod assembler;
pub mod history;
pub mod summarizer;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyError, AssemblyMetadata, BudgetConfig, ContextAssembler,
    DegradationStep, shrink_to_fit,
};
pub use history::HistoryStore;
pub use summarizer::{DeterministicSummarizer, LlmSummarizer, Summarizer, deterministic_summary};
pub use token::{TokenCounter, estimate_tokens};
