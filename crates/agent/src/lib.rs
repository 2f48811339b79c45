//! The RagChat conversation engine.
//!
//! A [`ChatSession`] answers one question at a time:
//!
//! 1. **Retrieve** the closest document chunks
//! 2. **Assemble** a prompt that fits the token budget, degrading history
//!    and context when it does not
//! 3. **Dispatch** the prompt to the chosen LLM provider
//! 4. **Record** the exchange in the session history
//!
//! Each session owns its history; nothing is shared between sessions.

pub mod context;
pub mod prompt;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    AssembledPrompt, AssemblyError, AssemblyMetadata, BudgetConfig, ContextAssembler,
    DegradationStep, DeterministicSummarizer, HistoryStore, LlmSummarizer, Summarizer,
    TokenCounter,
};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, system_prompt};
pub use session::{ChatSession, NOT_ENOUGH_INFORMATION, ReplyKind, SessionSettings, TurnReply};
