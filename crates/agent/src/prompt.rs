//! System prompt for the retrieval-only assistant.

use ragchat_config::AppConfig;

/// Answer only from the retrieved context, in the question's language.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a document assistant. You answer questions using ONLY the information in the provided context.

Rules:
1. Use only facts stated in the context. Do not rely on outside knowledge.
2. If the context does not fully answer the question, reply exactly: \"I don't have enough information to answer this question.\"
3. Do not guess, speculate or fill gaps.
4. Answer in the same language as the question.
5. Keep answers concise and mention the source documents you used.";

/// The configured override, or [`DEFAULT_SYSTEM_PROMPT`].
pub fn system_prompt(config: &AppConfig) -> String {
    config
        .system_prompt_override
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string()
}
