//! LLM Provider implementations for RagChat.
//!
//! All providers implement the `ragchat_core::Provider` trait.
//! [`ProviderDispatch`] maps a provider identifier to a configured client.

pub mod dispatch;
pub mod gemini;
pub mod openai_compat;

pub use dispatch::{DispatchError, ProviderDispatch, ProviderKind, ResolvedProvider};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

/// HTTP client shared by the provider constructors.
///
/// Falls back to a default client if the builder rejects the timeout setup.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
            reqwest::Client::new()
        })
}
