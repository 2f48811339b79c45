//! Provider dispatch: selects and configures the LLM client for a provider id.
//!
//! Handles identifier parsing, API key resolution, client construction, and
//! turning provider failures into user-facing error text.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ragchat_config::AppConfig;
use ragchat_core::error::ProviderError;
use ragchat_core::message::Turn;
use ragchat_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The hosted providers RagChat can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Groq,
    OpenAi,
    Gemini,
    Deepseek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Groq,
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Deepseek,
    ];

    /// Config / CLI identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Deepseek => "deepseek",
        }
    }

    /// Name shown to users in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "Groq",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Deepseek => "Deepseek",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => crate::gemini::DEFAULT_BASE_URL,
            ProviderKind::Deepseek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.1-8b-instant",
            ProviderKind::OpenAi => "gpt-3.5-turbo",
            ProviderKind::Gemini => "gemini-pro",
            ProviderKind::Deepseek => "deepseek-chat",
        }
    }

    /// Environment variable consulted when the config file has no key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Deepseek => "DEEPSEEK_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "deepseek" => Ok(ProviderKind::Deepseek),
            _ => Err(DispatchError::UnknownProvider(s.to_string())),
        }
    }
}

/// Dispatch failures. `Display` is the text shown to the user.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("Error: Unknown API provider '{0}'. Supported providers: groq, openai, gemini, deepseek.")]
    UnknownProvider(String),

    #[error(
        "Error: {} API key not configured. Set {} or add it to ~/.ragchat/config.toml.",
        .0.id().to_uppercase(),
        .0.api_key_env()
    )]
    MissingApiKey(ProviderKind),

    #[error("Error: Failed to get response from {provider}: {source}")]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },
}

/// A ready-to-call client plus the model it should use.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub kind: ProviderKind,
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl ResolvedProvider {
    /// Run one completion and return the generated text.
    pub async fn complete_text(
        &self,
        messages: Vec<Turn>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, DispatchError> {
        let mut request =
            ProviderRequest::new(self.model.clone(), messages).with_temperature(temperature);
        if let Some(max) = max_tokens {
            request = request.with_max_tokens(max);
        }

        match self.provider.complete(request).await {
            Ok(resp) => {
                if let Some(usage) = &resp.usage {
                    debug!(
                        provider = self.kind.id(),
                        model = %resp.model,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion finished"
                    );
                }
                Ok(resp.message.content)
            }
            Err(source) => {
                warn!(provider = self.kind.id(), error = %source, "Provider call failed");
                Err(DispatchError::Provider {
                    provider: self.kind,
                    source,
                })
            }
        }
    }
}

/// Routes chat requests to the configured provider.
pub struct ProviderDispatch {
    config: AppConfig,
    registered: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderDispatch {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registered: HashMap::new(),
        }
    }

    /// Use a pre-built client for `kind` instead of constructing one from config.
    ///
    /// Registered clients skip API key resolution.
    pub fn register(&mut self, kind: ProviderKind, provider: Arc<dyn Provider>) {
        self.registered.insert(kind, provider);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Model for a provider: config override, else the provider default.
    pub fn model_for(&self, kind: ProviderKind) -> String {
        self.config
            .provider(kind.id())
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    /// Whether a usable API key (or registered client) exists for `kind`.
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.registered.contains_key(&kind) || self.config.api_key_for(kind.id()).is_some()
    }

    /// Resolve an identifier into a client. Never touches the network.
    pub fn resolve(&self, name: &str) -> Result<ResolvedProvider, DispatchError> {
        let kind: ProviderKind = name.parse()?;
        let model = self.model_for(kind);

        if let Some(provider) = self.registered.get(&kind) {
            return Ok(ResolvedProvider {
                kind,
                provider: Arc::clone(provider),
                model,
            });
        }

        let api_key = self
            .config
            .api_key_for(kind.id())
            .ok_or(DispatchError::MissingApiKey(kind))?;

        let base_url = self
            .config
            .provider(kind.id())
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| kind.default_base_url().to_string());

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::Gemini => {
                Arc::new(GeminiProvider::new(api_key).with_base_url(base_url))
            }
            _ => Arc::new(OpenAiCompatProvider::new(kind.id(), base_url, api_key)),
        };

        Ok(ResolvedProvider {
            kind,
            provider,
            model,
        })
    }

    /// Send `messages` to the named provider and return the answer text.
    pub async fn dispatch(&self, name: &str, messages: Vec<Turn>) -> Result<String, DispatchError> {
        let resolved = self.resolve(name)?;
        resolved
            .complete_text(messages, self.config.temperature, Some(self.config.max_tokens))
            .await
    }
}
