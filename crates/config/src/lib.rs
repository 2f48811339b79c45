//! Configuration loading, validation, and management for RagChat.
//!
//! Loads configuration from `~/.ragchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default LLM provider ("groq", "openai", "gemini", "deepseek")
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Sampling temperature for answers
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Replace the built-in retrieval-only system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Conversation memory / token budget
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Document retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// History summarization settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2048
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt_override", &self.system_prompt_override.is_some())
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .field("summarizer", &self.summarizer)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Token budget for the context assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Max tokens in the full assembled prompt
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Most-recent turns always kept verbatim
    #[serde(default = "default_recent_messages_limit")]
    pub recent_messages_limit: usize,

    /// Fraction of `token_limit` of history that triggers pre-emptive summarization
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: f64,

    /// Fraction of `token_limit` a single question may use
    #[serde(default = "default_question_threshold")]
    pub question_threshold: f64,
}

fn default_token_limit() -> usize {
    8000
}
fn default_recent_messages_limit() -> usize {
    3
}
fn default_summarize_threshold() -> f64 {
    0.7
}
fn default_question_threshold() -> f64 {
    0.2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            recent_messages_limit: default_recent_messages_limit(),
            summarize_threshold: default_summarize_threshold(),
            question_threshold: default_question_threshold(),
        }
    }
}

impl MemoryConfig {
    /// Check `token_limit > 0` and `0 < question_threshold < summarize_threshold <= 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_limit == 0 {
            return Err(ConfigError::ValidationError(
                "memory.token_limit must be > 0".into(),
            ));
        }
        let q = self.question_threshold;
        let s = self.summarize_threshold;
        if !(q > 0.0 && q < s && s <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "memory thresholds must satisfy 0 < question_threshold ({q}) < summarize_threshold ({s}) <= 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query
    #[serde(default = "default_n_results")]
    pub n_results: usize,

    /// Best hit must be at most this cosine distance away, otherwise "no information"
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,

    /// Chunk size in characters when ingesting documents
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Embedding model used when an OpenAI key is available
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_n_results() -> usize {
    3
}
fn default_max_distance() -> f32 {
    0.7
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            max_distance: default_max_distance(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Use an LLM for summaries (the deterministic digest is used otherwise)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider for summaries; defaults to the chat provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model for summaries; defaults to the provider's chat model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            model: None,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragchat/config.toml).
    ///
    /// Environment overrides:
    /// - `RAGCHAT_PROVIDER` : default provider
    /// - `RAGCHAT_MODEL` : model for the default provider
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("RAGCHAT_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("RAGCHAT_MODEL") {
            let name = config.default_provider.to_lowercase();
            config.providers.entry(name).or_default().model = Some(model);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        self.memory.validate()?;

        if self.retrieval.n_results == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.n_results must be > 0".into(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }

        Ok(())
    }

    /// Settings for a provider, if any were configured.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(&name.to_lowercase())
    }

    /// API key for a provider: config file first, then `<PROVIDER>_API_KEY`.
    ///
    /// Blank keys are treated as missing.
    pub fn api_key_for(&self, name: &str) -> Option<String> {
        fn usable(key: String) -> Option<String> {
            let key = key.trim();
            (!key.is_empty()).then(|| key.to_string())
        }

        let env_var = format!("{}_API_KEY", name.to_uppercase());
        self.provider(name)
            .and_then(|p| p.api_key.clone())
            .and_then(usable)
            .or_else(|| std::env::var(env_var).ok().and_then(usable))
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt_override: None,
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            summarizer: SummarizerConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
