//! Google Gemini API provider.
//!
//! Differences from the OpenAI-compatible shape:
//! - Auth via the `x-goog-api-key` header
//! - System turns become a top-level `system_instruction`
//! - Roles are `"user"` / `"model"`, and consecutive same-role turns
//!   must be merged into one `contents` entry

use async_trait::async_trait;
use ragchat_core::error::ProviderError;
use ragchat_core::message::{Role, Turn};
use ragchat_core::provider::*;
use serde_json::Value;
use tracing::debug;

/// The default Google Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: crate::http_client(),
        }
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Build the JSON request body for the Gemini API.
    fn build_request_body(request: &ProviderRequest) -> Value {
        let (system_text, contents) = Self::to_gemini_contents(&request.messages);

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
            },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        if let Some(system) = system_text {
            body["system_instruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        body
    }

    /// Split turns into the system instruction and the `contents` array.
    ///
    /// System turns (prompt and summary alike) are joined with blank lines.
    /// Consecutive user or model turns are merged into one entry.
    fn to_gemini_contents(turns: &[Turn]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut last_role: Option<&'static str> = None;

        for turn in turns {
            let role = match turn.role {
                Role::System => {
                    system_parts.push(&turn.content);
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };

            let part = serde_json::json!({"text": turn.content});
            if last_role == Some(role) {
                if let Some(parts) = contents
                    .last_mut()
                    .and_then(|entry| entry["parts"].as_array_mut())
                {
                    parts.push(part);
                }
            } else {
                contents.push(serde_json::json!({"role": role, "parts": [part]}));
            }
            last_role = Some(role);
        }

        let system_text = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_text, contents)
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(body: &Value) -> std::result::Result<String, ProviderError> {
        let candidates = body["candidates"].as_array().ok_or_else(|| {
            ProviderError::MalformedResponse("Missing 'candidates' array in response".into())
        })?;

        let candidate = candidates.first().ok_or_else(|| {
            ProviderError::MalformedResponse("Empty 'candidates' array in response".into())
        })?;

        let parts = candidate["content"]["parts"].as_array().ok_or_else(|| {
            ProviderError::MalformedResponse("Missing 'parts' array in candidate content".into())
        })?;

        Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .concat())
    }

    fn parse_usage(body: &Value) -> Option<Usage> {
        let meta = body.get("usageMetadata")?;
        let prompt = meta["promptTokenCount"].as_u64().unwrap_or(0) as u32;
        let completion = meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32;
        Some(Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: meta["totalTokenCount"]
                .as_u64()
                .map(|t| t as u32)
                .unwrap_or(prompt + completion),
        })
    }

    fn map_http_error(status: u16, body_text: &str) -> ProviderError {
        match status {
            401 | 403 => ProviderError::AuthenticationFailed("Gemini rejected the API key".into()),
            429 => ProviderError::RateLimited {
                retry_after_secs: 30,
            },
            _ => ProviderError::ApiError {
                status_code: status,
                message: body_text.to_string(),
            },
        }
    }
}

#[async_trait]
impl ragchat_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_request_body(&request);
        let url = self.endpoint_url(&request.model);

        debug!(model = %request.model, turns = request.messages.len(), "Sending Gemini completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| {
                ProviderError::Network(format!("Failed to read response body: {}", e.without_url()))
            })?;

        if !(200..300).contains(&status) {
            return Err(Self::map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text)
            .map_err(|e| ProviderError::MalformedResponse(format!("Invalid JSON in response: {e}")))?;

        let text = Self::parse_response(&json)?;
        let model = json["modelVersion"]
            .as_str()
            .map(String::from)
            .unwrap_or(request.model);

        Ok(ProviderResponse {
            message: Turn::assistant(text),
            usage: Self::parse_usage(&json),
            model,
        })
    }
}
