//! OpenAI-compatible chat completions backend.
//!
//! Sends the prompt as a single user message and returns the first choice's
//! content, trimmed. Non-streaming.

use std::time::Duration;

use crate::protocol::ChatRequest;

use super::{ModelBackend, Provider, RelayError};

/// Default upstream request timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream connection settings.
#[derive(Clone)]
pub struct CompletionsSettings {
    /// Base URL of the provider (e.g., `https://openrouter.ai`).
    pub base_url: String,
    /// Optional API key for bearer authentication.
    pub api_key: Option<String>,
    /// Value sent as `HTTP-Referer` to providers that use it.
    pub referer: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for CompletionsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionsSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("referer", &self.referer)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Backend calling `/chat/completions` on an OpenAI-compatible provider.
#[derive(Clone)]
pub struct CompletionsBackend {
    http: reqwest::Client,
    url: String,
    provider: Provider,
    settings: CompletionsSettings,
}

impl std::fmt::Debug for CompletionsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionsBackend")
            .field("url", &self.url)
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .finish()
    }
}

impl CompletionsBackend {
    /// Create a backend for the given settings.
    pub fn new(settings: CompletionsSettings) -> Result<Self, RelayError> {
        if settings.base_url.trim().is_empty() {
            return Err(RelayError::Config("upstream base URL cannot be empty".into()));
        }

        let provider = Provider::detect_from_url(&settings.base_url);
        let url = provider.build_chat_url(&settings.base_url);
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            url,
            provider,
            settings,
        })
    }

    /// Resolved chat completions URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ModelBackend for CompletionsBackend {
    fn name(&self) -> &'static str {
        "completions"
    }

    async fn reply(&self, request: &ChatRequest) -> Result<String, RelayError> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "user", "content": request.message }
            ]
        });

        let mut rb = self.http.post(&self.url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }
        if let Some(referer) = self.settings.referer.as_deref().filter(|_| self.provider.wants_referer()) {
            rb = rb.header("HTTP-Referer", referer);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let v: serde_json::Value = resp.json().await?;
        extract_content(&v)
    }
}

/// Pull `choices[0].message.content` out of a completion, trimmed.
fn extract_content(v: &serde_json::Value) -> Result<String, RelayError> {
    v["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or(RelayError::MissingContent)
}
