//! Upstream provider detection.
//!
//! Providers differ in where the chat completions route lives and in which
//! extra headers they honour.

/// Supported upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mcp_chat::relay::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://openrouter.ai");
    /// assert_eq!(provider, Provider::OpenRouter);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// A base URL that already names the route is used as is.
    #[must_use]
    pub fn build_chat_url(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        if base.ends_with("/chat/completions") {
            return base.to_string();
        }

        match self {
            Self::OpenRouter => format!("{base}/api/v1/chat/completions"),
            Self::Groq => format!("{base}/openai/v1/chat/completions"),
            Self::OpenAI | Self::Generic => format!("{base}/v1/chat/completions"),
        }
    }

    /// Whether the provider reads the `HTTP-Referer` attribution header.
    #[must_use]
    pub fn wants_referer(self) -> bool {
        matches!(self, Self::OpenRouter)
    }
}
