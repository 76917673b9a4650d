//! The chat relay.
//!
//! The service the widget posts to. It accepts a [`ChatRequest`] and answers
//! through a [`ModelBackend`].
//!
//! # Backends
//!
//! - [`CompletionsBackend`]: OpenAI-compatible chat completions (OpenRouter by default)
//! - [`EchoBackend`]: repeats the message back, for running without an upstream

pub mod completions;
pub mod echo;
pub mod provider;

pub use completions::{CompletionsBackend, CompletionsSettings, DEFAULT_UPSTREAM_TIMEOUT};
pub use echo::EchoBackend;
pub use provider::Provider;

use thiserror::Error;

use crate::protocol::ChatRequest;

/// Relay failure while producing a reply.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Transport failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("error from model: {status} - {body}")]
    Status { status: u16, body: String },

    /// The upstream reply had no message content.
    #[error("upstream reply has no message content")]
    MissingContent,

    /// The backend is not usable as configured.
    #[error("relay configuration error: {0}")]
    Config(String),
}

/// Something that turns a prompt into generated text.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce a reply for `request`.
    async fn reply(&self, request: &ChatRequest) -> Result<String, RelayError>;
}
