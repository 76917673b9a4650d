//! Chat endpoint abstraction.
//!
//! The widget never inspects transport details. It hands a [`ChatRequest`]
//! to a [`ChatEndpoint`] and gets back either a [`Reply`] or an
//! [`EndpointError`].
//!
//! # Implementations
//!
//! - [`HttpChatEndpoint`]: `POST` with a JSON body over reqwest

pub mod http;

pub use http::HttpChatEndpoint;

use thiserror::Error;

use crate::protocol::ChatRequest;

/// Successful outcome of a chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The endpoint produced a non-empty answer.
    Answer(String),
    /// The call succeeded but carried no usable answer.
    Empty,
}

impl Reply {
    /// Classify an optional response field.
    #[must_use]
    pub fn from_field(response: Option<String>) -> Self {
        match response {
            Some(text) if !text.is_empty() => Self::Answer(text),
            _ => Self::Empty,
        }
    }
}

/// Why a chat call failed.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// Connection, DNS or timeout failure at the transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The body could not be read as a chat reply.
    #[error("malformed reply: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A remote service that turns a prompt into a reply.
#[async_trait::async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Issue exactly one call for `request`.
    async fn send(&self, request: &ChatRequest) -> Result<Reply, EndpointError>;
}
