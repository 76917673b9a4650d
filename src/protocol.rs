//! Wire types shared by the widget and the relay.
//!
//! The widget posts a [`ChatRequest`] and expects a [`ChatReply`] back. The
//! relay accepts the same request and produces the same reply, so both ends
//! of the `/chat` call agree on one definition.

use serde::{Deserialize, Serialize};

/// Outbound chat request: `{ "model": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Identifier of the target model.
    pub model: String,
    /// The user's (trimmed) text.
    pub message: String,
}

impl ChatRequest {
    /// Build a request for `model` carrying `message`.
    #[must_use]
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Reply body of the chat endpoint.
///
/// Both fields are optional on the wire. A missing or empty `response` is a
/// soft "no answer", not a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Generated text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Failure detail reported by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatReply {
    /// A reply carrying generated text.
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            error: None,
        }
    }

    /// A reply carrying only an error description.
    #[must_use]
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            response: None,
            error: Some(detail.into()),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
