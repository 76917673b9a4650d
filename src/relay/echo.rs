//! Backend that repeats the prompt.

use crate::protocol::ChatRequest;

use super::{ModelBackend, RelayError};

/// Replies with `"Echo from MCP Server: <message>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

#[async_trait::async_trait]
impl ModelBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn reply(&self, request: &ChatRequest) -> Result<String, RelayError> {
        Ok(format!("Echo from MCP Server: {}", request.message))
    }
}
