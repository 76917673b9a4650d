//! HTTP chat endpoint.
//!
//! Posts the request as JSON and interprets the reply body. Status and body
//! parsing are checked separately so a non-2xx answer is never confused with
//! an empty success.

use std::time::Duration;

use url::Url;

use crate::protocol::{ChatReply, ChatRequest};

use super::{ChatEndpoint, EndpointError, Reply};

/// Chat endpoint reached over HTTP.
#[derive(Clone)]
pub struct HttpChatEndpoint {
    http: reqwest::Client,
    url: Url,
}

impl std::fmt::Debug for HttpChatEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatEndpoint")
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl HttpChatEndpoint {
    /// Create an endpoint posting to `url`, with no request timeout.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// Create an endpoint whose calls give up after `timeout`.
    pub fn with_timeout(url: Url, timeout: Duration) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn send(&self, request: &ChatRequest) -> Result<Reply, EndpointError> {
        let resp = self.http.post(self.url.clone()).json(request).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatReply = serde_json::from_str(&body)?;
        if let Some(detail) = &reply.error {
            tracing::warn!(
                name: "endpoint.reply.error_field",
                url = %self.url,
                detail = %detail,
                "Endpoint reported an error in a successful reply"
            );
        }

        Ok(Reply::from_field(reply.response))
    }
}
