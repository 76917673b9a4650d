//! MCP Chat
//!
//! A minimal chat widget and the relay service it talks to.
//!
//! # Architecture
//!
//! - **Widget**: transcript plus send lifecycle, driving an injected view and endpoint
//! - **Endpoint**: uniform result type over the `/chat` HTTP call
//! - **Page**: browser surface; the widget runs server side and streams DOM patches over SSE
//! - **Relay**: `/health`, `/chat`, `/logs`, backed by an OpenAI-compatible upstream or an echo
//!
//! # Modules
//!
//! - [`widget`]: chat widget, views and the per-page store
//! - [`endpoint`]: chat endpoint trait and HTTP implementation
//! - [`relay`]: model backends behind `/chat`
//! - [`protocol`]: wire types shared by both ends

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod endpoint;
pub mod page;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod telemetry;
pub mod widget;

use crate::config::AppConfig;

use relay::ModelBackend;
use std::sync::Arc;
use widget::WidgetStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend answering `/chat`.
    pub backend: Arc<dyn ModelBackend>,
    /// Widgets of open pages.
    pub widgets: WidgetStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend.name())
            .field("widgets", &self.widgets)
            .finish_non_exhaustive()
    }
}
