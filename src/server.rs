use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::{AppConfig, BackendKind};
use crate::endpoint::HttpChatEndpoint;
use crate::page;
use crate::protocol::{ChatReply, ChatRequest, HealthStatus};
use crate::relay::{CompletionsBackend, EchoBackend, ModelBackend, RelayError};
use crate::widget::WidgetStore;

/// Status text reported by `GET /health`.
pub const HEALTHY: &str = "✅ MCP server is healthy";
/// Body of `GET /logs` when there is no log file.
pub const NO_LOGS: &str = "🚫 No logs available.";
/// Body of `GET /logs` when the log file is empty.
pub const EMPTY_LOGS: &str = "📭 Log file is empty.";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let backend = build_backend(&config)?;
    let endpoint = build_endpoint(&config)?;

    info!(
        name: "relay.backend.selected",
        backend = backend.name(),
        upstream = %config.relay.base_url,
        "Relay backend selected"
    );
    info!(
        name: "widget.config.loaded",
        endpoint = %endpoint.url(),
        model = %config.widget.model,
        concurrency = ?config.widget.concurrency,
        "Widget configuration loaded"
    );

    let widgets = WidgetStore::new(
        Arc::new(endpoint),
        config.widget_options(),
        std::time::Duration::from_secs(config.widget.idle_timeout_secs),
    );

    let state = AppState {
        backend,
        widgets,
        config: Arc::clone(&config),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        platform = platform(),
        "✅ MCP Server started on {}",
        platform()
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Where the server is deployed, as reported at start-up.
pub fn platform() -> &'static str {
    platform_from(std::env::var("RENDER").ok().as_deref())
}

fn platform_from(render: Option<&str>) -> &'static str {
    if render == Some("true") { "Render" } else { "Local" }
}

/// Pick the relay backend named by the configuration.
pub fn build_backend(config: &AppConfig) -> Result<Arc<dyn ModelBackend>, RelayError> {
    let backend: Arc<dyn ModelBackend> = match config.relay_backend() {
        BackendKind::Completions => {
            Arc::new(CompletionsBackend::new(config.completions_settings())?)
        }
        BackendKind::Echo | BackendKind::Auto => Arc::new(EchoBackend),
    };
    Ok(backend)
}

/// Build the endpoint page widgets post to.
pub fn build_endpoint(config: &AppConfig) -> anyhow::Result<HttpChatEndpoint> {
    let url = config.widget_endpoint_url()?;
    let endpoint = match config.widget_timeout() {
        Some(timeout) => HttpChatEndpoint::with_timeout(url, timeout)?,
        None => HttpChatEndpoint::new(url),
    };
    Ok(endpoint)
}

/// Build the router for the relay and the widget page.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Relay
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/logs", get(logs))
        // Widget page
        .route("/", get(page::index_handler))
        .route("/static/widget.js", get(page::widget_script))
        .route("/widget/{id}/events", get(page::widget_events))
        .route("/widget/{id}/trigger", post(page::widget_trigger))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /health
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: HEALTHY.to_string(),
    })
}

/// POST /chat - Answer one prompt through the configured backend.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatReply>) {
    info!(
        name: "relay.request.received",
        model = %req.model,
        message = %req.message,
        "Request received"
    );

    match state.backend.reply(&req).await {
        Ok(reply) => {
            info!(name: "relay.response.sent", response = %reply, "Response");
            (StatusCode::OK, Json(ChatReply::answer(reply)))
        }
        Err(e) => {
            tracing::error!(
                name: "relay.response.failed",
                backend = state.backend.name(),
                error = %e,
                "Error"
            );
            (StatusCode::BAD_GATEWAY, Json(ChatReply::failure(e.to_string())))
        }
    }
}

/// GET /logs - Plain-text view of the log file.
async fn logs(State(state): State<AppState>) -> (StatusCode, String) {
    let Some(path) = state.config.logging.file.as_deref() else {
        return (StatusCode::OK, NO_LOGS.to_string());
    };

    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.is_empty() => (StatusCode::OK, EMPTY_LOGS.to_string()),
        Ok(content) => (StatusCode::OK, content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::OK, NO_LOGS.to_string())
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("❌ Error reading logs: {e}"),
        ),
    }
}
