//! Integration tests for the relay routes and the widget page.

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode, header},
    routing::post,
};
use axum_test::TestServer;
use futures::StreamExt;
use mcp_chat::AppState;
use mcp_chat::config::AppConfig;
use mcp_chat::endpoint::HttpChatEndpoint;
use mcp_chat::protocol::{ChatReply, ChatRequest, HealthStatus};
use mcp_chat::relay::{
    CompletionsBackend, CompletionsSettings, EchoBackend, ModelBackend, RelayError,
};
use mcp_chat::server::{EMPTY_LOGS, HEALTHY, NO_LOGS, router};
use mcp_chat::widget::{
    DEFAULT_ERROR_TEXT, DEFAULT_IDLE_TIMEOUT, Message, WidgetOptions, WidgetStore,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// =============================================================================
// Test Utilities
// =============================================================================

struct FailingBackend;

#[async_trait::async_trait]
impl ModelBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn reply(&self, _request: &ChatRequest) -> Result<String, RelayError> {
        Err(RelayError::Status {
            status: 401,
            body: "No auth credentials found".into(),
        })
    }
}

fn base_config(log_file: Option<String>) -> AppConfig {
    let mut config = AppConfig::load_from_args(["mcp-chat"]).expect("default config");
    config.logging.file = log_file;
    config
}

/// Widgets in these states post to `endpoint_url`.
fn state_with(
    backend: Arc<dyn ModelBackend>,
    endpoint_url: &str,
    log_file: Option<String>,
) -> AppState {
    let endpoint = HttpChatEndpoint::new(Url::parse(endpoint_url).unwrap());
    AppState {
        backend,
        widgets: WidgetStore::new(
            Arc::new(endpoint),
            WidgetOptions::default(),
            DEFAULT_IDLE_TIMEOUT,
        ),
        config: Arc::new(base_config(log_file)),
    }
}

fn echo_state() -> AppState {
    state_with(Arc::new(EchoBackend), "http://127.0.0.1:9/chat", None)
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn widget_id(page: &str) -> String {
    let start = page.find(r#"data-widget-id=""#).expect("widget id attribute") + 16;
    let end = start + page[start..].find('"').unwrap();
    page[start..end].to_string()
}

/// Poll until `done` holds or a second has passed.
async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Read an SSE body until `done` holds for everything received so far.
async fn read_until(response: reqwest::Response, done: impl Fn(&str) -> bool) -> String {
    let mut body = response.bytes_stream();
    let mut seen = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if done(&seen) {
                return;
            }
        }
    })
    .await;
    assert!(read.is_ok(), "stream ended early: {seen}");
    seen
}

/// The redraw ends with a scroll after the last appended message.
fn redrawn(seen: &str, bots: usize) -> bool {
    seen.matches(r#"class="message bot""#).count() == bots
        && seen.rfind("event: scroll") > seen.rfind("event: append")
}

// =============================================================================
// Relay
// =============================================================================

#[tokio::test]
async fn test_health() {
    let server = TestServer::new(router(echo_state())).unwrap();

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<HealthStatus>().status, HEALTHY);
}

#[tokio::test]
async fn test_chat_echo() {
    let server = TestServer::new(router(echo_state())).unwrap();

    let response = server
        .post("/chat")
        .json(&json!({ "model": "m", "message": "ping" }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<ChatReply>(),
        ChatReply::answer("Echo from MCP Server: ping")
    );
}

#[tokio::test]
async fn test_chat_backend_failure_is_bad_gateway() {
    let state = state_with(Arc::new(FailingBackend), "http://127.0.0.1:9/chat", None);
    let server = TestServer::new(router(state)).unwrap();

    let response = server
        .post("/chat")
        .json(&json!({ "model": "m", "message": "ping" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let reply = response.json::<ChatReply>();
    assert_eq!(reply.response, None);
    assert_eq!(
        reply.error.as_deref(),
        Some("error from model: 401 - No auth credentials found")
    );
}

#[tokio::test]
async fn test_chat_rejects_missing_fields() {
    let server = TestServer::new(router(echo_state())).unwrap();

    let response = server
        .post("/chat")
        .json(&json!({ "message": "no model" }))
        .expect_failure()
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_logs_missing_empty_and_populated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mcp_logs.txt");
    let state = state_with(
        Arc::new(EchoBackend),
        "http://127.0.0.1:9/chat",
        Some(path.to_string_lossy().into_owned()),
    );
    let server = TestServer::new(router(state)).unwrap();

    assert_eq!(server.get("/logs").await.text(), NO_LOGS);

    std::fs::write(&path, "").unwrap();
    assert_eq!(server.get("/logs").await.text(), EMPTY_LOGS);

    std::fs::write(&path, "INFO Request received: m | ping\n").unwrap();
    assert_eq!(
        server.get("/logs").await.text(),
        "INFO Request received: m | ping\n"
    );
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let server = TestServer::new(router(echo_state())).unwrap();

    let response = server
        .get("/health")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://ui.example.com"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        response
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .to_str()
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_completions_backend_against_fake_upstream() {
    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(
            |headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth != "Bearer sk-test" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
                }
                let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
                (
                    StatusCode::OK,
                    Json(json!({
                        "choices": [ { "message": { "role": "assistant", "content": format!("  you said {prompt}\n") } } ]
                    })),
                )
            },
        ),
    );
    let addr = spawn(upstream).await;

    let settings = |key: &str| CompletionsSettings {
        base_url: format!("http://{addr}"),
        api_key: Some(key.to_string()),
        referer: None,
        timeout: Duration::from_secs(5),
    };

    let backend = CompletionsBackend::new(settings("sk-test")).unwrap();
    let reply = backend.reply(&ChatRequest::new("m", "hi")).await.unwrap();
    assert_eq!(reply, "you said hi");

    let backend = CompletionsBackend::new(settings("sk-wrong")).unwrap();
    let err = backend.reply(&ChatRequest::new("m", "hi")).await.unwrap_err();
    assert!(matches!(err, RelayError::Status { status: 401, .. }));
}

// =============================================================================
// Widget page
// =============================================================================

#[tokio::test]
async fn test_page_and_script_served() {
    let state = echo_state();
    let widgets = state.widgets.clone();
    let server = TestServer::new(router(state)).unwrap();

    let page = server.get("/").await;
    page.assert_status_ok();
    let id = widget_id(&page.text());
    assert!(widgets.get(&id).is_some());

    let script = server.get("/static/widget.js").await;
    script.assert_status_ok();
    assert!(script.text().contains("EventSource"));
}

#[tokio::test]
async fn test_reload_creates_a_fresh_widget() {
    let state = echo_state();
    let widgets = state.widgets.clone();
    let server = TestServer::new(router(state)).unwrap();

    let first = widget_id(&server.get("/").await.text());
    let second = widget_id(&server.get("/").await.text());

    assert_ne!(first, second);
    assert_eq!(widgets.len(), 2);
}

#[tokio::test]
async fn test_unknown_widget_is_not_found() {
    let server = TestServer::new(router(echo_state())).unwrap();

    server
        .post("/widget/nope/trigger")
        .json(&json!({ "trigger": "click", "value": "hi" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get("/widget/nope/events")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_sending_gestures_do_nothing() {
    let state = echo_state();
    let widgets = state.widgets.clone();
    let server = TestServer::new(router(state)).unwrap();
    let id = widget_id(&server.get("/").await.text());

    let gestures = [
        json!({ "trigger": "key", "key": "Enter", "shift": true, "value": "hi" }),
        json!({ "trigger": "key", "key": "a", "value": "hi" }),
        json!({ "trigger": "click", "value": "   " }),
    ];
    for gesture in gestures {
        server
            .post(&format!("/widget/{id}/trigger"))
            .json(&gesture)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    assert!(widgets.get(&id).unwrap().transcript().is_empty());
}

#[tokio::test]
async fn test_enter_round_trip_through_relay() {
    // The widget posts back to the relay on the same server.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = state_with(
        Arc::new(EchoBackend),
        &format!("http://{addr}/chat"),
        None,
    );
    let widgets = state.widgets.clone();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let page = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let id = widget_id(&page);

    let status = client
        .post(format!("http://{addr}/widget/{id}/trigger"))
        .json(&json!({ "trigger": "key", "key": "Enter", "shift": false, "value": "  hello  " }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::ACCEPTED);

    let widget = widgets.get(&id).unwrap();
    eventually(|| widget.transcript().len() == 2).await;
    assert_eq!(
        widget.transcript().messages(),
        &[
            Message::user("hello"),
            Message::bot("Echo from MCP Server: hello"),
        ]
    );
}

#[tokio::test]
async fn test_relay_failure_shows_error_text() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = state_with(
        Arc::new(FailingBackend),
        &format!("http://{addr}/chat"),
        None,
    );
    let widgets = state.widgets.clone();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (id, widget) = widgets.create();
    let status = reqwest::Client::new()
        .post(format!("http://{addr}/widget/{id}/trigger"))
        .json(&json!({ "trigger": "click", "value": "hello" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::ACCEPTED);

    eventually(|| widget.transcript().len() == 2).await;
    assert_eq!(
        widget.transcript().last(),
        Some(&Message::bot(DEFAULT_ERROR_TEXT))
    );
}

#[tokio::test]
async fn test_patches_stream_to_the_page() {
    let upstream = Router::new().route(
        "/chat",
        post(|| async { Json(json!({ "response": "<b>Hello</b>" })) }),
    );
    let upstream_addr = spawn(upstream).await;

    let state = state_with(
        Arc::new(EchoBackend),
        &format!("http://{upstream_addr}/chat"),
        None,
    );
    let widgets = state.widgets.clone();
    let addr = spawn(router(state)).await;
    let (id, _) = widgets.create();

    let client = reqwest::Client::new();
    let events = client
        .get(format!("http://{addr}/widget/{id}/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), reqwest::StatusCode::OK);
    let mut body = events.bytes_stream();

    client
        .post(format!("http://{addr}/widget/{id}/trigger"))
        .json(&json!({ "trigger": "click", "value": "hi" }))
        .send()
        .await
        .unwrap();

    let mut seen = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains(r#"class="message bot""#) {
                break;
            }
        }
    })
    .await;
    assert!(read.is_ok(), "bot patch not received: {seen}");

    assert!(seen.contains("event: append"));
    assert!(seen.contains(r#"<div class="message user">hi</div>"#));
    assert!(seen.contains("event: clear-input"));
    assert!(seen.contains("event: scroll"));
    assert!(seen.contains(r#"<div class="message bot">&lt;b&gt;Hello&lt;/b&gt;</div>"#));
}

#[tokio::test]
async fn test_late_page_is_redrawn() {
    let upstream = Router::new().route(
        "/chat",
        post(|| async { Json(json!({ "response": "Hello" })) }),
    );
    let upstream_addr = spawn(upstream).await;
    let state = state_with(
        Arc::new(EchoBackend),
        &format!("http://{upstream_addr}/chat"),
        None,
    );
    let widgets = state.widgets.clone();
    let addr = spawn(router(state)).await;

    // The reply lands before any page is listening.
    let (id, widget) = widgets.create();
    widget.with_view(|v| v.sync_input("hi"));
    widget.send_message().await;

    let events = reqwest::Client::new()
        .get(format!("http://{addr}/widget/{id}/events"))
        .send()
        .await
        .unwrap();
    let seen = read_until(events, |s| redrawn(s, 1)).await;

    let reset = seen.find("event: reset").expect("reset first");
    assert!(reset < seen.find("event: append").unwrap());
    assert_eq!(seen.matches(r#"<div class="message user">hi</div>"#).count(), 1);
    assert_eq!(seen.matches(r#"<div class="message bot">Hello</div>"#).count(), 1);
}

#[tokio::test]
async fn test_reconnecting_page_sees_each_message_once() {
    let upstream = Router::new().route(
        "/chat",
        post(|Json(req): Json<ChatRequest>| async move {
            Json(json!({ "response": format!("re: {}", req.message) }))
        }),
    );
    let upstream_addr = spawn(upstream).await;
    let state = state_with(
        Arc::new(EchoBackend),
        &format!("http://{upstream_addr}/chat"),
        None,
    );
    let widgets = state.widgets.clone();
    let addr = spawn(router(state)).await;
    let (id, widget) = widgets.create();
    let client = reqwest::Client::new();

    let first = client
        .get(format!("http://{addr}/widget/{id}/events"))
        .send()
        .await
        .unwrap();
    client
        .post(format!("http://{addr}/widget/{id}/trigger"))
        .json(&json!({ "trigger": "click", "value": "one" }))
        .send()
        .await
        .unwrap();
    let seen = read_until(first, |s| s.contains("re: one")).await;
    assert!(seen.contains(r#"<div class="message user">one</div>"#));

    // Connection dropped; the next reply resolves while the page is away.
    widget.with_view(|v| v.sync_input("two"));
    widget.send_message().await;

    let second = client
        .get(format!("http://{addr}/widget/{id}/events"))
        .send()
        .await
        .unwrap();
    let seen = read_until(second, |s| redrawn(s, 2)).await;

    assert!(seen.find("event: reset").unwrap() < seen.find("event: append").unwrap());
    for html in [
        r#"<div class="message user">one</div>"#,
        r#"<div class="message bot">re: one</div>"#,
        r#"<div class="message user">two</div>"#,
        r#"<div class="message bot">re: two</div>"#,
    ] {
        assert_eq!(seen.matches(html).count(), 1, "{html} in {seen}");
    }
}

#[tokio::test]
async fn test_open_page_keeps_its_widget() {
    let upstream = Router::new().route(
        "/chat",
        post(|| async { Json(json!({ "response": "still here" })) }),
    );
    let upstream_addr = spawn(upstream).await;
    let endpoint = HttpChatEndpoint::new(
        Url::parse(&format!("http://{upstream_addr}/chat")).unwrap(),
    );
    let widgets = WidgetStore::new(
        Arc::new(endpoint),
        WidgetOptions::default(),
        Duration::from_secs(60),
    );
    let state = AppState {
        backend: Arc::new(EchoBackend),
        widgets: widgets.clone(),
        config: Arc::new(base_config(None)),
    };
    let addr = spawn(router(state)).await;
    let (id, widget) = widgets.create();
    let client = reqwest::Client::new();

    let events = client
        .get(format!("http://{addr}/widget/{id}/events"))
        .send()
        .await
        .unwrap();
    eventually(|| widget.with_view(|v| v.has_subscribers())).await;

    let later = std::time::Instant::now() + Duration::from_secs(31 * 60);
    assert_eq!(widgets.prune_idle(later), 0);

    let status = client
        .post(format!("http://{addr}/widget/{id}/trigger"))
        .json(&json!({ "trigger": "key", "key": "Enter", "value": "ping" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::ACCEPTED);
    read_until(events, |s| s.contains("still here")).await;
}
