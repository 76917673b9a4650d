//! Browser page hosting the chat widget.
//!
//! `GET /` creates a fresh widget and renders the page around it. The page
//! subscribes to the widget's patches on `/widget/{id}/events` and posts
//! gestures to `/widget/{id}/trigger`.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{
        Html, IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::AppState;
use crate::widget::{DomPatch, SendTrigger, escape_html};

/// Script applying patches in the browser.
pub const WIDGET_SCRIPT: &str = include_str!("../static/widget.js");

/// Generate the HTML page for widget `widget_id`.
#[must_use]
pub fn html_shell(title: &str, widget_id: &str) -> String {
    let title = escape_html(title);
    let widget_id = escape_html(widget_id);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0; background: #f4f4f5; }}
        #chat-widget {{ max-width: 40rem; margin: 2rem auto; display: flex; flex-direction: column; height: calc(100vh - 4rem); }}
        #chat-box {{ flex: 1; overflow-y: auto; padding: 1rem; background: #fff; border-radius: 0.75rem; }}
        .message {{ margin: 0.5rem 0; padding: 0.5rem 0.75rem; border-radius: 0.75rem; max-width: 80%; white-space: pre-wrap; }}
        .message.user {{ margin-left: auto; background: #2563eb; color: #fff; }}
        .message.bot {{ margin-right: auto; background: #e4e4e7; }}
        .input-row {{ display: flex; gap: 0.5rem; margin-top: 0.75rem; }}
        #user-input {{ flex: 1; padding: 0.6rem 0.75rem; border-radius: 0.75rem; border: 1px solid #d4d4d8; }}
        #send-btn {{ padding: 0.6rem 1rem; border-radius: 0.75rem; border: 0; background: #2563eb; color: #fff; cursor: pointer; }}
    </style>
</head>
<body>
    <div id="chat-widget" data-widget-id="{widget_id}">
        <div id="chat-box" aria-live="polite" aria-label="Chat messages"></div>
        <div class="input-row">
            <input id="user-input" type="text" placeholder="Type your message..." autocomplete="off" autofocus>
            <button id="send-btn" type="button">Send</button>
        </div>
    </div>
    <script src="/static/widget.js" defer></script>
</body>
</html>"#
    )
}

/// GET / - Create a widget and render its page.
pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let (id, _) = state.widgets.create();
    Html(html_shell("MCP Chat", &id))
}

/// GET /static/widget.js
pub async fn widget_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        WIDGET_SCRIPT,
    )
}

/// GET /widget/:id/events - Stream DOM patches as SSE.
///
/// Every connection starts by redrawing the transcript, so a page that
/// connects late or reconnects shows each message exactly once.
pub async fn widget_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let widget = state.widgets.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let (replayed, rx) = widget.attach_page();
    drop(widget);

    let stream = async_stream::stream! {
        for patch in replayed {
            yield Ok::<_, Infallible>(to_event(&patch));
        }

        let mut patches = BroadcastStream::new(rx);
        while let Some(item) = patches.next().await {
            match item {
                Ok(patch) => yield Ok(to_event(&patch)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    // The page reconnects and is redrawn.
                    tracing::warn!(
                        name: "widget.events.lagged",
                        widget_id = %id,
                        skipped,
                        "Page fell behind; closing its stream"
                    );
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_event(patch: &DomPatch) -> Event {
    Event::default().event(patch.event_name()).data(patch.data())
}

/// Body of `POST /widget/:id/trigger`.
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(flatten)]
    pub trigger: SendTrigger,
    /// Text field contents at the time of the gesture.
    #[serde(default)]
    pub value: String,
}

/// POST /widget/:id/trigger - Apply a gesture.
///
/// Replies `202 Accepted` once a send has started; the reply arrives later
/// as a patch. Gestures that do not send reply `204 No Content`.
pub async fn widget_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TriggerRequest>,
) -> StatusCode {
    let Some(widget) = state.widgets.get(&id) else {
        return StatusCode::NOT_FOUND;
    };

    if !req.trigger.fires_send() {
        return StatusCode::NO_CONTENT;
    }

    let value = req.value;
    match widget.begin_send_with(|view| view.sync_input(value)) {
        Ok(exchange) => {
            tokio::spawn(async move {
                let outcome = widget.resolve(exchange).await;
                tracing::debug!(
                    name: "widget.send.resolved",
                    widget_id = %id,
                    ?outcome,
                    "Send resolved"
                );
            });
            StatusCode::ACCEPTED
        }
        Err(outcome) => {
            tracing::debug!(name: "widget.send.skipped", widget_id = %id, ?outcome, "Send skipped");
            StatusCode::NO_CONTENT
        }
    }
}
