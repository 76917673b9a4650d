//! The chat widget: transcript plus send lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use crate::endpoint::{ChatEndpoint, Reply};
use crate::protocol::ChatRequest;

use super::message::{Message, Transcript};
use super::trigger::SendTrigger;
use super::view::ChatView;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "mistralai/mistral-7b-instruct:free";
/// Bot text shown when a call succeeds without an answer.
pub const DEFAULT_FALLBACK_TEXT: &str = "⚠️ No response";
/// Bot text shown when a call fails.
pub const DEFAULT_ERROR_TEXT: &str = "❌ MCP Server error!";

/// How sends started while another is outstanding are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Every send proceeds; replies land in completion order.
    #[default]
    Concurrent,
    /// A send is refused while an earlier one awaits its reply.
    SingleFlight,
}

/// Injected widget settings.
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub model: String,
    pub fallback_text: String,
    pub error_text: String,
    pub concurrency: ConcurrencyPolicy,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            error_text: DEFAULT_ERROR_TEXT.to_string(),
            concurrency: ConcurrencyPolicy::Concurrent,
        }
    }
}

/// What a send action ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was blank (or the gesture does not send); nothing happened.
    Ignored,
    /// Refused under [`ConcurrencyPolicy::SingleFlight`].
    Busy,
    /// The endpoint's answer was appended.
    Answered,
    /// The call succeeded without an answer; the fallback text was appended.
    Fallback,
    /// The call failed; the error text was appended.
    Failed,
}

/// A send that has been submitted and awaits its reply.
///
/// Produced by [`ChatWidget::begin_send`] and consumed by
/// [`ChatWidget::resolve`].
#[derive(Debug)]
pub struct Exchange {
    request: ChatRequest,
    _slot: Option<FlightSlot>,
}

impl Exchange {
    /// The outgoing request.
    #[must_use]
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

/// Holds the single-flight slot until dropped.
#[derive(Debug)]
struct FlightSlot(Arc<AtomicBool>);

impl Drop for FlightSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Surface<V> {
    view: V,
    transcript: Transcript,
}

impl<V: ChatView> Surface<V> {
    fn append(&mut self, message: Message) {
        self.view.append_message(&message);
        self.view.scroll_to_bottom();
        self.transcript.push(message);
    }
}

/// A chat widget bound to one view and one endpoint.
///
/// The view and transcript sit behind one lock that is never held across the
/// endpoint call, so several sends may be awaiting replies at once.
pub struct ChatWidget<V> {
    surface: Mutex<Surface<V>>,
    endpoint: Arc<dyn ChatEndpoint>,
    options: WidgetOptions,
    in_flight: Arc<AtomicBool>,
}

impl<V> std::fmt::Debug for ChatWidget<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<V: ChatView> ChatWidget<V> {
    /// Bind a widget to its view and endpoint.
    pub fn new(view: V, endpoint: Arc<dyn ChatEndpoint>, options: WidgetOptions) -> Self {
        Self {
            surface: Mutex::new(Surface {
                view,
                transcript: Transcript::new(),
            }),
            endpoint,
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn options(&self) -> &WidgetOptions {
        &self.options
    }

    fn lock(&self) -> MutexGuard<'_, Surface<V>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the transcript.
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    /// Run `f` against the view.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        f(&mut self.lock().view)
    }

    /// Run `f` against the view and the transcript under one lock.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut V, &Transcript) -> R) -> R {
        let mut surface = self.lock();
        let Surface { view, transcript } = &mut *surface;
        f(view, transcript)
    }

    /// Handle a gesture; only a click or a bare Enter sends.
    pub async fn handle(&self, trigger: &SendTrigger) -> SendOutcome {
        if !trigger.fires_send() {
            return SendOutcome::Ignored;
        }
        self.send_message().await
    }

    /// Submit the text field and wait for the reply.
    pub async fn send_message(&self) -> SendOutcome {
        match self.begin_send() {
            Ok(exchange) => self.resolve(exchange).await,
            Err(outcome) => outcome,
        }
    }

    /// Synchronous half of a send.
    ///
    /// Trims the field, appends the user message, clears the field and builds
    /// the request. Blank input yields `Err(Ignored)`.
    pub fn begin_send(&self) -> Result<Exchange, SendOutcome> {
        self.begin_send_with(|_| ())
    }

    /// Like [`begin_send`](Self::begin_send), but first lets `prepare` update
    /// the view under the same lock.
    pub fn begin_send_with(&self, prepare: impl FnOnce(&mut V)) -> Result<Exchange, SendOutcome> {
        let mut surface = self.lock();
        prepare(&mut surface.view);

        let raw = surface.view.input_value();
        let text = raw.trim();
        if text.is_empty() {
            return Err(SendOutcome::Ignored);
        }

        let slot = match self.options.concurrency {
            ConcurrencyPolicy::Concurrent => None,
            ConcurrencyPolicy::SingleFlight => {
                if self.in_flight.swap(true, Ordering::AcqRel) {
                    tracing::debug!(name: "widget.send.busy", "Send refused while a reply is pending");
                    return Err(SendOutcome::Busy);
                }
                Some(FlightSlot(Arc::clone(&self.in_flight)))
            }
        };

        let text = text.to_string();
        surface.append(Message::user(text.clone()));
        surface.view.clear_input();

        Ok(Exchange {
            request: ChatRequest::new(self.options.model.clone(), text),
            _slot: slot,
        })
    }

    /// Await the endpoint for `exchange` and append exactly one bot message.
    pub async fn resolve(&self, exchange: Exchange) -> SendOutcome {
        let result = self.endpoint.send(&exchange.request).await;

        let (message, outcome) = match result {
            Ok(Reply::Answer(text)) => (Message::bot(text), SendOutcome::Answered),
            Ok(Reply::Empty) => (
                Message::bot(self.options.fallback_text.clone()),
                SendOutcome::Fallback,
            ),
            Err(e) => {
                tracing::error!(
                    name: "widget.send.failed",
                    model = %exchange.request.model,
                    error = %e,
                    "Chat endpoint call failed"
                );
                (
                    Message::bot(self.options.error_text.clone()),
                    SendOutcome::Failed,
                )
            }
        };

        self.lock().append(message);
        drop(exchange);
        outcome
    }
}
