//! The chat widget and its surfaces.
//!
//! # Architecture
//!
//! - [`ChatWidget`]: transcript plus the send lifecycle
//! - [`ChatView`]: the DOM surface, injected once at construction
//! - [`HtmlView`]: a [`ChatView`] that streams [`DomPatch`]es to a browser page
//! - [`WidgetStore`]: one widget per open page
//!
//! # Example
//!
//! ```rust,ignore
//! let widget = ChatWidget::new(HtmlView::new(), endpoint, WidgetOptions::default());
//! widget.with_view(|v| v.sync_input("Hello!"));
//! let outcome = widget.handle(&SendTrigger::enter()).await;
//! ```

mod chat;
mod html;
mod message;
mod store;
mod trigger;
mod view;

pub use chat::{
    ChatWidget, ConcurrencyPolicy, DEFAULT_ERROR_TEXT, DEFAULT_FALLBACK_TEXT, DEFAULT_MODEL,
    Exchange, SendOutcome, WidgetOptions,
};
pub use html::{DomPatch, HtmlView, escape_html, render_message, replay};
pub use message::{Message, Sender, Transcript};
pub use store::{DEFAULT_IDLE_TIMEOUT, PageWidget, WidgetStore};
pub use trigger::SendTrigger;
pub use view::ChatView;
