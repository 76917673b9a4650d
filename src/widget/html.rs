//! Browser surface for the widget.
//!
//! The widget runs on the server. [`HtmlView`] turns its element operations
//! into [`DomPatch`]es that are broadcast to the page, where `widget.js`
//! applies them to `#chat-box` and `#user-input`.

use tokio::sync::broadcast;

use super::chat::ChatWidget;
use super::message::{Message, Transcript};
use super::view::ChatView;

/// Patches buffered per page before slow subscribers start lagging.
const PATCH_CHANNEL_CAPACITY: usize = 64;

/// A DOM mutation for the page to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomPatch {
    /// Empty the transcript container before it is rebuilt.
    Reset,
    /// Append `html` as the last child of the transcript container.
    Append { html: String },
    /// Empty the text field.
    ClearInput,
    /// Scroll the transcript container to the bottom.
    ScrollToBottom,
}

impl DomPatch {
    /// SSE event name understood by `widget.js`.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Append { .. } => "append",
            Self::ClearInput => "clear-input",
            Self::ScrollToBottom => "scroll",
        }
    }

    /// SSE data payload.
    #[must_use]
    pub fn data(&self) -> &str {
        match self {
            Self::Append { html } => html,
            Self::Reset | Self::ClearInput | Self::ScrollToBottom => "",
        }
    }
}

/// [`ChatView`] backed by a browser page.
#[derive(Debug)]
pub struct HtmlView {
    input: String,
    patches: broadcast::Sender<DomPatch>,
}

impl Default for HtmlView {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlView {
    #[must_use]
    pub fn new() -> Self {
        let (patches, _) = broadcast::channel(PATCH_CHANNEL_CAPACITY);
        Self {
            input: String::new(),
            patches,
        }
    }

    /// Mirror the page's text field.
    pub fn sync_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Receive every patch published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomPatch> {
        self.patches.subscribe()
    }

    /// Whether a page is currently listening.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.patches.receiver_count() > 0
    }

    fn publish(&self, patch: DomPatch) {
        // No open page is not an error; the patch is simply dropped.
        let _ = self.patches.send(patch);
    }
}

impl ChatView for HtmlView {
    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.publish(DomPatch::ClearInput);
    }

    fn append_message(&mut self, message: &Message) {
        self.publish(DomPatch::Append {
            html: render_message(message),
        });
    }

    fn scroll_to_bottom(&mut self) {
        self.publish(DomPatch::ScrollToBottom);
    }
}

impl ChatWidget<HtmlView> {
    /// Attach a page to the widget.
    ///
    /// Returns the patches that rebuild the page's transcript from scratch
    /// and a receiver for everything published afterwards. Both are taken
    /// under the widget lock, so no message is missed or repeated.
    #[must_use]
    pub fn attach_page(&self) -> (Vec<DomPatch>, broadcast::Receiver<DomPatch>) {
        self.with_surface(|view, transcript| (replay(transcript), view.subscribe()))
    }
}

/// Patches that redraw `transcript` on a page.
#[must_use]
pub fn replay(transcript: &Transcript) -> Vec<DomPatch> {
    let mut patches = Vec::with_capacity(transcript.len() + 2);
    patches.push(DomPatch::Reset);
    patches.extend(transcript.messages().iter().map(|message| DomPatch::Append {
        html: render_message(message),
    }));
    patches.push(DomPatch::ScrollToBottom);
    patches
}

/// Render a message element. The text is escaped, never interpreted.
#[must_use]
pub fn render_message(message: &Message) -> String {
    format!(
        r#"<div class="message {}">{}</div>"#,
        message.sender(),
        escape_html(message.text())
    )
}

/// Escape text for use as HTML element content or a quoted attribute.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
