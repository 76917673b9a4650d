//! The DOM surface the widget drives.

use super::message::Message;

/// Element-level operations the widget needs from its host page.
///
/// The widget acquires a view once at construction and owns it for its
/// lifetime. Implementations only mutate; all policy lives in the widget.
pub trait ChatView: Send {
    /// Current (untrimmed) contents of the text field.
    fn input_value(&self) -> String;

    /// Empty the text field.
    fn clear_input(&mut self);

    /// Render `message` as the last child of the transcript container,
    /// tagged with its sender and showing its text verbatim.
    fn append_message(&mut self, message: &Message);

    /// Scroll the transcript container to the bottom.
    fn scroll_to_bottom(&mut self);
}
