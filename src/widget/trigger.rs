//! User gestures that may start a send.

use serde::Deserialize;

/// A gesture delivered by the widget surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "trigger", rename_all = "lowercase")]
pub enum SendTrigger {
    /// The send control was activated.
    Click,
    /// A key was pressed while the text field had focus.
    Key {
        key: String,
        #[serde(default)]
        shift: bool,
    },
}

impl SendTrigger {
    /// Plain Enter key press.
    #[must_use]
    pub fn enter() -> Self {
        Self::Key {
            key: "Enter".to_string(),
            shift: false,
        }
    }

    /// Whether this gesture submits the text field.
    ///
    /// Only a click or a bare Enter sends; Shift+Enter does not.
    #[must_use]
    pub fn fires_send(&self) -> bool {
        match self {
            Self::Click => true,
            Self::Key { key, shift } => key == "Enter" && !shift,
        }
    }
}
