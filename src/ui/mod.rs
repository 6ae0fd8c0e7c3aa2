//! UI collaborator: confirmations, choices, focus, and the waiting indicator.
//!
//! The engine never renders anything. It asks a [`FormUi`] implementation to
//! show or hide the waiting indicator, confirm destructive actions, pick from
//! a list, and move focus. Implementations must be shareable across threads:
//! the waiting indicator is armed from a background timer.

pub mod messages;

use std::fmt;

use crate::error::OverflowWarning;

pub use messages::{DefaultMessages, Localizer, MessageKey};

// ---------------------------------------------------------------------------
// FocusTarget / Notice
// ---------------------------------------------------------------------------

/// Where focus should land.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FocusTarget {
    pub block: String,
    pub field: String,
    /// Active record of the block, if it has one.
    pub record: Option<usize>,
}

impl fmt::Display for FocusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record {
            Some(r) => write!(f, "{}.{}[{r}]", self.block, self.field),
            None => write!(f, "{}.{}", self.block, self.field),
        }
    }
}

/// Non-fatal information surfaced to the user, with its localized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A bulk load was truncated at its row cap.
    Overflow {
        warning: OverflowWarning,
        message: String,
    },
}

impl Notice {
    /// A [`Notice::Overflow`] worded by `messages`.
    pub fn overflow(warning: OverflowWarning, messages: &dyn Localizer) -> Self {
        Self::Overflow {
            warning,
            message: messages.message(MessageKey::QueryOverflow),
        }
    }

    pub fn key(&self) -> MessageKey {
        match self {
            Self::Overflow { .. } => MessageKey::QueryOverflow,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { message, .. } => f.write_str(message),
        }
    }
}

// ---------------------------------------------------------------------------
// FormUi
// ---------------------------------------------------------------------------

/// Everything the command engine needs from a user interface.
pub trait FormUi: Send + Sync {
    /// Ask a yes/no question.
    fn confirm(&self, prompt: MessageKey) -> bool;

    /// Show the busy indicator with a status message.
    fn show_wait_indicator(&self, message: &str);

    /// Hide the busy indicator. Called exactly once per protected call.
    fn hide_wait_indicator(&self);

    /// Let the user pick one of `options`. `None` means cancelled.
    fn present_choice(&self, title: MessageKey, options: &[String]) -> Option<usize>;

    /// Move keyboard focus.
    fn request_focus(&self, target: FocusTarget);

    /// Surface a non-fatal notice. Ignored by default.
    fn notify(&self, notice: Notice) {
        let _ = notice;
    }
}
