//! Single-slot send gate for a conversation client.
//!
//! A client composing messages holds at most one in-flight assistant
//! response. The composer makes that explicit: a new send is rejected
//! while one is outstanding, so no synchronization between overlapping
//! responses is ever needed.

use std::fmt;

use jal_mittar_core::MessageId;

/// Rejection raised when a send is attempted mid-response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// A previous send has not completed yet.
    SendInFlight { pending: MessageId },
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendInFlight { pending } => {
                write!(f, "a send is already in flight (pending message {pending})")
            }
        }
    }
}

impl std::error::Error for ComposeError {}

/// Tracks the single pending assistant message for one client.
#[derive(Debug, Default)]
pub struct Composer {
    pending: Option<MessageId>,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new in-flight response slot.
    ///
    /// Returns the placeholder id for the assistant message being
    /// streamed, or rejects if a response is already outstanding.
    pub fn begin(&mut self) -> Result<MessageId, ComposeError> {
        if let Some(pending) = self.pending {
            return Err(ComposeError::SendInFlight { pending });
        }
        let id = MessageId::new();
        self.pending = Some(id);
        Ok(id)
    }

    /// The currently outstanding assistant message, if any.
    #[must_use]
    pub fn pending(&self) -> Option<MessageId> {
        self.pending
    }

    /// Clears the slot once the response has settled (or failed).
    pub fn complete(&mut self) -> Option<MessageId> {
        self.pending.take()
    }
}
