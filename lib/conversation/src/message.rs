//! Message types for chat sessions.
//!
//! Messages are append-only: once written to the log they are never
//! edited or deleted. The `text` field caches the flattened content of
//! the typed parts for fast retrieval and prompt assembly.

use chrono::{DateTime, Utc};
use jal_mittar_core::{MessageId, SessionId};
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user message.
    User,
    /// Assistant message.
    Assistant,
    /// System message.
    System,
}

impl MessageRole {
    /// Returns the uppercase form stored in the database.
    #[must_use]
    pub const fn as_db_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::System => "SYSTEM",
        }
    }

    /// Parses a stored role, case-insensitively.
    ///
    /// Unrecognized values normalize to `User`, matching how history
    /// rows are rendered back to clients.
    #[must_use]
    pub fn from_db_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ASSISTANT" => Self::Assistant,
            "SYSTEM" => Self::System,
            _ => Self::User,
        }
    }
}

/// One typed content part of a message.
///
/// Only text parts exist today; the tagged representation leaves room
/// for future part types without a storage migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    /// Plain text content.
    Text {
        /// The text fragment.
        text: String,
    },
}

impl MessagePart {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Flattens typed parts into the cached `text` representation.
///
/// The result is the in-order concatenation of every text part's
/// content. The message invariant requires `Message::text` to equal
/// this flattening of `Message::parts`.
#[must_use]
pub fn flatten_parts(parts: &[MessagePart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            MessagePart::Text { text } => out.push_str(text),
        }
    }
    out
}

/// A message in a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// The session this message belongs to.
    pub session_id: SessionId,
    /// Message role.
    pub role: MessageRole,
    /// Ordered, typed content parts.
    pub parts: Vec<MessagePart>,
    /// Flattened text, cached for fast retrieval.
    pub text: String,
    /// The caller identity that authored the message, if any.
    pub author_id: Option<String>,
    /// Insertion sequence within the log.
    ///
    /// Retrieval order is non-decreasing `created_at` with ties broken
    /// by this counter, never by wall clock alone.
    pub seq: i64,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// When the message was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Builds a message from typed parts, deriving the flattened text.
    #[must_use]
    pub fn from_parts(
        session_id: SessionId,
        role: MessageRole,
        parts: Vec<MessagePart>,
        author_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let text = flatten_parts(&parts);
        Self {
            id: MessageId::new(),
            session_id,
            role,
            parts,
            text,
            author_id,
            seq: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
