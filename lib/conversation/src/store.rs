//! Storage traits for sessions and the append-only message log.
//!
//! The message log exclusively owns message lifecycle: messages are
//! written exactly once per turn and never mutated afterwards.

use crate::error::StoreError;
use crate::message::{Message, MessagePart, MessageRole};
use crate::session::{LanguagePreference, Session, SessionKind};
use async_trait::async_trait;
use jal_mittar_core::SessionId;
use serde_json::Value as JsonValue;

/// Durable session records keyed by opaque identifier.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up a session by ID.
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Creates a session with a fresh unique ID.
    ///
    /// Never fails on duplicate logical identity: concurrent creation
    /// races for the same owner may legitimately produce two sessions.
    async fn create(
        &self,
        kind: SessionKind,
        language_preference: Option<LanguagePreference>,
        owner_id: Option<String>,
        metadata: Option<JsonValue>,
    ) -> Result<Session, StoreError>;

    /// Resolves an existing session for `(kind, owner_id)`.
    ///
    /// Used when the caller's identifying token is missing or stale.
    async fn find_by_owner(
        &self,
        kind: SessionKind,
        owner_id: &str,
    ) -> Result<Option<Session>, StoreError>;
}

/// Durable, append-only per-session message history.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Appends one message to the log.
    ///
    /// Durability is independent of the caller's transport: an append
    /// must succeed (or fail) regardless of whether the connection that
    /// triggered it is still open.
    async fn append(
        &self,
        session_id: SessionId,
        role: MessageRole,
        parts: Vec<MessagePart>,
        text: String,
        author_id: Option<String>,
    ) -> Result<Message, StoreError>;

    /// Lists a session's messages in non-decreasing creation order,
    /// ties broken by insertion sequence.
    async fn list(&self, session_id: SessionId) -> Result<Vec<Message>, StoreError>;
}
