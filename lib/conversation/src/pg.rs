//! Postgres-backed session store and message log.

use crate::error::StoreError;
use crate::message::{Message, MessagePart, MessageRole};
use crate::session::{LanguagePreference, Session, SessionKind};
use crate::store::{MessageLog, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jal_mittar_core::{MessageId, SessionId};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    kind: String,
    language_preference: Option<String>,
    owner_id: Option<String>,
    metadata: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, StoreError> {
        let id = SessionId::from_str(&self.id).map_err(|e| StoreError::Decode {
            reason: format!("invalid session id '{}': {}", self.id, e),
        })?;
        let kind = SessionKind::from_db_str(&self.kind).ok_or_else(|| StoreError::Decode {
            reason: format!("invalid session kind '{}'", self.kind),
        })?;
        let language_preference = self
            .language_preference
            .as_deref()
            .and_then(LanguagePreference::from_db_str);

        Ok(Session {
            id,
            kind,
            language_preference,
            owner_id: self.owner_id,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres implementation of [`SessionStore`].
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new store over a shared connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, kind, language_preference, owner_id, metadata, created_at, updated_at
            FROM chat_sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_session()?)),
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        kind: SessionKind,
        language_preference: Option<LanguagePreference>,
        owner_id: Option<String>,
        metadata: Option<JsonValue>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(kind, language_preference, owner_id, metadata);

        sqlx::query(
            r#"
            INSERT INTO chat_sessions
                (id, kind, language_preference, owner_id, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.kind.as_db_str())
        .bind(session.language_preference.map(|l| l.as_db_str()))
        .bind(&session.owner_id)
        .bind(&session.metadata)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_by_owner(
        &self,
        kind: SessionKind,
        owner_id: &str,
    ) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, kind, language_preference, owner_id, metadata, created_at, updated_at
            FROM chat_sessions
            WHERE kind = $1 AND owner_id = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(kind.as_db_str())
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_session()?)),
            None => Ok(None),
        }
    }
}

/// Row type for message queries.
#[derive(FromRow)]
struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    parts: JsonValue,
    text: String,
    author_id: Option<String>,
    seq: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn try_into_message(self) -> Result<Message, StoreError> {
        let id = MessageId::from_str(&self.id).map_err(|e| StoreError::Decode {
            reason: format!("invalid message id '{}': {}", self.id, e),
        })?;
        let session_id = SessionId::from_str(&self.session_id).map_err(|e| StoreError::Decode {
            reason: format!("invalid session id '{}': {}", self.session_id, e),
        })?;
        let parts: Vec<MessagePart> =
            serde_json::from_value(self.parts).map_err(|e| StoreError::Decode {
                reason: format!("invalid message parts: {e}"),
            })?;

        Ok(Message {
            id,
            session_id,
            role: MessageRole::from_db_str(&self.role),
            parts,
            text: self.text,
            author_id: self.author_id,
            seq: self.seq,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres implementation of [`MessageLog`].
pub struct PgMessageLog {
    pool: PgPool,
}

impl PgMessageLog {
    /// Creates a new log over a shared connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLog for PgMessageLog {
    async fn append(
        &self,
        session_id: SessionId,
        role: MessageRole,
        parts: Vec<MessagePart>,
        text: String,
        author_id: Option<String>,
    ) -> Result<Message, StoreError> {
        let id = MessageId::new();
        let now = Utc::now();
        let parts_json = serde_json::to_value(&parts).map_err(|e| StoreError::Decode {
            reason: format!("failed to encode message parts: {e}"),
        })?;

        // seq comes from the database sequence so concurrent appends
        // across sessions keep a global insertion order.
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chat_messages
                (id, session_id, role, parts, text, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING seq
            "#,
        )
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(role.as_db_str())
        .bind(&parts_json)
        .bind(&text)
        .bind(&author_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message {
            id,
            session_id,
            role,
            parts,
            text,
            author_id,
            seq,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list(&self, session_id: SessionId) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, role, parts, text, author_id, seq, created_at, updated_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_message()).collect()
    }
}
