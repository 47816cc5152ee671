//! Chat session records.
//!
//! A session is created lazily on first contact when no valid
//! identifying token is presented. Public sessions are anonymous;
//! private sessions belong to a caller identity.

use chrono::{DateTime, Utc};
use jal_mittar_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The visibility kind of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Anonymous public session; never has an owner.
    Public,
    /// Session tied to an authenticated caller identity.
    Private,
}

impl SessionKind {
    /// Returns the uppercase form stored in the database.
    #[must_use]
    pub const fn as_db_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
        }
    }

    /// Parses a stored kind, case-insensitively.
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Preferred conversation language recorded on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguagePreference {
    /// English.
    English,
    /// Hindi.
    Hindi,
    /// Code-mixed Hindi/English.
    Mixed,
}

impl LanguagePreference {
    /// Returns the uppercase form stored in the database.
    #[must_use]
    pub const fn as_db_str(&self) -> &'static str {
        match self {
            Self::English => "ENGLISH",
            Self::Hindi => "HINDI",
            Self::Mixed => "MIXED",
        }
    }

    /// Parses a stored preference, case-insensitively.
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ENGLISH" => Some(Self::English),
            "HINDI" => Some(Self::Hindi),
            "MIXED" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// A chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier; travels as an opaque cookie token.
    pub id: SessionId,
    /// Session kind.
    pub kind: SessionKind,
    /// Preferred language, if known.
    pub language_preference: Option<LanguagePreference>,
    /// Owning caller identity. Always `None` for public sessions,
    /// always `Some` for private sessions.
    pub owner_id: Option<String>,
    /// Opaque caller metadata.
    pub metadata: Option<JsonValue>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session record.
    #[must_use]
    pub fn new(
        kind: SessionKind,
        language_preference: Option<LanguagePreference>,
        owner_id: Option<String>,
        metadata: Option<JsonValue>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            kind,
            language_preference,
            owner_id,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the kind/owner pairing satisfies the ownership
    /// invariant: public sessions are ownerless, private sessions are
    /// owned.
    #[must_use]
    pub fn ownership_is_consistent(&self) -> bool {
        match self.kind {
            SessionKind::Public => self.owner_id.is_none(),
            SessionKind::Private => self.owner_id.is_some(),
        }
    }
}
