//! Error types for the conversation crate.

use std::fmt;

/// Errors from session store and message log operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A database query failed.
    QueryFailed { reason: String },
    /// A stored row could not be decoded into a domain type.
    Decode { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed { reason } => write!(f, "store query failed: {reason}"),
            Self::Decode { reason } => write!(f, "store row decode failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::QueryFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::Decode {
            reason: "bad role".to_string(),
        };
        assert!(err.to_string().contains("bad role"));
    }
}
