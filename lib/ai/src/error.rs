//! Error types for the generation crate.

use std::fmt;

/// Errors from the text generator seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// The generation request could not be sent.
    RequestFailed { reason: String },
    /// The generator's event stream broke mid-response.
    StreamInterrupted { reason: String },
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "generation request failed: {reason}"),
            Self::StreamInterrupted { reason } => {
                write!(f, "generation stream interrupted: {reason}")
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_error_display() {
        let err = GeneratorError::RequestFailed {
            reason: "timeout".to_string(),
        };
        assert!(err.to_string().contains("timeout"));
    }
}
