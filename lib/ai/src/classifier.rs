//! Single-shot relevance classification.
//!
//! One generation request with a fixed instruction asking for a strict
//! boolean verdict. The parse policy is fail-open: misclassifying an
//! in-domain question as irrelevant denies service, so every
//! inconclusive outcome resolves to relevant.

use crate::error::GeneratorError;
use crate::generator::{GenerateRequest, TextGenerator, Turn};
use crate::prompts::ROUTER_SYSTEM_PROMPT;
use serde::Deserialize;

/// The classifier's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the turn is in-domain.
    pub is_relevant: bool,
}

impl Verdict {
    /// The fail-open default: inconclusive classification counts as
    /// relevant.
    #[must_use]
    pub const fn fail_open() -> Self {
        Self { is_relevant: true }
    }
}

/// Expected structured verdict: `{"isRelevant": bool}` and nothing else.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireVerdict {
    #[serde(rename = "isRelevant")]
    is_relevant: bool,
}

/// Classifies whether the latest user turn is in-domain.
///
/// Never returns an error: generator failures and malformed verdicts
/// both take the fail-open branch.
pub async fn classify_relevance(generator: &dyn TextGenerator, latest_user_text: &str) -> Verdict {
    let request = GenerateRequest::new(ROUTER_SYSTEM_PROMPT)
        .with_turns(vec![Turn::user(latest_user_text)]);

    let text = match generator.generate(request).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "classifier generation failed, failing open");
            return Verdict::fail_open();
        }
    };

    parse_verdict(&text)
}

/// Parses the raw classifier output.
///
/// Malformed JSON or an unexpected shape is not an error condition:
/// it resolves through the named fail-open branch.
fn parse_verdict(text: &str) -> Verdict {
    match serde_json::from_str::<WireVerdict>(text.trim()) {
        Ok(wire) => Verdict {
            is_relevant: wire.is_relevant,
        },
        Err(_) => Verdict::fail_open(),
    }
}
