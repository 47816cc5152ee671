//! Tool seam for the orchestration loop.
//!
//! Each tool validates its own structured input before execution and
//! returns either a success payload or a structured failure. A tool
//! never raises out of the loop: failures are values the generator can
//! reason about and explain to the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Definition of a tool exposed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for input parameters.
    pub input_schema: JsonValue,
}

impl ToolSpec {
    /// Creates a new tool spec.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({}),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Failure classification for tool results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureCode {
    /// The model supplied input the tool rejected before doing work.
    InvalidInput,
    /// An external dependency returned non-2xx or was unreachable.
    UpstreamFetch,
    /// An external response body did not match the expected structure.
    ResponseShape,
    /// A required secret or credential is missing at call time.
    NotConfigured,
}

impl ToolFailureCode {
    /// Returns the wire code carried in structured failure results.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::UpstreamFetch => "UPSTREAM_FETCH_FAILED",
            Self::ResponseShape => "RESPONSE_SHAPE_INVALID",
            Self::NotConfigured => "NOT_CONFIGURED",
        }
    }
}

/// A structured tool failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Failure classification.
    pub code: ToolFailureCode,
    /// Human-readable failure message.
    pub message: String,
}

impl ToolFailure {
    /// Creates a failure with the given code and message.
    #[must_use]
    pub fn new(code: ToolFailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Invalid-input failure.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolFailureCode::InvalidInput, message)
    }

    /// Upstream-fetch failure.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolFailureCode::UpstreamFetch, message)
    }

    /// Response-shape failure.
    #[must_use]
    pub fn response_shape(message: impl Into<String>) -> Self {
        Self::new(ToolFailureCode::ResponseShape, message)
    }

    /// Not-configured failure.
    #[must_use]
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(ToolFailureCode::NotConfigured, message)
    }
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool succeeded with a JSON payload.
    Ok(JsonValue),
    /// The tool failed in a structured, recoverable way.
    Failed(ToolFailure),
}

impl ToolOutcome {
    /// Returns true for successful outcomes.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Renders the outcome as the JSON object fed back to the
    /// generator: `{ok: true, data}` or `{ok: false, code, message}`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Ok(data) => serde_json::json!({ "ok": true, "data": data }),
            Self::Failed(failure) => serde_json::json!({
                "ok": false,
                "code": failure.code.as_str(),
                "message": failure.message,
            }),
        }
    }
}

/// Trait for tools available during a chat turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool spec advertised to the generator.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with the given structured input.
    ///
    /// Implementations validate input themselves and convert every
    /// failure into a [`ToolOutcome::Failed`]; this method does not
    /// return an error.
    async fn execute(&self, input: JsonValue) -> ToolOutcome;
}

/// The set of tools bound to one orchestrated request.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    /// Creates an empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, keyed by its spec name.
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.spec().name, tool);
        self
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Returns the specs of every tool in the set.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
