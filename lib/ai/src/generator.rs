//! The text generator seam.
//!
//! The generation engine itself is an external collaborator: given a
//! system prompt, a plain-text turn history, and a tool set, it produces
//! an incremental event stream of text tokens and tool-call requests,
//! followed by a final settled text.

use crate::error::GeneratorError;
use async_trait::async_trait;
use futures::Stream;
use jal_mittar_conversation::{MessageRole, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::pin::Pin;

/// One role-tagged entry of the turn history handed to the generator.
///
/// Content is flattened plain text per turn; tool results re-enter the
/// history as system turns carrying the structured result JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// The speaker role.
    pub role: MessageRole,
    /// Flattened text content.
    pub content: String,
}

impl Turn {
    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Creates a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// A request to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// System prompt selecting the behavior variant.
    pub system: String,
    /// Ordered turn history.
    pub turns: Vec<Turn>,
    /// Tools the generator may request during this response.
    pub tools: Vec<ToolSpec>,
}

impl GenerateRequest {
    /// Creates a request with the given system prompt.
    #[must_use]
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            turns: Vec::new(),
            tools: Vec::new(),
        }
    }

    /// Sets the turn history.
    #[must_use]
    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = turns;
        self
    }

    /// Sets the available tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// A tool invocation requested by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier correlating the call with its result.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Structured arguments.
    pub arguments: JsonValue,
}

impl ToolCall {
    /// Creates a new tool call.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One event of the generator's incremental output.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// An incremental fragment of generated text.
    TextDelta(String),
    /// The generator requests a tool invocation.
    ToolCall(ToolCall),
    /// The response settled; carries the complete text of this step.
    Completed {
        /// The full text produced in this generation step.
        text: String,
    },
}

/// A pinned, sendable stream of generation events.
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GeneratorError>> + Send>>;

/// Trait for the black-box text generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Runs a single-shot generation and returns the settled text.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation request fails.
    async fn generate(&self, request: GenerateRequest) -> Result<String, GeneratorError>;

    /// Runs a streaming generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be started; mid-stream
    /// failures surface as `Err` items on the stream.
    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, GeneratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = GenerateRequest::new("be helpful")
            .with_turns(vec![Turn::user("hello")])
            .with_tools(vec![ToolSpec::new("status-check", "Check status")]);

        assert_eq!(request.system, "be helpful");
        assert_eq!(request.turns.len(), 1);
        assert_eq!(request.tools[0].name, "status-check");
    }

    #[test]
    fn turn_constructors_set_roles() {
        assert_eq!(Turn::user("a").role, MessageRole::User);
        assert_eq!(Turn::assistant("b").role, MessageRole::Assistant);
        assert_eq!(Turn::system("c").role, MessageRole::System);
    }
}
