//! The step-bounded generation/tool loop.
//!
//! One orchestrated request classifies the latest turn, selects a
//! system prompt variant, and then alternates generator calls with tool
//! executions until the generator stops requesting tools or the step
//! budget runs out. The budget bounds cost and latency; on exhaustion
//! the loop returns whatever answer has been produced so far.

use crate::classifier::classify_relevance;
use crate::error::GeneratorError;
use crate::generator::{GenerateRequest, GenerationEvent, TextGenerator, ToolCall, Turn};
use crate::prompts::{FAQ_SYSTEM_PROMPT, REDIRECT_SYSTEM_PROMPT};
use futures::{Stream, StreamExt};
use jal_mittar_conversation::{MessageRole, ToolFailure, ToolOutcome, ToolSet};
use std::pin::Pin;
use std::sync::Arc;

/// Maximum number of model⇄tool round trips per orchestrated request.
pub const STEP_BUDGET: usize = 5;

/// One event of an orchestrated chat turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// An incremental fragment of the visible answer.
    TextDelta(String),
    /// A tool invocation began.
    ToolStarted {
        /// Correlation id from the generator.
        id: String,
        /// Tool name.
        name: String,
    },
    /// A tool invocation finished.
    ToolFinished {
        /// Correlation id from the generator.
        id: String,
        /// Tool name.
        name: String,
        /// Whether the tool produced a success payload.
        ok: bool,
    },
    /// The turn settled; carries the complete answer text.
    Completed {
        /// Full reassembled answer.
        text: String,
    },
}

/// A pinned, sendable stream of chat events.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent, GeneratorError>> + Send>>;

/// Runs step-bounded chat turns against a generator and tool set.
#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
}

impl Orchestrator {
    /// Creates an orchestrator over the given generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Runs one orchestrated chat turn.
    ///
    /// `turns` is the full ordered history; the last user turn drives
    /// classification. Tool failures become structured results fed back
    /// to the generator and never abort the request.
    pub async fn run(&self, turns: Vec<Turn>, tools: ToolSet) -> ChatEventStream {
        let latest_user_text = turns
            .iter()
            .rev()
            .find(|t| t.role == MessageRole::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();

        let verdict = classify_relevance(self.generator.as_ref(), &latest_user_text).await;
        let system = if verdict.is_relevant {
            FAQ_SYSTEM_PROMPT
        } else {
            REDIRECT_SYSTEM_PROMPT
        };
        tracing::debug!(is_relevant = verdict.is_relevant, "selected prompt variant");

        let generator = Arc::clone(&self.generator);
        let stream = async_stream::try_stream! {
            let mut convo = turns;
            let mut answer = String::new();
            let mut steps = 0usize;

            loop {
                steps += 1;
                let request = GenerateRequest::new(system)
                    .with_turns(convo.clone())
                    .with_tools(tools.specs());
                let mut inner = generator.stream(request).await?;

                let mut step_text = String::new();
                let mut calls: Vec<ToolCall> = Vec::new();
                while let Some(event) = inner.next().await {
                    match event? {
                        GenerationEvent::TextDelta(delta) => {
                            step_text.push_str(&delta);
                            answer.push_str(&delta);
                            yield ChatEvent::TextDelta(delta);
                        }
                        GenerationEvent::ToolCall(call) => calls.push(call),
                        GenerationEvent::Completed { text } => {
                            // A generator may settle text it never
                            // streamed as deltas.
                            if step_text.is_empty() && !text.is_empty() {
                                step_text.push_str(&text);
                                answer.push_str(&text);
                                yield ChatEvent::TextDelta(text);
                            }
                        }
                    }
                }

                if !step_text.is_empty() {
                    convo.push(Turn::assistant(step_text));
                }

                if calls.is_empty() {
                    break;
                }
                if steps >= STEP_BUDGET {
                    tracing::debug!(steps, "step budget reached, settling with current answer");
                    break;
                }

                for call in calls {
                    yield ChatEvent::ToolStarted {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    };
                    let outcome = match tools.get(&call.name) {
                        Some(tool) => tool.execute(call.arguments.clone()).await,
                        None => ToolOutcome::Failed(ToolFailure::invalid_input(format!(
                            "unknown tool '{}'",
                            call.name
                        ))),
                    };
                    yield ChatEvent::ToolFinished {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        ok: outcome.is_ok(),
                    };
                    convo.push(Turn::system(format!(
                        "Tool result for {}: {}",
                        call.name,
                        outcome.to_json()
                    )));
                }
            }

            yield ChatEvent::Completed { text: answer };
        };

        Box::pin(stream)
    }
}
