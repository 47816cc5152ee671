//! Generation primitives for the jal-mittar chat relay.
//!
//! This crate provides:
//!
//! - **Generator seam**: the trait the black-box text generator sits
//!   behind, producing incremental event streams
//! - **Relevance classifier**: single-shot, fail-open domain judgment
//! - **Orchestrator**: the step-bounded generation/tool loop

pub mod classifier;
pub mod error;
pub mod generator;
pub mod openai;
pub mod orchestrator;
pub mod prompts;

pub use classifier::{classify_relevance, Verdict};
pub use error::GeneratorError;
pub use generator::{
    GenerateRequest, GenerationEvent, GenerationStream, TextGenerator, ToolCall, Turn,
};
pub use openai::OpenAiGenerator;
pub use orchestrator::{ChatEvent, ChatEventStream, Orchestrator, STEP_BUDGET};
pub use prompts::{
    CONTEXT_ANSWER_PROMPT, FAQ_SYSTEM_PROMPT, REDIRECT_SYSTEM_PROMPT, ROUTER_SYSTEM_PROMPT,
    SERVICE_QUERY_EXTRACTION_PROMPT,
};
