//! Conversation persistence for the jal-mittar chat relay.
//!
//! This crate provides:
//!
//! - **Session Store**: durable chat session records keyed by opaque ID
//! - **Message Log**: durable, append-only per-session message history
//! - **Tool seam**: the trait tools implement to join the orchestration loop

pub mod error;
pub mod memory;
pub mod message;
pub mod pg;
pub mod session;
pub mod store;
pub mod tool;

pub use error::StoreError;
pub use memory::{MemoryMessageLog, MemorySessionStore};
pub use message::{flatten_parts, Message, MessagePart, MessageRole};
pub use pg::{PgMessageLog, PgSessionStore};
pub use session::{LanguagePreference, Session, SessionKind};
pub use store::{MessageLog, SessionStore};
pub use tool::{Tool, ToolFailure, ToolFailureCode, ToolOutcome, ToolSet, ToolSpec};
