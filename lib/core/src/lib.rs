//! Core domain types for the jal-mittar chat relay.
//!
//! This crate provides the strongly-typed identifiers shared by every
//! other crate in the workspace.

pub mod id;

pub use id::{MessageId, ParseIdError, SessionId};
