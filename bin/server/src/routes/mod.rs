//! HTTP route handlers.

pub mod certificate;
pub mod chat;
pub mod health;
