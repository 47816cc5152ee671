//! Incremental streaming wire protocol.
//!
//! The producer side (relay) converts the orchestrator's event stream
//! into either a framed event-stream body or a plain byte stream, and
//! guarantees the finalize callback fires exactly once on generator
//! completion. The consumer side decodes the wire back into ordered
//! text deltas plus a single completion signal.

pub mod composer;
pub mod consumer;
pub mod relay;

pub use composer::{ComposeError, Composer};
pub use consumer::{StreamConsumer, StreamUpdate};
pub use relay::{relay, FinishCallback, StreamMode};
