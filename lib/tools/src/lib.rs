//! External lookup adapters exposed as chat tools.
//!
//! Each adapter wraps one downstream government service and implements
//! the conversation [`Tool`](jal_mittar_conversation::Tool) seam:
//! input validation happens before any network call, and every failure
//! becomes a structured outcome the generator can explain to the user.

pub mod billing;
pub mod certificate;
pub mod knowledge;
pub mod retrieval;
pub mod signing;
pub mod status;

pub use billing::BillingLookupTool;
pub use certificate::{CertificateClient, CertificateDownloadTool, CertificateError};
pub use knowledge::KnowledgeSearchTool;
pub use retrieval::{
    Embedder, OpenAiEmbedder, QdrantSearch, RetrievalError, RetrievedChunk, SimilaritySearch,
};
pub use signing::BillingSigner;
pub use status::StatusCheckTool;
