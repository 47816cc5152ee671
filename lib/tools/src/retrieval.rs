//! Vector retrieval seam.
//!
//! Embedding and similarity search are external collaborators behind
//! traits; the bundled search client speaks the Qdrant points-search
//! HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

const SEARCH_LIMIT: usize = 5;

/// One ranked chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
}

/// Errors raised by the retrieval collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The collaborator was unreachable or returned non-2xx.
    RequestFailed { reason: String },
    /// The collaborator's response did not match the expected shape.
    ResponseShape { reason: String },
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "retrieval request failed: {reason}"),
            Self::ResponseShape { reason } => {
                write!(f, "retrieval response shape invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for RetrievalError {}

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds one piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding collaborator fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Ranks knowledge-base chunks against an embedding vector.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Returns the top-ranked chunks for the vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the search collaborator fails.
    async fn search(&self, vector: &[f32]) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchPoint>,
}

#[derive(Debug, Deserialize)]
struct SearchPoint {
    score: f64,
    #[serde(default)]
    payload: Option<SearchPayload>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Qdrant-style points-search client.
pub struct QdrantSearch {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantSearch {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        collection: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl SimilaritySearch for QdrantSearch {
    async fn search(&self, vector: &[f32]) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let mut request = self.http.post(&url).json(&serde_json::json!({
            "vector": vector,
            "limit": SEARCH_LIMIT,
            "with_payload": true,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RetrievalError::RequestFailed {
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::RequestFailed {
                reason: format!("search returned {status}"),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|err| RetrievalError::ResponseShape {
                    reason: err.to_string(),
                })?;

        Ok(parsed
            .result
            .into_iter()
            .map(|point| RetrievedChunk {
                text: point.payload.and_then(|p| p.text).unwrap_or_default(),
                score: point.score,
            })
            .collect())
    }
}


/// Embedding client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbedder {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.http.post(&url).json(&serde_json::json!({
            "model": self.model,
            "input": text,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RetrievalError::RequestFailed {
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::RequestFailed {
                reason: format!("embedding returned {status}"),
            });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|err| RetrievalError::ResponseShape {
                    reason: err.to_string(),
                })?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| RetrievalError::ResponseShape {
                reason: "embedding response carried no vectors".to_string(),
            })
    }
}
