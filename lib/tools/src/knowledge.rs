//! Knowledge-base search tool.
//!
//! Retrieval-augmented lookup over the service knowledge base: embed
//! the query, rank chunks by similarity, then run a grounded
//! generation pass over the retrieved context. Hindi queries first go
//! through a service-name extraction pass so the embedding matches the
//! indexed English service names.

use crate::retrieval::{Embedder, RetrievalError, RetrievedChunk, SimilaritySearch};
use async_trait::async_trait;
use jal_mittar_ai::{
    GenerateRequest, TextGenerator, Turn, CONTEXT_ANSWER_PROMPT, SERVICE_QUERY_EXTRACTION_PROMPT,
};
use jal_mittar_conversation::{LanguagePreference, Tool, ToolFailure, ToolOutcome, ToolSpec};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Searches the service knowledge base and answers from the results.
pub struct KnowledgeSearchTool {
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn SimilaritySearch>,
    language: Option<LanguagePreference>,
}

impl KnowledgeSearchTool {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn SimilaritySearch>,
        language: Option<LanguagePreference>,
    ) -> Self {
        Self {
            generator,
            embedder,
            search,
            language,
        }
    }

    /// Resolves the text actually embedded for retrieval.
    ///
    /// Hindi queries run an extraction pass that reduces the question
    /// to the service name; other languages embed the query as-is.
    async fn search_query(&self, query: &str) -> Result<String, ToolFailure> {
        if self.language != Some(LanguagePreference::Hindi) {
            return Ok(query.to_string());
        }
        let request = GenerateRequest::new(SERVICE_QUERY_EXTRACTION_PROMPT)
            .with_turns(vec![Turn::user(query)]);
        let extracted = self
            .generator
            .generate(request)
            .await
            .map_err(|err| ToolFailure::upstream(format!("query extraction failed: {err}")))?;
        let extracted = extracted.trim();
        if extracted.is_empty() {
            Ok(query.to_string())
        } else {
            Ok(extracted.to_string())
        }
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, ToolFailure> {
        let search_query = self.search_query(query).await?;
        let vector = self
            .embedder
            .embed(&search_query)
            .await
            .map_err(retrieval_failure)?;
        self.search
            .search(&vector)
            .await
            .map_err(retrieval_failure)
    }

    async fn answer(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<String, ToolFailure> {
        let context = chunks
            .iter()
            .map(|chunk| format!("- {}", chunk.text))
            .collect::<Vec<_>>()
            .join("\n");
        let request = GenerateRequest::new(CONTEXT_ANSWER_PROMPT)
            .with_turns(vec![Turn::user(format!(
                "Question: {query}\nContext:\n{context}"
            ))]);
        self.generator
            .generate(request)
            .await
            .map_err(|err| ToolFailure::upstream(format!("grounded generation failed: {err}")))
    }
}

fn retrieval_failure(err: RetrievalError) -> ToolFailure {
    match err {
        RetrievalError::RequestFailed { reason } => ToolFailure::upstream(reason),
        RetrievalError::ResponseShape { reason } => ToolFailure::response_shape(reason),
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "knowledge-search",
            "Search service information in the knowledge base and answer from it.",
        )
        .with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, input: JsonValue) -> ToolOutcome {
        let query = match input.get("query").and_then(JsonValue::as_str) {
            Some(query) if !query.trim().is_empty() => query,
            _ => {
                return ToolOutcome::Failed(ToolFailure::invalid_input(
                    "query must be a non-empty string",
                ));
            }
        };

        let chunks = match self.retrieve(query).await {
            Ok(chunks) => chunks,
            Err(failure) => return ToolOutcome::Failed(failure),
        };
        let answer = match self.answer(query, &chunks).await {
            Ok(answer) => answer,
            Err(failure) => return ToolOutcome::Failed(failure),
        };

        ToolOutcome::Ok(serde_json::json!({
            "chunks": chunks,
            "answer": answer,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jal_mittar_ai::{GenerationStream, GeneratorError};
    use std::sync::Mutex;

    /// Records requests and answers from a script keyed by system prompt.
    struct ScriptedGenerator {
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedGenerator {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: GenerateRequest) -> Result<String, GeneratorError> {
            let answer = if request.system == SERVICE_QUERY_EXTRACTION_PROMPT {
                "water connection".to_string()
            } else {
                "Apply through the portal.".to_string()
            };
            self.requests.lock().expect("lock").push(request);
            Ok(answer)
        }

        async fn stream(&self, _: GenerateRequest) -> Result<GenerationStream, GeneratorError> {
            unimplemented!("not used by these tests")
        }
    }

    struct FixedEmbedder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            self.seen.lock().expect("lock").push(text.to_string());
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    struct FixedSearch;

    #[async_trait]
    impl SimilaritySearch for FixedSearch {
        async fn search(&self, _: &[f32]) -> Result<Vec<RetrievedChunk>, RetrievalError> {
            Ok(vec![RetrievedChunk {
                text: "New connections are filed online.".to_string(),
                score: 0.9,
            }])
        }
    }

    fn tool(language: Option<LanguagePreference>) -> (Arc<ScriptedGenerator>, Arc<FixedEmbedder>, KnowledgeSearchTool) {
        let generator = Arc::new(ScriptedGenerator::new());
        let embedder = Arc::new(FixedEmbedder {
            seen: Mutex::new(Vec::new()),
        });
        let tool = KnowledgeSearchTool::new(
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            Arc::new(FixedSearch),
            language,
        );
        (generator, embedder, tool)
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (_, _, tool) = tool(None);
        let outcome = tool.execute(serde_json::json!({"query": "  "})).await;
        assert_eq!(
            outcome,
            ToolOutcome::Failed(ToolFailure::invalid_input(
                "query must be a non-empty string"
            ))
        );
    }

    #[tokio::test]
    async fn answer_is_grounded_in_retrieved_chunks() {
        let (generator, embedder, tool) = tool(None);
        let outcome = tool
            .execute(serde_json::json!({"query": "How do I get a new connection?"}))
            .await;

        let ToolOutcome::Ok(data) = outcome else {
            panic!("expected success");
        };
        assert_eq!(data["answer"], "Apply through the portal.");
        assert_eq!(data["chunks"][0]["text"], "New connections are filed online.");

        // The query is embedded as-is for non-Hindi sessions.
        assert_eq!(
            embedder.seen.lock().expect("lock").as_slice(),
            ["How do I get a new connection?"]
        );
        // One generation pass: the grounded answer.
        let requests = generator.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].turns[0].content.contains("Context:"));
    }

    #[tokio::test]
    async fn hindi_sessions_extract_the_service_name_before_embedding() {
        let (generator, embedder, tool) = tool(Some(LanguagePreference::Hindi));
        let outcome = tool
            .execute(serde_json::json!({"query": "नया कनेक्शन कैसे लें?"}))
            .await;
        assert!(outcome.is_ok());

        assert_eq!(
            embedder.seen.lock().expect("lock").as_slice(),
            ["water connection"]
        );
        let requests = generator.requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system, SERVICE_QUERY_EXTRACTION_PROMPT);
        assert_eq!(requests[1].system, CONTEXT_ANSWER_PROMPT);
    }
}
