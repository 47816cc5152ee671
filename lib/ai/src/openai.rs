//! OpenAI-compatible chat-completions adapter.
//!
//! Implements the [`TextGenerator`] seam over any endpoint that speaks
//! the `/chat/completions` wire format, including self-hosted gateways.

use crate::error::GeneratorError;
use crate::generator::{
    GenerateRequest, GenerationEvent, GenerationStream, TextGenerator, ToolCall, Turn,
};
use async_trait::async_trait;
use futures::StreamExt;
use jal_mittar_conversation::{MessageRole, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Generator backed by an OpenAI-compatible HTTP endpoint.
#[derive(Clone)]
pub struct OpenAiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiGenerator {
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

    async fn post_completions(
        &self,
        request: &GenerateRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GeneratorError> {
        let body = ApiRequest::build(&self.model, request, stream);
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| GeneratorError::RequestFailed {
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("generation request failed with status {status}"));
            return Err(GeneratorError::RequestFailed { reason });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GeneratorError> {
        let response = self.post_completions(&request, false).await?;
        let parsed: ApiResponse =
            response
                .json()
                .await
                .map_err(|err| GeneratorError::RequestFailed {
                    reason: err.to_string(),
                })?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::RequestFailed {
                reason: "generation response did not include choices".to_string(),
            })?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, GeneratorError> {
        let response = self.post_completions(&request, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            let mut content = String::new();
            let mut pending_calls: BTreeMap<u32, PartialToolCall> = BTreeMap::new();
            let mut finished = false;

            'outer: while let Some(item) = bytes.next().await {
                let chunk = item.map_err(|err| GeneratorError::StreamInterrupted {
                    reason: err.to_string(),
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();
                    if payload == "[DONE]" {
                        finished = true;
                        break 'outer;
                    }

                    let parsed: ApiStreamResponse = serde_json::from_str(payload)
                        .map_err(|err| GeneratorError::StreamInterrupted {
                            reason: format!("malformed stream payload: {err}"),
                        })?;
                    let Some(choice) = parsed.choices.into_iter().next() else {
                        continue;
                    };

                    if let Some(delta) = choice.delta.content {
                        if !delta.is_empty() {
                            content.push_str(&delta);
                            yield GenerationEvent::TextDelta(delta);
                        }
                    }
                    for delta_call in choice.delta.tool_calls.unwrap_or_default() {
                        let index = delta_call.index.unwrap_or(0);
                        let entry = pending_calls
                            .entry(index)
                            .or_insert_with(|| PartialToolCall {
                                id: format!("tool_call_{index}"),
                                name: String::new(),
                                arguments: String::new(),
                            });
                        if let Some(id) = delta_call.id {
                            entry.id = id;
                        }
                        if let Some(function) = delta_call.function {
                            if let Some(name) = function.name {
                                entry.name = name;
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }

            if !finished {
                tracing::debug!("generation stream ended without a [DONE] sentinel");
            }

            for call in pending_calls.into_values() {
                yield GenerationEvent::ToolCall(call.settle());
            }
            yield GenerationEvent::Completed { text: content };
        };

        Ok(Box::pin(stream))
    }
}

/// Tool-call fragments accumulated across stream deltas.
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn settle(self) -> ToolCall {
        let arguments = serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::json!({}));
        ToolCall::new(self.id, self.name, arguments)
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    stream: bool,
}

impl ApiRequest {
    fn build(model: &str, request: &GenerateRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(ApiMessage {
            role: "system",
            content: request.system.clone(),
        });
        messages.extend(request.turns.iter().map(ApiMessage::from_turn));

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(ApiTool::from_spec).collect())
        };

        Self {
            model: model.to_string(),
            messages,
            tools,
            stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

impl ApiMessage {
    fn from_turn(turn: &Turn) -> Self {
        let role = match turn.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiTool {
    r#type: &'static str,
    function: ApiFunction,
}

impl ApiTool {
    fn from_spec(spec: &ToolSpec) -> Self {
        Self {
            r#type: "function",
            function: ApiFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: JsonValue,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiAssistantMessage,
}

#[derive(Debug, Deserialize)]
struct ApiAssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamResponse {
    choices: Vec<ApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    delta: ApiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct ApiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiDeltaToolCall {
    index: Option<u32>,
    id: Option<String>,
    function: Option<ApiDeltaToolFunction>,
}

#[derive(Debug, Deserialize)]
struct ApiDeltaToolFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_leads_with_the_system_prompt() {
        let request = GenerateRequest::new("stay on topic")
            .with_turns(vec![Turn::user("hello"), Turn::assistant("hi")]);
        let body = ApiRequest::build("test-model", &request, true);

        assert_eq!(body.model, "test-model");
        assert!(body.stream);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "stay on topic");
        assert_eq!(body.messages[1].role, "user");
        assert_eq!(body.messages[2].role, "assistant");
        assert!(body.tools.is_none());
    }

    #[test]
    fn tool_specs_serialize_as_function_definitions() {
        let request = GenerateRequest::new("sys").with_tools(vec![ToolSpec::new(
            "status-check",
            "Check application status",
        )]);
        let body = ApiRequest::build("m", &request, false);
        let json = serde_json::to_value(&body).expect("serializable");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "status-check");
    }

    #[test]
    fn partial_tool_call_settles_with_parsed_arguments() {
        let call = PartialToolCall {
            id: "call_1".to_string(),
            name: "billing-lookup".to_string(),
            arguments: "{\"consumerCode\":\"1234567\"}".to_string(),
        };
        let settled = call.settle();
        assert_eq!(settled.arguments["consumerCode"], "1234567");

        let broken = PartialToolCall {
            id: "call_2".to_string(),
            name: "x".to_string(),
            arguments: "{not json".to_string(),
        };
        assert_eq!(broken.settle().arguments, serde_json::json!({}));
    }
}
