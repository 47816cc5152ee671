//! Application status lookup.

use async_trait::async_trait;
use jal_mittar_conversation::{Tool, ToolFailure, ToolOutcome, ToolSpec};
use serde_json::Value as JsonValue;

/// Checks the processing status of a submitted application.
pub struct StatusCheckTool {
    http: reqwest::Client,
    api_base_url: String,
}

impl StatusCheckTool {
    #[must_use]
    pub fn new(http: reqwest::Client, api_base_url: &str) -> Self {
        Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, application_number: &str) -> ToolOutcome {
        let url = format!("{}/forms/status/{application_number}", self.api_base_url);
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "status service unreachable");
                return ToolOutcome::Failed(ToolFailure::upstream(
                    "failed to fetch application status",
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ToolOutcome::Failed(ToolFailure::upstream(format!(
                "failed to fetch application status ({status})"
            )));
        }

        let body: JsonValue = match response.json().await {
            Ok(body) => body,
            Err(_) => {
                return ToolOutcome::Failed(ToolFailure::response_shape(
                    "status response was not valid JSON",
                ));
            }
        };

        // Both fields must be present as strings; extra fields pass
        // through to the generator untouched.
        let well_formed = body.get("status").and_then(JsonValue::as_str).is_some()
            && body
                .get("applicationNumber")
                .and_then(JsonValue::as_str)
                .is_some();
        if !well_formed {
            return ToolOutcome::Failed(ToolFailure::response_shape(
                "status response missing status or applicationNumber",
            ));
        }

        ToolOutcome::Ok(body)
    }
}

#[async_trait]
impl Tool for StatusCheckTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "status-check",
            "Check application status for a given application number.",
        )
        .with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "applicationNumber": { "type": "string", "minLength": 1 }
            },
            "required": ["applicationNumber"]
        }))
    }

    async fn execute(&self, input: JsonValue) -> ToolOutcome {
        let application_number = match input.get("applicationNumber").and_then(JsonValue::as_str) {
            Some(number) if !number.trim().is_empty() => number.trim(),
            _ => {
                return ToolOutcome::Failed(ToolFailure::invalid_input(
                    "applicationNumber must be a non-empty string",
                ));
            }
        };
        self.fetch(application_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_application_number_is_rejected_before_fetching() {
        let tool = StatusCheckTool::new(reqwest::Client::new(), "http://status.invalid");
        for input in [
            serde_json::json!({}),
            serde_json::json!({"applicationNumber": ""}),
            serde_json::json!({"applicationNumber": "   "}),
            serde_json::json!({"applicationNumber": 42}),
        ] {
            let outcome = tool.execute(input).await;
            assert_eq!(
                outcome,
                ToolOutcome::Failed(ToolFailure::invalid_input(
                    "applicationNumber must be a non-empty string"
                ))
            );
        }
    }
}
