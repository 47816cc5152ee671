//! Certificate retrieval.
//!
//! Two surfaces share the upstream e-district endpoint: the in-loop
//! tool, which verifies the certificate exists and returns metadata
//! plus a relay download link (a JSON tool result cannot carry the
//! PDF), and [`CertificateClient`], which the HTTP service uses to
//! stream the binary through its own download route.

use async_trait::async_trait;
use jal_mittar_conversation::{Tool, ToolFailure, ToolOutcome, ToolSpec};
use serde_json::Value as JsonValue;
use std::fmt;

/// Error raised when the upstream certificate fetch fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    UpstreamFetch { reason: String },
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamFetch { reason } => {
                write!(f, "certificate fetch failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CertificateError {}

/// Fetches certificates from the e-district service.
#[derive(Clone)]
pub struct CertificateClient {
    http: reqwest::Client,
    base_url: String,
}

impl CertificateClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetches the certificate document for an application number.
    ///
    /// Returns the raw upstream response so the caller can stream the
    /// body without buffering it.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream is unreachable or responds
    /// with non-2xx.
    pub async fn fetch(&self, application_number: &str) -> Result<reqwest::Response, CertificateError> {
        let url = format!("{}/certificate/public/{application_number}", self.base_url);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|err| CertificateError::UpstreamFetch {
                    reason: err.to_string(),
                })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CertificateError::UpstreamFetch {
                reason: format!("upstream returned {status}"),
            });
        }
        Ok(response)
    }
}

/// In-loop certificate lookup for the private chat flow.
///
/// The caller identity is bound at construction, never taken from the
/// generator's arguments.
pub struct CertificateDownloadTool {
    client: CertificateClient,
    user_id: String,
}

impl CertificateDownloadTool {
    #[must_use]
    pub fn new(client: CertificateClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// The relay route the end user downloads through.
    #[must_use]
    pub fn download_url(application_number: &str) -> String {
        format!("/api/private-chat/certificate/download/{application_number}")
    }
}

#[async_trait]
impl Tool for CertificateDownloadTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "certificate-download",
            "Fetch the issued certificate for an application and return its download link.",
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

        let response = match self.client.fetch(application_number).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, user_id = %self.user_id, "certificate fetch failed");
                return ToolOutcome::Failed(ToolFailure::upstream(
                    "failed to download certificate",
                ));
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/pdf")
            .to_string();
        let content_length = response.content_length();

        ToolOutcome::Ok(serde_json::json!({
            "applicationNumber": application_number,
            "downloadUrl": Self::download_url(application_number),
            "contentType": content_type,
            "contentLength": content_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_application_number_is_rejected() {
        let client = CertificateClient::new(reqwest::Client::new(), "http://edistrict.invalid");
        let tool = CertificateDownloadTool::new(client, "user-1");
        let outcome = tool.execute(serde_json::json!({"applicationNumber": ""})).await;
        assert_eq!(
            outcome,
            ToolOutcome::Failed(ToolFailure::invalid_input(
                "applicationNumber must be a non-empty string"
            ))
        );
    }

    #[test]
    fn download_url_points_at_the_relay_route() {
        assert_eq!(
            CertificateDownloadTool::download_url("UA-2024-0042"),
            "/api/private-chat/certificate/download/UA-2024-0042"
        );
    }
}
