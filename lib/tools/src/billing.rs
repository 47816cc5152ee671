//! Public billing lookup.
//!
//! Accepts the last 7 digits of a consumer code, signs the request,
//! and normalizes the portal's paise-denominated bill into a formatted
//! rupee amount, a paid flag, and a quick-payment deeplink.

use crate::signing::BillingSigner;
use async_trait::async_trait;
use jal_mittar_conversation::{Tool, ToolFailure, ToolOutcome, ToolSpec};
use serde_json::Value as JsonValue;

/// Looks up a water bill on the public billing portal.
pub struct BillingLookupTool {
    http: reqwest::Client,
    portal_base_url: String,
    signer: BillingSigner,
}

impl BillingLookupTool {
    #[must_use]
    pub fn new(http: reqwest::Client, portal_base_url: &str, signer: BillingSigner) -> Self {
        Self {
            http,
            portal_base_url: portal_base_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    /// Quick-payment portal deeplink for a consumer code.
    #[must_use]
    pub fn pay_now_url(&self, consumer_code: &str) -> String {
        format!(
            "{}/public-quick-payment-details/{consumer_code}",
            self.portal_base_url
        )
    }

    async fn lookup(&self, consumer_code: &str) -> ToolOutcome {
        let Some(headers) = self.signer.sign("") else {
            return ToolOutcome::Failed(ToolFailure::not_configured(
                "billing lookup is not configured on this deployment",
            ));
        };

        let url = format!(
            "{}/billing/api/public/billing/{consumer_code}",
            self.portal_base_url
        );
        let response = self
            .http
            .get(&url)
            .header("x-timestamp", &headers.timestamp)
            .header("x-nonce", &headers.nonce)
            .header("x-client-id", &headers.client_id)
            .header("x-signature", &headers.signature)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "billing portal unreachable");
                return ToolOutcome::Failed(ToolFailure::upstream(
                    "failed to fetch billing details",
                ));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            // The portal tends to respond with a structured JSON error.
            let message = serde_json::from_str::<JsonValue>(&body)
                .ok()
                .and_then(|parsed| {
                    parsed
                        .get("message")
                        .or_else(|| parsed.get("error"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("failed to fetch billing details ({status})"));
            return ToolOutcome::Failed(ToolFailure::upstream(message));
        }

        let parsed: JsonValue = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return ToolOutcome::Failed(ToolFailure::response_shape(
                    "billing response was not in the expected format",
                ));
            }
        };

        let bill = parsed.get("bill").cloned().unwrap_or(JsonValue::Null);
        let amount_due = bill
            .get("amount")
            .and_then(JsonValue::as_i64)
            .map(format_rupees_from_paise);
        let paid = bill
            .get("status")
            .and_then(JsonValue::as_str)
            .is_some_and(|status| status.eq_ignore_ascii_case("paid"));

        ToolOutcome::Ok(serde_json::json!({
            "consumerCode": consumer_code,
            "consumer": parsed.get("consumer").cloned().unwrap_or(JsonValue::Null),
            "bill": bill,
            "amountDue": amount_due,
            "paid": paid,
            "payNowUrl": self.pay_now_url(consumer_code),
        }))
    }
}

#[async_trait]
impl Tool for BillingLookupTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "billing-lookup",
            "Look up the current water bill for a consumer code (last 7 digits).",
        )
        .with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "consumerCode": {
                    "type": "string",
                    "description": "Exactly 7 decimal digits",
                    "pattern": "^[0-9]{7}$"
                }
            },
            "required": ["consumerCode"]
        }))
    }

    async fn execute(&self, input: JsonValue) -> ToolOutcome {
        let Some(consumer_code) = input.get("consumerCode").and_then(JsonValue::as_str) else {
            return ToolOutcome::Failed(ToolFailure::invalid_input("consumerCode is required"));
        };
        if !is_consumer_code(consumer_code) {
            return ToolOutcome::Failed(ToolFailure::invalid_input(
                "consumerCode must be exactly 7 digits",
            ));
        }
        self.lookup(consumer_code).await
    }
}

/// Exactly 7 decimal digits.
#[must_use]
pub fn is_consumer_code(value: &str) -> bool {
    value.len() == 7 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Formats a paise-denominated integer amount as rupees with Indian
/// digit grouping (last three digits, then pairs) and two decimals.
#[must_use]
pub fn format_rupees_from_paise(paise: i64) -> String {
    let negative = paise < 0;
    let paise = paise.unsigned_abs();
    let rupees = (paise / 100).to_string();
    let fraction = paise % 100;

    let grouped = if rupees.len() > 3 {
        let (head, tail) = rupees.split_at(rupees.len() - 3);
        let mut pairs = Vec::new();
        let mut end = head.len();
        while end > 2 {
            pairs.push(&head[end - 2..end]);
            end -= 2;
        }
        pairs.push(&head[..end]);
        pairs.reverse();
        format!("{},{tail}", pairs.join(","))
    } else {
        rupees
    };

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{fraction:02}")
}
