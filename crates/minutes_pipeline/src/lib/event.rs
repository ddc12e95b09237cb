//! Inbound trigger events and the structured responses returned to the
//! invoking infrastructure.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PipelineError;

/// HTTP-style request delivered to the ingestion stage. `body` is either a
/// JSON object or a JSON-encoded string, depending on the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpEvent {
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub body: Option<Value>,
}

impl HttpEvent {
    pub fn with_json_body(body: Value) -> Self {
        Self {
            headers: Value::Null,
            body: Some(body),
        }
    }

    /// Resolves the body into a JSON value, decoding string bodies.
    pub fn json_body(&self) -> Result<Value, PipelineError> {
        match &self.body {
            None | Some(Value::Null) => Err(PipelineError::MalformedRequest(
                "Request body is missing.".into(),
            )),
            Some(Value::String(raw)) => Ok(serde_json::from_str(raw)?),
            Some(value) => Ok(value.clone()),
        }
    }
}

/// One message of a delivered queue batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<String>,
    pub body: String,
}

/// A batch of queue messages delivered to one stage invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

impl QueueBatch {
    pub fn from_value(event: Value) -> Result<Self, PipelineError> {
        Ok(serde_json::from_value(event)?)
    }
}

/// Structured result handed back to the invoking infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    pub status_code: u16,
    pub body: Value,
}

impl StageResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    /// Terse failure body. Diagnostics belong in the logs, not here.
    pub fn from_error(status_code: u16, err: &PipelineError) -> Self {
        Self {
            status_code,
            body: json!({
                "error": err.to_string(),
                "kind": err.kind(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Message ids reported for redelivery in a batch response.
    pub fn failed_item_ids(&self) -> Vec<String> {
        self.item_ids("batchItemFailures")
    }

    /// Message ids that failed permanently and must not be redelivered.
    pub fn rejected_item_ids(&self) -> Vec<String> {
        self.item_ids("rejectedItems")
    }

    fn item_ids(&self, field: &str) -> Vec<String> {
        self.body[field]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i["itemIdentifier"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
