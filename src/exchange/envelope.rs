//! Inbound wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /exchange`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(default)]
    pub requester_name: Option<String>,
    /// JSON string or inline object.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl InboundEnvelope {
    pub fn new(requester_name: impl Into<String>, payload: Value) -> Self {
        Self {
            requester_name: Some(requester_name.into()),
            payload: Some(payload),
        }
    }
}

/// Successful exchange answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub success: bool,
    pub service_name: String,
    /// JSON-encoded payload document.
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Failure body shared by every error status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
