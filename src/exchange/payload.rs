//! Payload documents.
//!
//! The protocol treats payloads as opaque JSON objects. The only things it
//! looks at are the overall shape, identifying fields that must survive a
//! fallback substitution, and keys that would smuggle a raw query.

use serde_json::{Map, Value};
use thiserror::Error;

/// An exchange payload: a JSON object.
pub type Document = Map<String, Value>;

/// Keys that indicate a free-form query. Compared case-insensitively.
const FORBIDDEN_KEYS: &[&str] = &["sql", "query", "rawquery", "raw_query", "table", "tables", "statement"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is required")]
    Missing,
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload must be a JSON object")]
    NotAnObject,
}

/// Accept a payload given either as a JSON string or as an inline object.
pub fn parse_payload(raw: Option<&Value>) -> Result<Document, PayloadError> {
    match raw {
        None | Some(Value::Null) => Err(PayloadError::Missing),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(text)) => {
            match serde_json::from_str::<Value>(text)
                .map_err(|e| PayloadError::InvalidJson(e.to_string()))?
            {
                Value::Object(map) => Ok(map),
                _ => Err(PayloadError::NotAnObject),
            }
        }
        Some(_) => Err(PayloadError::NotAnObject),
    }
}

/// Serialize a payload for the wire (payloads travel as JSON strings).
pub fn encode_payload(doc: &Document) -> String {
    Value::Object(doc.clone()).to_string()
}

fn is_identifying_key(key: &str) -> bool {
    key == "id" || key.ends_with("Id") || key.ends_with("_id")
}

/// Top-level scalar fields that identify the entity a request is about,
/// e.g. `employeeId`. `extra` names additional keys to treat the same way.
pub fn identifying_fields(doc: &Document, extra: &[String]) -> Document {
    doc.iter()
        .filter(|(k, v)| {
            (is_identifying_key(k) || extra.iter().any(|e| e == *k))
                && matches!(v, Value::String(_) | Value::Number(_))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Find a key anywhere in `value` that names a raw query or table.
pub fn find_forbidden_key(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            let lowered = k.to_lowercase();
            if FORBIDDEN_KEYS.contains(&lowered.as_str()) {
                Some(k.clone())
            } else {
                find_forbidden_key(v)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_forbidden_key),
        _ => None,
    }
}
