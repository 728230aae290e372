use anyhow::{Context, Result};
use serde_json::Value;

pub fn encode_value(value: &Value) -> Result<String> {
    serde_json::to_string(value).context("failed to encode child value")
}

/// Stored text that no longer parses as JSON is handed back as a plain string,
/// so one damaged row cannot fail the whole read.
pub fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
