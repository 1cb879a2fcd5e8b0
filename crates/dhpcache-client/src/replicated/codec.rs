//! Value encoding for the replicated backend.
//!
//! The server stores text, so structured values travel as JSON. Reading is
//! permissive: a payload that is not valid JSON is returned as the raw text,
//! which lets callers store plain strings (tokens, base64 blobs) and get
//! them back unchanged.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::transport::RawValue;

/// Encode a value for transmission. Strings go out as-is; everything else
/// is serialized as JSON text.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode a fetched payload. Never fails.
///
/// - absent or empty payload: `None`
/// - text: parsed as JSON, or returned verbatim as a string if that fails
/// - bytes: handled as text when valid UTF-8; otherwise parsed as JSON, or
///   returned as base64 text
pub fn decode_payload(raw: Option<RawValue>) -> Option<Value> {
    match raw? {
        RawValue::Text(text) => decode_text(text),
        RawValue::Bytes(bytes) if bytes.is_empty() => None,
        RawValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => decode_text(text),
            Err(e) => {
                let bytes = e.into_bytes();
                Some(
                    serde_json::from_slice(&bytes)
                        .unwrap_or_else(|_| Value::String(STANDARD.encode(&bytes))),
                )
            }
        },
    }
}

fn decode_text(text: String) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
