//! Raw model text → validated [`AnalysisResult`].
//!
//! Models often wrap JSON in Markdown fences despite being told not to. The
//! sanitizer strips those markers, parses what is left, and checks the one
//! structural guarantee the rest of the pipeline relies on: a `segments`
//! array.

use serde_json::Value;
use thiserror::Error;

use crate::types::AnalysisResult;

const FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

/// Why a provider's output could not be used.
///
/// Never carries the raw payload itself; callers log it separately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedResponse {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response is {0}, expected a JSON object")]
    NotAnObject(&'static str),
    #[error("response has no `segments` field")]
    MissingSegments,
    #[error("`segments` is {0}, expected an array")]
    SegmentsNotArray(&'static str),
    #[error("provider envelope is not valid JSON: {0}")]
    InvalidEnvelope(String),
    #[error("provider envelope has no generated text at {0}")]
    MissingText(&'static str),
}

/// Remove fence markers anywhere in the text, then trim.
///
/// Idempotent: after the second replacement no run of three backticks can
/// remain, so a second pass changes nothing.
pub fn sanitize(raw: &str) -> String {
    raw.replace(FENCE_OPEN, "")
        .replace(FENCE, "")
        .trim()
        .to_string()
}

/// Check the minimal shape: a non-null object with an array `segments`.
pub fn validate_shape(value: &Value) -> Result<(), MalformedResponse> {
    let Value::Object(map) = value else {
        return Err(MalformedResponse::NotAnObject(json_kind(value)));
    };
    match map.get("segments") {
        None => Err(MalformedResponse::MissingSegments),
        Some(Value::Array(_)) => Ok(()),
        Some(other) => Err(MalformedResponse::SegmentsNotArray(json_kind(other))),
    }
}

/// Sanitize, parse and shape-check a raw provider payload.
pub fn parse_response(raw: &str) -> Result<AnalysisResult, MalformedResponse> {
    let cleaned = sanitize(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;
    validate_shape(&value)?;
    serde_json::from_value(value).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
