//! Decoding of LLM completions into typed values.
//!
//! Models tend to wrap JSON in prose or markdown fences. Decoding first tries
//! the raw text; when that fails it retries on the span from the first `{`
//! to the last `}`. Collection decodes first try the span from the first `[`
//! to the last `]`, and may additionally accept a single object and wrap it,
//! for providers that answer a list request with one element.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

/// The substring from the first `{` to the last `}`, if both exist in order.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// The substring from the first `[` to the last `]`, if both exist in order.
pub fn extract_json_list(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

pub fn decode_one<T: DeserializeOwned>(text: &str) -> Result<T> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(direct) => {
            let Some(span) = extract_json(text) else {
                return Err(anyhow!("no JSON object in completion: {}", direct));
            };
            serde_json::from_str(span).map_err(|e| anyhow!("invalid JSON in completion: {}", e))
        }
    }
}

/// Decode a list of `T`.
///
/// With `wrap_single`, an extracted object that is not a list is decoded as
/// one `T` and returned as a one-element list.
pub fn decode_many<T: DeserializeOwned>(text: &str, wrap_single: bool) -> Result<Vec<T>> {
    if let Ok(values) = serde_json::from_str::<Vec<T>>(text) {
        return Ok(values);
    }
    if let Some(values) =
        extract_json_list(text).and_then(|list| serde_json::from_str::<Vec<T>>(list).ok())
    {
        return Ok(values);
    }
    let span = extract_json(text).ok_or_else(|| anyhow!("no JSON object in completion"))?;
    match serde_json::from_str::<Vec<T>>(span) {
        Ok(values) => Ok(values),
        Err(_) if wrap_single => {
            let single: T = serde_json::from_str(span)
                .map_err(|e| anyhow!("invalid JSON in completion: {}", e))?;
            Ok(vec![single])
        }
        Err(e) => Err(anyhow!("invalid JSON list in completion: {}", e)),
    }
}
