/*!
 * Lenient JSON parsing of model output.
 *
 * Models wrap JSON in code fences or prose, emit raw newlines inside strings,
 * use typographic quotes, or leave trailing commas. Parsing goes through
 * three attempts: the extracted block as-is, the repaired block, and the
 * repaired block cut at its last closing brace.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::GenerationError;

/// Trailing comma before a closing bracket or brace
static TRAILING_COMMA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",(\s*[}\]])").unwrap()
});

/// Typographic and single quotes
static QUOTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[“”‘’']").unwrap()
});

/// Extract the JSON object from a model response
///
/// Handles fenced blocks (with or without a language tag) and surrounding
/// prose. Returns the trimmed input when no object delimiters are found.
pub fn extract_json_block(response: &str) -> &str {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return trimmed;
    }

    // Fenced block, with or without a language tag
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body = after_fence.strip_prefix("json").unwrap_or(after_fence);
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if body.starts_with('{') {
            return body;
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Apply the textual repairs: flatten newlines, normalize quotes, drop trailing commas
pub fn repair_json(text: &str) -> String {
    let flattened = text.replace(['\n', '\r'], " ");
    let quoted = QUOTE_REGEX.replace_all(&flattened, "\"");
    TRAILING_COMMA_REGEX.replace_all(&quoted, "$1").into_owned()
}

/// Parse a model response into a JSON value
pub fn parse_lenient(response: &str) -> Result<Value, GenerationError> {
    let block = extract_json_block(response);

    let strict_error = match serde_json::from_str::<Value>(block) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!("Strict JSON parse failed ({}), attempting repair", strict_error);

    let repaired = repair_json(block);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        return Ok(value);
    }

    if let Some(last_brace) = repaired.rfind('}') {
        if let Ok(value) = serde_json::from_str::<Value>(&repaired[..=last_brace]) {
            return Ok(value);
        }
    }

    let preview: String = response.chars().take(200).collect();
    Err(GenerationError::MalformedJson(format!("{} (input: {})", strict_error, preview)))
}

/// Parse a model response and deserialize it into `T`
pub fn parse_lenient_as<T: DeserializeOwned>(response: &str) -> Result<T, GenerationError> {
    let value = parse_lenient(response)?;
    serde_json::from_value(value).map_err(|e| GenerationError::MalformedJson(e.to_string()))
}

/// Require a JSON object at the top level
pub fn expect_object(value: Value) -> Result<serde_json::Map<String, Value>, GenerationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GenerationError::MalformedJson(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}
