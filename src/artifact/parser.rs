//! Extraction of code blocks and JSON payloads from model responses.
//!
//! Both extractors are total over their input: `extract_code` always returns
//! something, `extract_structured` returns a single well-defined error kind
//! that every caller is expected to recover from.
//!
//! ## Known edge case
//!
//! When no ```` ```json ```` fence is present, the structured candidate is the
//! span from the first `{` to the last `}`. This is not brace matching: two
//! independent objects in one response (`{"a":1} {"b":2}`) produce a span that
//! does not parse, and braces inside string literals can widen the span. The
//! behaviour is kept as-is so existing model prompts keep parsing the same way.
//!
//! The generic-fence fallback of `extract_code` drops the text on the opening
//! fence line when it is a single bare word such as `py` or `bash`. A block
//! written on one line has no newline after the fence and is kept whole.

use serde_json::Value;
use thiserror::Error;

/// Language tag used for code artifacts sent to the modeling host.
pub const DEFAULT_CODE_LANGUAGE: &str = "python";

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Errors from structured extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed structured data: {reason}")]
    Malformed { reason: String, candidate: String },

    #[error("Structured data is not an object: {0}")]
    NotAnObject(String),
}

impl ParseError {
    fn malformed(reason: impl Into<String>, candidate: &str) -> Self {
        ParseError::Malformed {
            reason: reason.into(),
            candidate: candidate.to_string(),
        }
    }
}

/// Pick the text that `extract_structured` will try to parse.
///
/// Order: first ```` ```json ```` fence (up to the next fence or end of text),
/// else first `{` through last `}`, else the trimmed input.
pub fn structured_candidate(text: &str) -> &str {
    if let Some(pos) = text.find(JSON_FENCE) {
        let body = &text[pos + JSON_FENCE.len()..];
        let end = body.find(FENCE).unwrap_or(body.len());
        return body[..end].trim();
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return &text[start..=end];
        }
        return "";
    }

    text.trim()
}

/// Extract a JSON value from model text.
pub fn extract_structured(text: &str) -> Result<Value, ParseError> {
    let candidate = structured_candidate(text);
    if candidate.is_empty() {
        return Err(ParseError::malformed("no structured payload found", candidate));
    }
    serde_json::from_str(candidate).map_err(|e| ParseError::malformed(e.to_string(), candidate))
}

/// Extract a JSON object from model text, rejecting arrays and scalars.
pub fn extract_structured_object(text: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    match extract_structured(text)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::NotAnObject(truncate(&other.to_string(), 80))),
    }
}

/// Extract the first python code block, falling back to a generic fence and
/// then to the trimmed text.
pub fn extract_code(text: &str) -> String {
    extract_code_with_language(text, DEFAULT_CODE_LANGUAGE)
}

/// Extract the first code block tagged with `language`.
///
/// Only the first matching block is returned; later blocks are ignored.
pub fn extract_code_with_language(text: &str, language: &str) -> String {
    let tag = format!("{}{}", FENCE, language);

    if let Some(body) = first_fenced_after(text, &tag) {
        return body.trim().to_string();
    }

    if let Some(body) = first_fenced_after(text, FENCE) {
        return strip_info_string(body).trim().to_string();
    }

    text.trim().to_string()
}

/// Drop a language tag left on the opening fence line (```` ```py ````).
fn strip_info_string(body: &str) -> &str {
    match body.split_once('\n') {
        Some((first, rest)) if is_language_tag(first.trim()) => rest,
        _ => body,
    }
}

fn is_language_tag(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#'))
}

/// Content between the first occurrence of `opener` and the next fence.
fn first_fenced_after<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    Some(&rest[..end])
}

/// Truncate text for diagnostics.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
