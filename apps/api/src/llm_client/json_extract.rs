//! Pulls a JSON payload out of free model text.
//!
//! Models wrap JSON in prose or code fences no matter how the prompt is phrased.
//! Fallback order: fenced block (```json first, then any fence) → whole text →
//! outermost `{…}` / `[…]` span.

use serde_json::Value;

/// Returns the first candidate span that parses as JSON.
pub fn extract_json_payload(text: &str) -> Option<Value> {
    candidates(text)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(block) = fenced_block(text, "```json") {
        out.push(block);
    }
    if let Some(block) = fenced_block(text, "```") {
        out.push(block);
    }
    out.push(text.trim());
    if let Some(span) = delimited_span(text, '{', '}') {
        out.push(span);
    }
    if let Some(span) = delimited_span(text, '[', ']') {
        out.push(span);
    }
    out
}

/// Content between `opener` and the next closing fence. Tolerates a missing close.
fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    // skip a language tag on the opening fence line (```JSON, ```javascript)
    let rest = match rest.find('\n') {
        Some(nl) if !rest[..nl].trim().contains(['{', '[']) => &rest[nl + 1..],
        _ => rest,
    };
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(body.trim())
}

fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
