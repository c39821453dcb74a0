//! Reasoning-Output Filter: removes the "thinking" span some models emit before the answer.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));
static THINKING_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<thinking>.*?</thinking>").expect("valid regex"));

/// Model families known to emit thinking markup.
static REASONING_MODEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(deepseek-r1|qwq|qwen3|magistral|gpt-oss|phi-4-reasoning|reasoning|thinking|\br1\b)")
        .expect("valid regex")
});

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL.is_match(model)
}

/// Removes every `<think>…</think>` / `<thinking>…</thinking>` span and trims the rest.
///
/// Never discards the only content present: if nothing would remain, the input is
/// returned unchanged.
pub fn strip_reasoning(text: &str) -> String {
    let mut current = text.to_string();
    // removing one span can splice together the tags of another
    loop {
        let next = THINK_SPAN.replace_all(&current, "");
        let next = THINKING_SPAN.replace_all(&next, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    if current.len() == text.len() {
        return text.to_string();
    }

    let remainder = current.trim();
    if remainder.is_empty() {
        text.to_string()
    } else {
        remainder.to_string()
    }
}
