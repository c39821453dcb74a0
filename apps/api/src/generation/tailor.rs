//! Resume tailoring (tailor pass → copy-edit pass) and improvement suggestions.
//!
//! Both work on the sanitized professional content only. Tailored output is merged back
//! with the withheld personal info before it leaves this module.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::generation::prompts::{
    fill, PROOFREAD_PROMPT_TEMPLATE, PROOFREAD_SYSTEM, SUGGESTIONS_PROMPT_TEMPLATE, SUGGESTIONS_SYSTEM,
    TAILOR_PROMPT_TEMPLATE, TAILOR_SYSTEM,
};
use crate::generation::{
    complete_json, complete_text, conversation, new_request_id, to_json, FeatureError, Stage,
};
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PRIVACY_NOTE};
use crate::llm_client::providers::Operation;
use crate::llm_client::CompletionBackend;
use crate::privacy::{recombine, sanitize, strip_sensitive, PROFESSIONAL_SUMMARY_KEY};

/// Tailors `resume` to `jd_text` and returns the complete record, personal info restored.
///
/// The copy-edit pass receives the tailor pass's output verbatim. Either pass failing
/// aborts with an error naming that pass.
pub async fn tailor_resume(
    llm: &dyn CompletionBackend,
    resume: &Value,
    jd_text: &str,
) -> Result<Value, FeatureError> {
    let request_id = new_request_id();
    let safe = sanitize(resume);

    // Pass 1: tailor
    let prompt = fill(
        TAILOR_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("privacy_note", PRIVACY_NOTE),
            ("resume_json", to_json(&safe.professional_content).as_str()),
            ("job_description", jd_text),
        ],
    );
    let tailored = complete_json(
        llm,
        &conversation(TAILOR_SYSTEM, prompt),
        Operation::Tailoring,
        Stage::Tailoring,
        &request_id,
    )
    .await?;
    let tailored = expect_object(tailored, Stage::Tailoring, &request_id)?;
    info!("Tailor pass returned {} sections", tailored.len());

    // Pass 2: copy-edit
    let prompt = fill(PROOFREAD_PROMPT_TEMPLATE, &[("resume_json", to_json(&tailored).as_str())]);
    let proofread = complete_json(
        llm,
        &conversation(PROOFREAD_SYSTEM, prompt),
        Operation::Proofreading,
        Stage::Proofreading,
        &request_id,
    )
    .await?;
    let mut proofread = expect_object(proofread, Stage::Proofreading, &request_id)?;

    // Model output is untrusted: it may echo identifiers or drop sections.
    let echoed = strip_sensitive(&mut proofread);
    if !echoed.is_empty() {
        warn!(request_id = %request_id, "Removed {} identifying field(s) the model added", echoed.len());
    }
    restore_dropped_content(&mut proofread, &safe.professional_content, &request_id);
    lift_summary(&mut proofread, resume);

    info!(request_id = %request_id, "Resume tailored");
    Ok(recombine(&proofread, &safe.personal_info))
}

fn expect_object(
    value: Value,
    stage: Stage,
    request_id: &str,
) -> Result<Map<String, Value>, FeatureError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FeatureError::new(
            stage,
            format!("expected a JSON object, got {}", json_type(&other)),
            request_id,
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Puts back every top-level section the model dropped, and every list it shortened.
fn restore_dropped_content(
    output: &mut Map<String, Value>,
    original: &Map<String, Value>,
    request_id: &str,
) {
    for (key, original_value) in original {
        let restore = match (output.get(key), original_value) {
            (None, _) => true,
            (Some(Value::Array(now)), Value::Array(before)) => now.len() < before.len(),
            _ => false,
        };
        if restore {
            warn!(request_id = %request_id, "Model dropped content from '{key}'; restoring original");
            output.insert(key.clone(), original_value.clone());
        }
    }
}

/// A summary rewritten inside `professional_summary` becomes the top-level tailored
/// summary; the helper section itself never reaches the final record unless the
/// caller's resume had one.
fn lift_summary(output: &mut Map<String, Value>, resume: &Value) {
    if resume.get(PROFESSIONAL_SUMMARY_KEY).is_some() {
        return;
    }
    let Some(section) = output.remove(PROFESSIONAL_SUMMARY_KEY) else {
        return;
    };
    if !output.contains_key("summary") {
        if let Some(summary) = section.get("summary").filter(|s| s.is_string()) {
            output.insert("summary".to_string(), summary.clone());
        }
    }
}

/// Free-text advice for `resume` against `jd_text`. No JSON parsing.
pub async fn get_improvement_suggestions(
    llm: &dyn CompletionBackend,
    resume: &Value,
    jd_text: &str,
) -> Result<String, FeatureError> {
    let request_id = new_request_id();
    let safe = sanitize(resume);
    let prompt = fill(
        SUGGESTIONS_PROMPT_TEMPLATE,
        &[
            ("privacy_note", PRIVACY_NOTE),
            ("resume_json", to_json(&safe.professional_content).as_str()),
            ("job_description", jd_text),
        ],
    );
    let text = complete_text(
        llm,
        &conversation(SUGGESTIONS_SYSTEM, prompt),
        Operation::Suggestions,
        Stage::Generation,
        &request_id,
    )
    .await?;
    Ok(text.trim().to_string())
}
