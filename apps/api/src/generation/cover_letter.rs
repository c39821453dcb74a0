//! Cover Letter Generation: analyse → sanitize → match → generate → clean.
//!
//! The model only ever writes the letter body. Header, greeting and signature are the
//! document-composition step's job; whatever of them the model adds anyway is removed
//! by `post_process::clean`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::generation::jd_parser::{
    analyze_job_description, extract_company_name, extract_job_position, JobAnalysis,
    UNKNOWN_COMPANY, UNKNOWN_POSITION,
};
use crate::generation::post_process::clean;
use crate::generation::prompts::{fill, COVER_LETTER_PROMPT_TEMPLATE, COVER_LETTER_SYSTEM};
use crate::generation::skills::identify_relevant_skills;
use crate::generation::{complete_text, conversation, new_request_id, to_json, FeatureError, Stage};
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PRIVACY_NOTE};
use crate::llm_client::providers::Operation;
use crate::llm_client::CompletionBackend;
use crate::privacy::sanitize;

const GENERIC_GREETING: &str = "Dear Hiring Manager,";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetterResult {
    pub body_content: String,
    pub company_name: String,
    pub job_position: String,
    pub letter_title: String,
    pub recipient_greeting: String,
    pub request_id: String,
}

/// Generates a cleaned cover-letter body for `resume` against `jd_text`.
///
/// Steps:
/// 1. analyze_job_description() → JobAnalysis
/// 2. sanitize() → professional content only
/// 3. identify_relevant_skills() → matching / missing
/// 4. generate the body from the safe subset
/// 5. clean() the body
/// 6. resolve names, falling back to the posting text when the model gave placeholders
pub async fn generate_cover_letter(
    llm: &dyn CompletionBackend,
    resume: &Value,
    jd_text: &str,
    user_instructions: Option<&str>,
) -> Result<CoverLetterResult, FeatureError> {
    let request_id = new_request_id();

    // Step 1: Analyse the posting
    let analysis = analyze_job_description(llm, jd_text)
        .await
        .map_err(|e| FeatureError { request_id: request_id.clone(), ..e })?;

    // Step 2: Keep personal details on this side of the boundary
    let safe = sanitize(resume);
    let skills = safe.professional_content.get("skills").cloned().unwrap_or(Value::Null);

    // Step 3: Skill match
    let matched = identify_relevant_skills(llm, &skills, &analysis)
        .await
        .map_err(|e| FeatureError { request_id: request_id.clone(), ..e })?;
    info!(
        "Cover letter for {:?}: {} matching, {} missing skills",
        analysis.job_position,
        matched.matching_skills.len(),
        matched.missing_skills.len()
    );

    // Step 4: Generate the body
    let prompt = fill(
        COVER_LETTER_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("privacy_note", PRIVACY_NOTE),
            ("company_name", analysis.company_name.as_str()),
            ("job_position", analysis.job_position.as_str()),
            ("matching_skills", bullet_list(&matched.matching_skills).as_str()),
            ("missing_skills", bullet_list(&matched.missing_skills).as_str()),
            ("resume_json", to_json(&safe.professional_content).as_str()),
            ("job_description", jd_text),
            ("user_instructions", user_instructions.unwrap_or("None").trim()),
        ],
    );
    let conv = conversation(COVER_LETTER_SYSTEM, prompt);
    let raw = complete_text(llm, &conv, Operation::CoverLetter, Stage::Generation, &request_id).await?;

    // Step 5: Strip boilerplate
    let body_content = clean(&raw);
    if body_content.is_empty() {
        return Err(FeatureError::new(
            Stage::Generation,
            "nothing left after removing boilerplate from the model output",
            &request_id,
        ));
    }

    // Step 6: Title and greeting
    let (company_name, job_position) = resolve_names(&analysis, jd_text);
    let letter_title = letter_title(&company_name, &job_position);
    let recipient_greeting = recipient_greeting(&company_name);

    info!(request_id = %request_id, "Cover letter generated: {letter_title}");
    Ok(CoverLetterResult {
        body_content,
        company_name,
        job_position,
        letter_title,
        recipient_greeting,
        request_id,
    })
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
}

/// Model extraction first; the regex fallback only replaces placeholders.
pub fn resolve_names(analysis: &JobAnalysis, jd_text: &str) -> (String, String) {
    let company = if analysis.has_known_company() {
        analysis.company_name.clone()
    } else {
        extract_company_name(jd_text).unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
    };
    let position = if analysis.has_known_position() {
        analysis.job_position.clone()
    } else {
        extract_job_position(jd_text).unwrap_or_else(|| UNKNOWN_POSITION.to_string())
    };
    (company, position)
}

pub fn letter_title(company: &str, position: &str) -> String {
    match (company == UNKNOWN_COMPANY, position == UNKNOWN_POSITION) {
        (false, false) => format!("Cover Letter - {position} at {company}"),
        (true, false) => format!("Cover Letter - {position}"),
        (false, true) => format!("Cover Letter - {company}"),
        (true, true) => "Cover Letter".to_string(),
    }
}

pub fn recipient_greeting(company: &str) -> String {
    if company == UNKNOWN_COMPANY {
        GENERIC_GREETING.to_string()
    } else {
        format!("Dear {company} Hiring Team,")
    }
}
