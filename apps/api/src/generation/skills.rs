//! Skill matching: which of the candidate's skills fit the job, and which are missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::generation::jd_parser::JobAnalysis;
use crate::generation::prompts::{fill, SKILL_MATCH_PROMPT_TEMPLATE, SKILL_MATCH_SYSTEM};
use crate::generation::{complete_json, conversation, new_request_id, to_json, FeatureError, Stage};
use crate::llm_client::providers::Operation;
use crate::llm_client::CompletionBackend;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Flattens the many ways resumes store skills into plain names.
///
/// Accepts strings, `[name, level]` pairs, `{name}` / `{skill}` objects, and category
/// objects whose values are any of those (`{"languages": ["Rust", "Go"]}`).
pub fn skill_names(skills: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_skill_names(skills, false, &mut names);
    let mut seen = std::collections::HashSet::new();
    names.retain(|n| seen.insert(n.to_lowercase()));
    names
}

fn collect_skill_names(value: &Value, in_list: bool, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        // A two-element entry inside a skill list is a positional pair: name first.
        Value::Array(items)
            if in_list && items.len() == 2 && items[0].is_string() && !items[1].is_array() =>
        {
            collect_skill_names(&items[0], false, out);
        }
        Value::Array(items) => items.iter().for_each(|item| collect_skill_names(item, true, out)),
        Value::Object(o) => match ["name", "skill"].iter().find_map(|k| o.get(*k)) {
            Some(name) => collect_skill_names(name, false, out),
            None => o.values().for_each(|v| collect_skill_names(v, false, out)),
        },
        _ => {}
    }
}

fn names_from(value: &Value, key: &str) -> Vec<String> {
    value.get(key).map(skill_names).unwrap_or_default()
}

/// Compares the candidate's skills with the analysed job.
///
/// With no skills on the resume there is nothing to compare and no model call is made:
/// every required skill is missing.
pub async fn identify_relevant_skills(
    llm: &dyn CompletionBackend,
    resume_skills: &Value,
    analysis: &JobAnalysis,
) -> Result<SkillMatch, FeatureError> {
    let candidate = skill_names(resume_skills);
    if candidate.is_empty() {
        return Ok(SkillMatch {
            matching_skills: Vec::new(),
            missing_skills: analysis.required_skills.clone(),
            recommendations: Vec::new(),
        });
    }

    let request_id = new_request_id();
    let prompt = fill(
        SKILL_MATCH_PROMPT_TEMPLATE,
        &[
            ("resume_skills", to_json(&candidate).as_str()),
            ("job_analysis", to_json(analysis).as_str()),
        ],
    );
    let conv = conversation(SKILL_MATCH_SYSTEM, prompt);

    let value = complete_json(llm, &conv, Operation::SkillMatching, Stage::Matching, &request_id).await?;
    let result = SkillMatch {
        matching_skills: names_from(&value, "matching_skills"),
        missing_skills: names_from(&value, "missing_skills"),
        recommendations: names_from(&value, "recommendations"),
    };
    info!(
        request_id = %request_id,
        matching = result.matching_skills.len(),
        missing = result.missing_skills.len(),
        "Skills matched"
    );
    Ok(result)
}
