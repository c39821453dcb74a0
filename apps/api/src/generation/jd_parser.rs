//! JD Parser: extracts company, position, skills and keywords from a raw job description.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::generation::prompts::{fill, JOB_ANALYSIS_PROMPT_TEMPLATE, JOB_ANALYSIS_SYSTEM};
use crate::generation::{complete_json, conversation, new_request_id, FeatureError, Stage};
use crate::llm_client::providers::Operation;
use crate::llm_client::CompletionBackend;

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_POSITION: &str = "Unknown Position";

/// Structured extraction of a job description.
///
/// Names are never empty: inconclusive extraction leaves the placeholder sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobAnalysis {
    pub company_name: String,
    pub job_position: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub key_responsibilities: Vec<String>,
    pub required_experience: Vec<String>,
    pub keywords: Vec<String>,
}

impl Default for JobAnalysis {
    fn default() -> Self {
        Self {
            company_name: UNKNOWN_COMPANY.to_string(),
            job_position: UNKNOWN_POSITION.to_string(),
            required_skills: Vec::new(),
            preferred_skills: Vec::new(),
            key_responsibilities: Vec::new(),
            required_experience: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl JobAnalysis {
    /// Reads whatever the model produced, tolerating alternate key names, comma-separated
    /// strings in place of lists, and `{name: …}` objects in place of strings.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let text = |keys: &[&str], fallback: String| {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !is_placeholder(s))
                .map(str::to_string)
                .unwrap_or(fallback)
        };
        let list = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| value.get(*k))
                .map(string_list)
                .unwrap_or_default()
        };

        Self {
            company_name: text(&["company_name", "companyName", "company"], defaults.company_name),
            job_position: text(
                &["job_position", "jobPosition", "position", "job_title", "title"],
                defaults.job_position,
            ),
            required_skills: list(&["required_skills", "requiredSkills"]),
            preferred_skills: list(&["preferred_skills", "preferredSkills"]),
            key_responsibilities: list(&["key_responsibilities", "keyResponsibilities", "responsibilities"]),
            required_experience: list(&["required_experience", "requiredExperience", "experience"]),
            keywords: list(&["keywords"]),
        }
    }

    pub fn has_known_company(&self) -> bool {
        !is_placeholder(&self.company_name)
    }

    pub fn has_known_position(&self) -> bool {
        !is_placeholder(&self.job_position)
    }
}

/// True for empty strings and the "don't know" values models like to emit.
pub fn is_placeholder(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    matches!(
        lowered.as_str(),
        "" | "unknown"
            | "unknown company"
            | "unknown position"
            | "n/a"
            | "na"
            | "none"
            | "null"
            | "not specified"
            | "not mentioned"
    )
}

fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => ["name", "skill", "text"]
                    .iter()
                    .find_map(|k| o.get(*k).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Asks the model for a structured extraction of `jd_text`.
///
/// A failed completion or non-JSON output is an `Analysis` error. JSON with missing or
/// mistyped fields falls back to the defaults field by field.
pub async fn analyze_job_description(
    llm: &dyn CompletionBackend,
    jd_text: &str,
) -> Result<JobAnalysis, FeatureError> {
    let request_id = new_request_id();
    let prompt = fill(JOB_ANALYSIS_PROMPT_TEMPLATE, &[("job_description", jd_text)]);
    let conv = conversation(JOB_ANALYSIS_SYSTEM, prompt);

    let value = complete_json(llm, &conv, Operation::JobAnalysis, Stage::Analysis, &request_id).await?;
    let analysis = JobAnalysis::from_value(&value);
    info!(
        request_id = %request_id,
        required = analysis.required_skills.len(),
        keywords = analysis.keywords.len(),
        "Job description analyzed"
    );
    Ok(analysis)
}

// ────────────────────────────────────────────────────────────────────────────
// Regex fallback for company / position
// ────────────────────────────────────────────────────────────────────────────

static COMPANY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:company(?:\s+name)?|employer|organi[sz]ation)\s*[:\-]\s*(.+?)\s*$")
        .expect("valid regex")
});

static COMPANY_HIRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][\w&.\-]*(?:\s+[A-Z][\w&.\-]*){0,3})\s+(?:is|are)\s+(?:looking|hiring|seeking|searching)")
        .expect("valid regex")
});

static COMPANY_JOIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Join|join)\s+([A-Z][\w&.\-]*(?:\s+[A-Z][\w&.\-]*){0,3})").expect("valid regex")
});

static COMPANY_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bat\s+([A-Z][\w&.\-]*(?:\s+[A-Z][\w&.\-]*){0,3})").expect("valid regex")
});

static POSITION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:job\s+title|title|position|role)\s*[:\-]\s*(.+?)\s*$").expect("valid regex")
});

static POSITION_SOUGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:looking for|hiring|seeking|searching for)\s+(?:an?\s+|the\s+|our\s+next\s+)?([A-Z][\w+#/\-]*(?:\s+[A-Z][\w+#/\-]*){0,5})",
    )
    .expect("valid regex")
});

fn first_capture(patterns: &[&Lazy<Regex>], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().trim_end_matches(['.', ',', ';', ':', '!']).trim().to_string())
            .filter(|s| !is_placeholder(s))
    })
}

/// Best-effort company name straight from the posting text.
pub fn extract_company_name(jd_text: &str) -> Option<String> {
    first_capture(&[&COMPANY_LINE, &COMPANY_HIRING, &COMPANY_JOIN, &COMPANY_AT], jd_text)
}

/// Best-effort job title straight from the posting text.
pub fn extract_job_position(jd_text: &str) -> Option<String> {
    first_capture(&[&POSITION_LINE, &POSITION_SOUGHT], jd_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedBackend;
    use serde_json::json;

    const ACME_JD: &str =
        "Acme Corp is looking for a Senior Backend Engineer with Python and Kubernetes experience";

    #[tokio::test]
    async fn test_acme_happy_path() {
        let llm = ScriptedBackend::new(vec![Ok(r#"```json
{"company_name": "Acme Corp", "job_position": "Senior Backend Engineer",
 "required_skills": ["Python", "Kubernetes"], "preferred_skills": [],
 "key_responsibilities": [], "required_experience": [], "keywords": ["backend"]}
```"#)]);
        let analysis = analyze_job_description(&llm, ACME_JD).await.unwrap();

        assert_eq!(analysis.company_name, "Acme Corp");
        assert!(analysis.job_position.contains("Backend Engineer"));
        assert!(analysis.required_skills.contains(&"Python".to_string()));
        assert!(llm.sent_text().contains(ACME_JD));
        assert_eq!(llm.calls.lock().unwrap()[0].0, Operation::JobAnalysis);
    }

    #[test]
    fn test_sparse_output_gets_defaults() {
        let analysis = JobAnalysis::from_value(&json!({"company_name": null, "keywords": 7}));
        assert_eq!(analysis, JobAnalysis::default());
        assert_eq!(analysis.company_name, UNKNOWN_COMPANY);
        assert_eq!(analysis.job_position, UNKNOWN_POSITION);
    }

    #[test]
    fn test_from_value_is_tolerant_of_shapes() {
        let analysis = JobAnalysis::from_value(&json!({
            "companyName": "  Globex ",
            "title": "Data Engineer",
            "required_skills": "SQL, Spark ,  ",
            "preferred_skills": [{"name": "Airflow"}, {"skill": "dbt"}, 3],
            "responsibilities": ["Build pipelines", ""]
        }));
        assert_eq!(analysis.company_name, "Globex");
        assert_eq!(analysis.job_position, "Data Engineer");
        assert_eq!(analysis.required_skills, vec!["SQL", "Spark"]);
        assert_eq!(analysis.preferred_skills, vec!["Airflow", "dbt"]);
        assert_eq!(analysis.key_responsibilities, vec!["Build pipelines"]);
    }

    #[test]
    fn test_model_placeholders_are_not_names() {
        let analysis = JobAnalysis::from_value(&json!({"company_name": "N/A", "job_position": "unknown"}));
        assert!(!analysis.has_known_company());
        assert!(!analysis.has_known_position());
    }

    #[tokio::test]
    async fn test_non_json_output_is_an_analysis_error() {
        let llm = ScriptedBackend::new(vec![Ok("I cannot help with that.")]);
        let err = analyze_job_description(&llm, ACME_JD).await.unwrap_err();
        assert_eq!(err.stage, Stage::Analysis);
        assert!(!err.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_prefixed_with_stage() {
        let llm = ScriptedBackend::new(vec![Err("Authentication failed: bad key")]);
        let err = analyze_job_description(&llm, ACME_JD).await.unwrap_err();
        assert_eq!(err.to_string(), "Job analysis failed: Authentication failed: bad key");
    }

    #[test]
    fn test_regex_fallback_on_acme() {
        assert_eq!(extract_company_name(ACME_JD).as_deref(), Some("Acme Corp"));
        assert_eq!(
            extract_job_position(ACME_JD).as_deref(),
            Some("Senior Backend Engineer")
        );
    }

    #[test]
    fn test_regex_fallback_on_labelled_lines() {
        let jd = "Position: Staff Rust Engineer\nCompany: Initech LLC\n\nWe build things.";
        assert_eq!(extract_company_name(jd).as_deref(), Some("Initech LLC"));
        assert_eq!(extract_job_position(jd).as_deref(), Some("Staff Rust Engineer"));
    }

    #[test]
    fn test_regex_fallback_join_and_at() {
        assert_eq!(
            extract_company_name("Join Hooli and help us scale search.").as_deref(),
            Some("Hooli")
        );
        assert_eq!(
            extract_company_name("You will work on payments at Stripe.").as_deref(),
            Some("Stripe")
        );
        assert_eq!(extract_company_name("we need someone good"), None);
        assert_eq!(extract_job_position("we need someone good"), None);
    }
}
