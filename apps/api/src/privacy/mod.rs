//! Privacy Sanitizer: keeps personal identifiers out of every model prompt.
//!
//! `sanitize` splits a resume record into professional content (safe to send) and
//! personal info (withheld). `recombine` puts them back together after the model
//! has worked on the professional half.
//!
//! HARD RULE: `sanitize` is a guarantee, not best effort. Whatever `validate` still
//! flags after the regular pass is deleted and logged as a breach.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

/// Fields that identify the person. Never sent to a model.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "name",
    "full_name",
    "first_name",
    "last_name",
    "email",
    "phone",
    "phone_number",
    "address",
    "location",
    "city",
    "postal_code",
    "citizenship",
    "nationality",
    "date_of_birth",
    "linkedin",
    "github",
    "website",
    "portfolio",
    "twitter",
];

/// Keys under which resumes carry their work history.
pub const EXPERIENCE_KEYS: &[&str] = &[
    "experience",
    "work_experience",
    "professional_experience",
    "employment_history",
    "work_history",
];

pub const PERSONAL_INFO_KEY: &str = "personal_info";
pub const PROFESSIONAL_SUMMARY_KEY: &str = "professional_summary";
pub const WORK_CONTACTS_KEY: &str = "work_contacts";

/// Sub-fields of `personal_info` that are needed for tailoring and identify nobody.
const SUMMARY_FIELDS: &[&str] = &["summary", "objective"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedResume {
    pub professional_content: Map<String, Value>,
    pub personal_info: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkContact {
    pub company: Value,
    pub manager: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_safe: bool,
    /// Dotted paths such as `email` or `personal_info.phone`.
    pub violations: Vec<String>,
}

/// Splits `resume` into professional content and withheld personal info.
///
/// Non-object input is treated as an empty record.
pub fn sanitize(resume: &Value) -> SanitizedResume {
    let mut professional = resume.as_object().cloned().unwrap_or_default();
    let mut personal = Map::new();

    if let Some(section) = professional.remove(PERSONAL_INFO_KEY) {
        let summary: Map<String, Value> = section
            .as_object()
            .map(|info| {
                SUMMARY_FIELDS
                    .iter()
                    .filter_map(|field| info.get(*field).map(|v| (field.to_string(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();
        if !summary.is_empty() {
            professional.insert(PROFESSIONAL_SUMMARY_KEY.to_string(), Value::Object(summary));
        }
        personal.insert(PERSONAL_INFO_KEY.to_string(), section);
    }

    for field in SENSITIVE_FIELDS {
        if let Some(value) = professional.remove(*field) {
            personal.insert(field.to_string(), value);
        }
    }

    let contacts = extract_work_contacts(&mut professional);
    if !contacts.is_empty() {
        personal.insert(
            WORK_CONTACTS_KEY.to_string(),
            serde_json::to_value(contacts).unwrap_or_default(),
        );
    }

    let redacted = strip_sensitive(&mut professional);
    if !redacted.is_empty() {
        error!(
            "Privacy breach caught after sanitization; redacted {} field(s): {:?}",
            redacted.len(),
            redacted
        );
    }

    SanitizedResume {
        professional_content: professional,
        personal_info: personal,
    }
}

/// Moves `manager` out of every experience entry, remembering which company it belonged to.
fn extract_work_contacts(professional: &mut Map<String, Value>) -> Vec<WorkContact> {
    let mut contacts = Vec::new();
    for key in EXPERIENCE_KEYS {
        let Some(entries) = professional.get_mut(*key).and_then(Value::as_array_mut) else {
            continue;
        };
        for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(manager) = entry.remove("manager") {
                contacts.push(WorkContact {
                    company: entry.get("company").cloned().unwrap_or(Value::Null),
                    manager,
                });
            }
        }
    }
    contacts
}

/// Reports every sensitive field present at the top level or one level inside
/// `personal_info`.
pub fn validate(candidate: &Value) -> ValidationReport {
    let mut violations = Vec::new();

    if let Some(object) = candidate.as_object() {
        for field in SENSITIVE_FIELDS {
            if object.contains_key(*field) {
                violations.push(field.to_string());
            }
        }
        if let Some(info) = object.get(PERSONAL_INFO_KEY).and_then(Value::as_object) {
            for field in SENSITIVE_FIELDS {
                if info.contains_key(*field) {
                    violations.push(format!("{PERSONAL_INFO_KEY}.{field}"));
                }
            }
        }
    }

    ValidationReport {
        is_safe: violations.is_empty(),
        violations,
    }
}

/// Deletes every path `validate` flags and returns the deleted paths.
///
/// Also used on model output, which may echo identifiers it was never given.
pub fn strip_sensitive(content: &mut Map<String, Value>) -> Vec<String> {
    let report = validate(&Value::Object(content.clone()));
    for path in &report.violations {
        redact_path(content, path);
    }
    report.violations
}

fn redact_path(object: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        Some((parent, child)) => {
            if let Some(inner) = object.get_mut(parent).and_then(Value::as_object_mut) {
                inner.remove(child);
            }
        }
        None => {
            object.remove(path);
        }
    }
}

/// Rebuilds a complete record from model-processed professional content and the
/// withheld personal info.
///
/// A top-level `summary` in the professional content is the tailored one and
/// replaces the summary inside the restored `personal_info`.
pub fn recombine(professional: &Map<String, Value>, personal: &Map<String, Value>) -> Value {
    let mut complete = professional.clone();

    if let Some(section) = personal.get(PERSONAL_INFO_KEY) {
        let mut section = section.clone();
        if let (Some(tailored), Some(info)) = (professional.get("summary"), section.as_object_mut())
        {
            info.insert("summary".to_string(), tailored.clone());
        }
        complete.insert(PERSONAL_INFO_KEY.to_string(), section);
    }

    for field in SENSITIVE_FIELDS {
        if let Some(value) = personal.get(*field) {
            complete.insert(field.to_string(), value.clone());
        }
    }

    if let Some(contacts) = personal.get(WORK_CONTACTS_KEY) {
        complete.insert(WORK_CONTACTS_KEY.to_string(), contacts.clone());
    }

    Value::Object(complete)
}
