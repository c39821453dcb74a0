// All LLM prompt constants for the feature functions.
// Reuses cross-cutting fragments from llm_client::prompts.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

/// Fills `{name}` placeholders in one pass. Substituted text is never re-scanned, so a
/// resume or posting that happens to contain `{job_description}` stays literal.
/// Unknown placeholders are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// System prompt for job-description analysis.
pub const JOB_ANALYSIS_SYSTEM: &str = "You are an expert recruiter and job description analyst. \
    Extract structured information from job postings accurately. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Replace `{job_description}` before sending.
pub const JOB_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following job description and return a JSON object with this EXACT schema:
{
  "company_name": "Name of the hiring company, or \"Unknown Company\" if not stated",
  "job_position": "Exact job title, or \"Unknown Position\" if not stated",
  "required_skills": ["skills explicitly required"],
  "preferred_skills": ["nice-to-have skills"],
  "key_responsibilities": ["main duties of the role"],
  "required_experience": ["years / domains / seniority requirements"],
  "keywords": ["important ATS keywords"]
}

Rules:
- Copy the company name and job title exactly as written in the posting.
- Keep every list item short (a skill, tool or phrase, not a sentence).
- Use empty lists when the posting says nothing about a field.

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for skill matching.
pub const SKILL_MATCH_SYSTEM: &str = "You are a career advisor who compares a candidate's skills \
    with a job's requirements honestly. \
    You MUST respond with valid JSON only.";

/// Replace `{resume_skills}`, `{job_analysis}` before sending.
pub const SKILL_MATCH_PROMPT_TEMPLATE: &str = r#"Compare the candidate's skills with the job requirements.

CANDIDATE SKILLS (JSON):
{resume_skills}

JOB ANALYSIS (JSON):
{job_analysis}

Return a JSON object with this EXACT schema:
{
  "matching_skills": ["candidate skills that satisfy a required or preferred skill"],
  "missing_skills": ["required or preferred skills the candidate does not list"],
  "recommendations": ["short, concrete advice on presenting or closing gaps"]
}

Rules:
- A skill only matches if the candidate actually lists it or an obvious equivalent.
- Never move a missing skill into matching_skills to make the candidate look better."#;

/// System prompt for cover-letter body generation.
pub const COVER_LETTER_SYSTEM: &str = "You are a professional cover letter writer. \
    You write concise, specific, honest letter bodies in plain text.";

/// Replace `{grounding_instruction}`, `{privacy_note}`, `{company_name}`, `{job_position}`,
/// `{matching_skills}`, `{missing_skills}`, `{resume_json}`, `{job_description}`,
/// `{user_instructions}` before sending.
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{privacy_note}

Write the BODY of a cover letter for the position of {job_position} at {company_name}.

MATCHING SKILLS (you may cite ONLY these as strengths):
{matching_skills}

MISSING SKILLS (acknowledge willingness to learn; NEVER claim experience or mastery):
{missing_skills}

CANDIDATE RESUME (JSON, personal details removed):
{resume_json}

JOB DESCRIPTION:
{job_description}

ADDITIONAL INSTRUCTIONS FROM THE CANDIDATE:
{user_instructions}

HARD RULES:
1. Output 3-4 paragraphs of body text only.
2. NO header, NO date, NO addresses, NO contact details.
3. NO greeting line ("Dear ...") and NO closing or signature ("Sincerely, ..."). These are added later.
4. NO placeholders in square brackets.
5. Plain text, no markdown."#;

/// System prompt for the tailoring pass.
pub const TAILOR_SYSTEM: &str = "You are an expert resume writer who tailors resumes to a \
    specific job without inventing anything. You MUST respond with valid JSON only.";

/// Replace `{grounding_instruction}`, `{privacy_note}`, `{resume_json}`, `{job_description}`.
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{privacy_note}

Tailor this resume for the job description below.

RESUME (JSON):
{resume_json}

JOB DESCRIPTION:
{job_description}

You MAY:
- reorder entries and bullet points so the most relevant come first
- rephrase descriptions to mirror the job's language
- add a job keyword ONLY where the resume already shows evidence of it
- write a tailored top-level "summary" string

You MUST NOT:
- delete any entry (jobs, projects, education, skills)
- invent achievements, metrics, employers, dates or skills
- rename or remove JSON field names

Return the complete tailored resume as a JSON object with the same structure as the input."#;

/// System prompt for the copy-edit pass.
pub const PROOFREAD_SYSTEM: &str = "You are a meticulous copy editor. You fix language only. \
    You MUST respond with valid JSON only.";

/// Replace `{resume_json}`.
pub const PROOFREAD_PROMPT_TEMPLATE: &str = r#"Proofread the resume below.

RESUME (JSON):
{resume_json}

Fix ONLY spelling, grammar, punctuation and awkward phrasing.
Do NOT change field names, structure, facts, numbers, dates, company names or job titles.
Do NOT add or remove entries.

Return the corrected resume as a JSON object with exactly the same structure."#;

/// System prompt for improvement suggestions.
pub const SUGGESTIONS_SYSTEM: &str = "You are a senior career coach giving practical, \
    specific resume feedback.";

/// Replace `{privacy_note}`, `{resume_json}`, `{job_description}`.
pub const SUGGESTIONS_PROMPT_TEMPLATE: &str = r#"{privacy_note}

Review this resume against the job description and suggest improvements.

RESUME (JSON):
{resume_json}

JOB DESCRIPTION:
{job_description}

Give 5-8 concrete suggestions as a bulleted list. For each, say what to change and why it
matters for this job. Point out missing keywords the candidate could honestly add, weak
bullet points worth quantifying, and sections to reorder. Do not rewrite the whole resume."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_does_not_rescan_substituted_text() {
        let filled = fill(
            "JD: {job_description}\nNotes: {user_instructions}",
            &[
                ("job_description", "we want {user_instructions} here"),
                ("user_instructions", "keep it short"),
            ],
        );
        assert_eq!(filled, "JD: we want {user_instructions} here\nNotes: keep it short");
    }

    #[test]
    fn test_fill_leaves_json_schema_and_unknown_names_alone() {
        let filled = fill(JOB_ANALYSIS_PROMPT_TEMPLATE, &[("job_description", "Acme is hiring")]);
        assert!(filled.contains("\"company_name\""));
        assert!(filled.contains("Acme is hiring"));
        assert!(!filled.contains("{job_description}"));
        assert_eq!(fill("{other}", &[]), "{other}");
    }
}
