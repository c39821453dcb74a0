//! Axum route handlers for the resume feature API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::generation::cover_letter::{generate_cover_letter, CoverLetterResult};
use crate::generation::jd_parser::{analyze_job_description, JobAnalysis};
use crate::generation::skills::{identify_relevant_skills, SkillMatch};
use crate::generation::tailor::{get_improvement_suggestions, tailor_resume};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeJobRequest {
    pub jd_text: String,
}

#[derive(Debug, Deserialize)]
pub struct MatchSkillsRequest {
    /// Any of the skill shapes resumes use: strings, `[name, level]`, `{name}`.
    #[serde(default)]
    pub resume_skills: Value,
    pub job_analysis: JobAnalysis,
}

#[derive(Debug, Deserialize)]
pub struct CoverLetterRequest {
    pub resume: Value,
    pub jd_text: String,
    pub user_instructions: Option<String>,
}

/// Shared by tailoring and suggestions.
#[derive(Debug, Deserialize)]
pub struct ResumeJobRequest {
    pub resume: Value,
    pub jd_text: String,
}

#[derive(Debug, Serialize)]
pub struct TailorResponse {
    pub resume: Value,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: String,
}

fn require_jd(jd_text: &str) -> Result<(), AppError> {
    if jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text cannot be empty".to_string()));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/analyze-job
pub async fn handle_analyze_job(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeJobRequest>,
) -> Result<Json<JobAnalysis>, AppError> {
    require_jd(&request.jd_text)?;
    let analysis = analyze_job_description(state.llm.as_ref(), &request.jd_text).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/resumes/match-skills
pub async fn handle_match_skills(
    State(state): State<AppState>,
    Json(request): Json<MatchSkillsRequest>,
) -> Result<Json<SkillMatch>, AppError> {
    let matched =
        identify_relevant_skills(state.llm.as_ref(), &request.resume_skills, &request.job_analysis)
            .await?;
    Ok(Json(matched))
}

/// POST /api/v1/resumes/cover-letter
///
/// Returns the cleaned body plus title and greeting; composing the final document is
/// the caller's job.
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Json(request): Json<CoverLetterRequest>,
) -> Result<Json<CoverLetterResult>, AppError> {
    require_jd(&request.jd_text)?;
    let letter = generate_cover_letter(
        state.llm.as_ref(),
        &request.resume,
        &request.jd_text,
        request.user_instructions.as_deref(),
    )
    .await?;
    Ok(Json(letter))
}

/// POST /api/v1/resumes/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<ResumeJobRequest>,
) -> Result<Json<TailorResponse>, AppError> {
    require_jd(&request.jd_text)?;
    let resume = tailor_resume(state.llm.as_ref(), &request.resume, &request.jd_text).await?;
    Ok(Json(TailorResponse { resume }))
}

/// POST /api/v1/resumes/suggestions
pub async fn handle_suggestions(
    State(state): State<AppState>,
    Json(request): Json<ResumeJobRequest>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    require_jd(&request.jd_text)?;
    let suggestions =
        get_improvement_suggestions(state.llm.as_ref(), &request.resume, &request.jd_text).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}
