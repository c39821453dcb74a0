//! Privacy endpoints: split a resume before it goes anywhere, merge it back afterwards.

use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::privacy::{recombine, sanitize, SanitizedResume};

#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub resume: Value,
}

#[derive(Debug, Deserialize)]
pub struct RecombineRequest {
    pub professional_content: Map<String, Value>,
    #[serde(default)]
    pub personal_info: Map<String, Value>,
}

/// POST /api/v1/privacy/sanitize
pub async fn handle_sanitize(
    Json(request): Json<SanitizeRequest>,
) -> Result<Json<SanitizedResume>, AppError> {
    if !request.resume.is_object() {
        return Err(AppError::Validation("resume must be a JSON object".to_string()));
    }
    Ok(Json(sanitize(&request.resume)))
}

/// POST /api/v1/privacy/recombine
pub async fn handle_recombine(Json(request): Json<RecombineRequest>) -> Json<Value> {
    Json(recombine(&request.professional_content, &request.personal_info))
}
