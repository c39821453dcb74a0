//! Gateway endpoints: provider catalog, model listing, connection test, raw completion.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::providers::ProviderDescriptor;
use crate::llm_client::{CompletionOptions, CompletionResult, ConversationMessage, ResponseFormat};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    /// Defaults to the provider the gateway is bound to.
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub provider: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub provider: String,
    pub model: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub messages: Vec<ConversationMessage>,
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub options: CompleteRequestOptions,
}

/// Completion options accepted over HTTP. There is no base URL: requests always go to
/// the configured host for the provider.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequestOptions {
    #[serde(default)]
    pub response_format: ResponseFormat,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub request_id: Option<String>,
}

impl From<CompleteRequestOptions> for CompletionOptions {
    fn from(options: CompleteRequestOptions) -> Self {
        Self {
            response_format: options.response_format,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            base_url: None,
            request_id: options.request_id,
        }
    }
}

/// GET /api/v1/llm/providers
pub async fn handle_list_providers(State(state): State<AppState>) -> Json<Vec<ProviderDescriptor>> {
    Json(state.gateway.registry().all().to_vec())
}

/// GET /api/v1/llm/models?provider=
pub async fn handle_list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Json<ModelsResponse> {
    let provider = query
        .provider
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| state.gateway.provider().to_string());
    let models = state.gateway.available_models(&provider).await;
    Json(ModelsResponse { provider, models })
}

/// GET /api/v1/llm/connection
pub async fn handle_test_connection(State(state): State<AppState>) -> Json<ConnectionResponse> {
    let message = state.gateway.test_connection().await;
    Json(ConnectionResponse {
        provider: state.gateway.provider().to_string(),
        model: state.gateway.model().map(str::to_string),
        message,
    })
}

/// POST /api/v1/llm/complete
///
/// Gateway failures come back as a `CompletionResult` with `success: false`, not as an
/// HTTP error.
pub async fn handle_complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompletionResult>, AppError> {
    if request.messages.is_empty() {
        return Err(AppError::Validation("messages cannot be empty".to_string()));
    }
    let provider = request
        .provider
        .unwrap_or_else(|| state.gateway.provider().to_string());
    let options = CompletionOptions::from(request.options);
    let result = state
        .gateway
        .complete(&request.messages, &provider, request.model.as_deref(), &options)
        .await;
    Ok(Json(result))
}
