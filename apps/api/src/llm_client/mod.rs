/// LLM Gateway: the single point of entry for every model call in the service.
///
/// ARCHITECTURAL RULE: No other module may talk to a vendor API or a local inference
/// server directly. Feature code goes through `CompletionBackend`, which `LlmGateway`
/// implements.
///
/// The gateway never fails outward: every network, authentication or parsing problem
/// comes back as a `CompletionResult` with `success == false` and a classified
/// `error_message`.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

pub mod discovery;
pub mod error;
pub mod json_extract;
pub mod prompts;
pub mod providers;
pub mod reasoning;
mod wire;

use error::{classify_status, classify_transport, extract_error_message, ErrorKind, GatewayError};
use providers::{Operation, ProviderDescriptor, ProviderRegistry};
use wire::{FinishReason, ParsedCompletion, RequestParams};

// ────────────────────────────────────────────────────────────────────────────
// Conversation and result types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation. Order is meaningful; a system message comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Caller expects a JSON document back.
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default)]
    pub response_format: ResponseFormat,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Tier-1 base URL override. The provider's API key is never sent to it.
    pub base_url: Option<String>,
    /// Log correlation only; generated when absent.
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    pub fn new(prompt: Option<u32>, completion: Option<u32>, total: Option<u32>) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        }
    }
}

fn count(n: Option<u32>) -> String {
    n.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub success: bool,
    /// Empty on failure.
    pub content: String,
    pub model_used: String,
    pub usage: Usage,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub request_id: String,
}

impl CompletionResult {
    fn succeeded(content: String, model: &str, usage: Usage, request_id: &str) -> Self {
        Self {
            success: true,
            content,
            model_used: model.to_string(),
            usage,
            error_message: None,
            error_kind: None,
            request_id: request_id.to_string(),
        }
    }

    fn failed(error: GatewayError, model: &str, usage: Usage, request_id: &str) -> Self {
        Self {
            success: false,
            content: String::new(),
            model_used: model.to_string(),
            usage,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind),
            request_id: request_id.to_string(),
        }
    }

    /// Content-or-error view of the result; the error is the classified message.
    pub fn into_result(self) -> Result<String, String> {
        if self.success {
            Ok(self.content)
        } else {
            Err(self
                .error_message
                .unwrap_or_else(|| ErrorKind::Provider.to_string()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend seam
// ────────────────────────────────────────────────────────────────────────────

/// What feature code needs from a model: one conversation in, one result out.
///
/// Carried as `Arc<dyn CompletionBackend>` in `AppState`. `LlmGateway` is the
/// production implementation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn chat(
        &self,
        conversation: &[ConversationMessage],
        operation: Operation,
        format: ResponseFormat,
        request_id: &str,
    ) -> CompletionResult;
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway
// ────────────────────────────────────────────────────────────────────────────

/// Bound to one provider/model choice for its lifetime. Switching provider means
/// building a new gateway.
#[derive(Clone)]
pub struct LlmGateway {
    client: Client,
    registry: Arc<ProviderRegistry>,
    api_keys: Arc<HashMap<String, String>>,
    provider: String,
    model: Option<String>,
}

impl LlmGateway {
    pub fn new(
        registry: ProviderRegistry,
        api_keys: HashMap<String, String>,
        provider: impl Into<String>,
        model: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            registry: Arc::new(registry),
            api_keys: Arc::new(api_keys),
            provider: provider.into(),
            model: model.filter(|m| !m.trim().is_empty()),
        })
    }

    /// Builds the gateway from configuration. When neither the configuration nor the
    /// catalog names a model, the provider's server is asked what it has loaded.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut registry =
            ProviderRegistry::builtin().with_base_url_overrides(config.base_urls.clone());
        let descriptor = registry.describe(&config.llm_provider);
        let mut model = config.llm_model.clone();

        if model.is_none() && descriptor.default_model.is_none() {
            let client = Client::new();
            if let Some(base_url) = registry.resolve_base_url(&descriptor.id, None) {
                let models = discovery::discover_models(&client, &descriptor, &base_url).await;
                if models.is_empty() {
                    warn!(
                        "No models discovered for {} at {base_url}; completions will fail until one is loaded",
                        descriptor.id
                    );
                } else {
                    model = models.first().cloned();
                    registry.set_available_models(&descriptor.id, models);
                }
            }
        }

        info!(
            "LLM gateway bound to provider={} model={}",
            descriptor.id,
            model.as_deref().unwrap_or("<none>")
        );
        Self::new(registry, config.api_keys.clone(), descriptor.id, model)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| self.registry.get(&self.provider)?.fallback_model())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Models a provider offers: its catalog, or a live listing for servers without one.
    pub async fn available_models(&self, provider_id: &str) -> Vec<String> {
        let descriptor = self.registry.describe(provider_id);
        if !descriptor.available_models.is_empty() || descriptor.discovery.is_empty() {
            return descriptor.available_models;
        }
        match self.registry.resolve_base_url(&descriptor.id, None) {
            Some(base_url) => {
                discovery::discover_models(&self.client, &descriptor, &base_url).await
            }
            None => Vec::new(),
        }
    }

    /// Sends a tiny prompt through the bound provider and reports the outcome as a
    /// user-facing line.
    pub async fn test_connection(&self) -> String {
        let conversation = [ConversationMessage::user("Reply with the single word OK.")];
        let request_id = Uuid::new_v4().to_string();
        let result = self
            .chat(
                &conversation,
                Operation::ConnectionTest,
                ResponseFormat::Text,
                &request_id,
            )
            .await;

        if result.success {
            format!(
                "✅ Connected to {} (model: {})",
                self.provider, result.model_used
            )
        } else {
            format!(
                "❌ {} connection test failed: {}",
                self.provider,
                result.error_message.unwrap_or_default()
            )
        }
    }

    /// Runs one completion against `provider_id`. `model` overrides the provider default.
    pub async fn complete(
        &self,
        conversation: &[ConversationMessage],
        provider_id: &str,
        model: Option<&str>,
        options: &CompletionOptions,
    ) -> CompletionResult {
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let descriptor = self.registry.describe(provider_id);

        let model = model
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                (descriptor.id == self.provider)
                    .then(|| self.model.clone())
                    .flatten()
            })
            .or_else(|| descriptor.fallback_model().map(str::to_string));
        let Some(model) = model else {
            let error = GatewayError::new(
                ErrorKind::Provider,
                format!("No model configured or discovered for provider '{}'", descriptor.id),
            )
            .with_hint(descriptor.remediation_hint);
            return CompletionResult::failed(error, "", Usage::default(), &request_id);
        };

        debug!(
            request_id = %request_id,
            provider = %descriptor.id,
            model = %model,
            messages = conversation.len(),
            "Dispatching completion"
        );

        match self
            .execute(conversation, &descriptor, &model, options)
            .await
        {
            Ok(parsed) => finalize(parsed, &model, &request_id),
            Err(e) => {
                let e = e.with_hint(descriptor.remediation_hint);
                warn!(request_id = %request_id, "Completion failed: {e}");
                CompletionResult::failed(e, &model, Usage::default(), &request_id)
            }
        }
    }

    async fn execute(
        &self,
        conversation: &[ConversationMessage],
        descriptor: &ProviderDescriptor,
        model: &str,
        options: &CompletionOptions,
    ) -> Result<ParsedCompletion, GatewayError> {
        let base_url = self
            .registry
            .resolve_base_url(&descriptor.id, options.base_url.as_deref())
            .ok_or_else(|| {
                GatewayError::new(
                    ErrorKind::Connection,
                    format!("No base URL configured for provider '{}'", descriptor.id),
                )
            })?;

        let configured_key = self.api_keys.get(&descriptor.id).map(String::as_str);
        let trusted_host = self.registry.resolve_base_url(&descriptor.id, None);
        let api_key = if trusted_host.as_deref() == Some(base_url.as_str()) {
            configured_key
        } else {
            None
        };
        if descriptor.requires_api_key && api_key.is_none() && configured_key.is_some() {
            return Err(GatewayError::new(
                ErrorKind::Authentication,
                format!(
                    "the API key for '{}' is only sent to its configured base URL, not {base_url}",
                    descriptor.id
                ),
            ));
        }
        if descriptor.requires_api_key && api_key.map_or(true, str::is_empty) {
            let variable = descriptor.api_key_env.unwrap_or("the provider's API key variable");
            return Err(GatewayError::new(
                ErrorKind::Authentication,
                format!("No API key configured for '{}'; set {variable}", descriptor.id),
            ));
        }

        let (messages, format) = adapt_for_backend(descriptor, conversation, options.response_format);
        let params = RequestParams {
            model: descriptor.wire_model_name(model),
            messages: &messages,
            format,
            max_tokens: options.max_tokens.unwrap_or(providers::DEFAULT_TOKEN_BUDGET),
            temperature: options.temperature.unwrap_or(0.3),
        };
        let request = wire::build_request(descriptor.family, &params);
        let url = wire::join_url(&base_url, &request.path);

        let builder = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(descriptor.timeout_seconds))
            .json(&request.body);
        let response = wire::apply_auth(builder, descriptor.family, api_key)
            .send()
            .await
            .map_err(|e| {
                GatewayError::new(classify_transport(&e), format!("{url}: {e}."))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::new(classify_transport(&e), e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::new(
                classify_status(status, &body),
                format!("{status}: {}", extract_error_message(&body)),
            ));
        }

        wire::parse_response(descriptor.family, &body)
    }
}

#[async_trait]
impl CompletionBackend for LlmGateway {
    async fn chat(
        &self,
        conversation: &[ConversationMessage],
        operation: Operation,
        format: ResponseFormat,
        request_id: &str,
    ) -> CompletionResult {
        let descriptor = self.registry.describe(&self.provider);
        debug!(
            request_id,
            operation = operation.as_str(),
            budget = descriptor.token_budget(operation),
            "Feature completion"
        );
        let options = CompletionOptions {
            response_format: format,
            max_tokens: Some(descriptor.token_budget(operation)),
            temperature: Some(operation.temperature()),
            base_url: None,
            request_id: Some(request_id.to_string()),
        };
        self.complete(conversation, &self.provider, self.model.as_deref(), &options)
            .await
    }
}

/// Backends without native structured output get the format hint dropped and, when
/// the final message already asks for JSON, an explicit instruction appended.
fn adapt_for_backend(
    descriptor: &ProviderDescriptor,
    conversation: &[ConversationMessage],
    format: ResponseFormat,
) -> (Vec<ConversationMessage>, ResponseFormat) {
    let mut messages = conversation.to_vec();
    if format != ResponseFormat::Json || descriptor.native_json {
        return (messages, format);
    }

    if let Some(last) = messages.last_mut() {
        if last.content.to_lowercase().contains("json") {
            last.content.push_str(prompts::JSON_ONLY_SUFFIX);
        }
    }
    (messages, ResponseFormat::Text)
}

/// Applies the content fallbacks, the reasoning filter and the truncation policy.
fn finalize(parsed: ParsedCompletion, model: &str, request_id: &str) -> CompletionResult {
    let mut content = parsed.content.unwrap_or_default();

    if content.trim().is_empty() {
        if let Some(reasoning) = parsed.reasoning.filter(|r| !r.trim().is_empty()) {
            info!(
                request_id = %request_id,
                "Primary content empty; using reasoning_content fallback"
            );
            content = reasoning;
        }
    }

    if reasoning::is_reasoning_model(model) {
        content = reasoning::strip_reasoning(&content);
    }

    let has_content = !content.trim().is_empty();
    match (parsed.finish, has_content) {
        (FinishReason::Length, true) => {
            warn!(
                request_id = %request_id,
                "Output truncated by the token limit; returning partial content"
            );
        }
        (FinishReason::Length, false) => {
            let error = GatewayError::new(
                ErrorKind::TokenLimit,
                format!(
                    "output was truncated before any content was produced \
                     (prompt_tokens={}, total_tokens={}). Raise the max token budget \
                     or the server's context window.",
                    count(parsed.usage.prompt_tokens),
                    count(parsed.usage.total_tokens)
                ),
            );
            return CompletionResult::failed(error, model, parsed.usage, request_id);
        }
        (_, false) => {
            let error = GatewayError::malformed("model returned empty content");
            return CompletionResult::failed(error, model, parsed.usage, request_id);
        }
        _ => {}
    }

    debug!(
        request_id = %request_id,
        prompt_tokens = ?parsed.usage.prompt_tokens,
        total_tokens = ?parsed.usage.total_tokens,
        "Completion succeeded"
    );
    CompletionResult::succeeded(content, model, parsed.usage, request_id)
}
