//! Provider Registry: static catalog of cloud vendors and local inference servers.
//!
//! Descriptors are built once at startup. Only `base_url` (environment overrides) and
//! `available_models` (discovery) change afterwards, and both happen before the registry
//! is shared with request handlers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::{Host, Url};

/// Budget used for any operation missing from a descriptor's budget map.
pub const DEFAULT_TOKEN_BUDGET: u32 = 1000;
/// Timeout for providers the registry does not know.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Namespace used for models discovered through an OpenAI-compatible listing.
pub const OPENAI_COMPAT_PREFIX: &str = "openai";

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// Every kind of model call the service makes. Keys the per-provider token budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    JobAnalysis,
    SkillMatching,
    CoverLetter,
    Tailoring,
    Proofreading,
    Suggestions,
    ConnectionTest,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::JobAnalysis,
        Operation::SkillMatching,
        Operation::CoverLetter,
        Operation::Tailoring,
        Operation::Proofreading,
        Operation::Suggestions,
        Operation::ConnectionTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::JobAnalysis => "job_analysis",
            Operation::SkillMatching => "skill_matching",
            Operation::CoverLetter => "cover_letter",
            Operation::Tailoring => "tailoring",
            Operation::Proofreading => "proofreading",
            Operation::Suggestions => "suggestions",
            Operation::ConnectionTest => "connection_test",
        }
    }

    /// Extraction and copy-editing stay near-deterministic; writing gets more room.
    pub fn temperature(&self) -> f32 {
        match self {
            Operation::JobAnalysis | Operation::SkillMatching | Operation::ConnectionTest => 0.1,
            Operation::Proofreading => 0.2,
            Operation::Tailoring => 0.4,
            Operation::CoverLetter | Operation::Suggestions => 0.7,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider families
// ────────────────────────────────────────────────────────────────────────────

/// Wire contract of a cloud vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudApi {
    /// `POST /chat/completions`, answer in `choices[0].message.content`.
    OpenAiChat,
    /// `POST /messages`, answer in `content[*].text`.
    AnthropicMessages,
    /// `POST /models/{model}:generateContent`, answer in `candidates[0].content.parts[0].text`.
    GeminiGenerateContent,
}

/// How a provider is reached. One variant per backend family; request building and
/// response parsing dispatch on this, never on the provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderFamily {
    Cloud { api: CloudApi },
    /// Local server speaking the OpenAI chat-completions contract.
    LocalOpenAiCompatible,
    /// Local server reached with a raw POST whose payload is parsed by hand.
    LocalRawHttp,
}

/// Shape of a model-listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingShape {
    /// `{"models": [{"name": "llama3:8b"}, ...]}`
    NamedModels,
    /// `{"data": [{"id": "qwen2.5-7b-instruct"}, ...]}`
    ModelObjects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveryEndpoint {
    pub path: &'static str,
    pub shape: ListingShape,
}

// ────────────────────────────────────────────────────────────────────────────
// Descriptor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub family: ProviderFamily,
    pub requires_api_key: bool,
    /// `None` for servers whose model must be discovered.
    pub default_model: Option<String>,
    pub available_models: Vec<String>,
    pub base_url: Option<String>,
    pub token_budgets: HashMap<Operation, u32>,
    pub timeout_seconds: u64,
    /// Whether the backend honours an OpenAI-style structured-output parameter.
    pub native_json: bool,
    pub api_key_env: Option<&'static str>,
    pub base_url_env: Option<&'static str>,
    /// Listing endpoints tried in order during discovery.
    pub discovery: &'static [DiscoveryEndpoint],
    /// Shown to the user when the server cannot be reached.
    pub remediation_hint: Option<&'static str>,
}

impl ProviderDescriptor {
    /// Safe fallback for ids the registry does not know.
    pub fn generic(id: &str) -> Self {
        Self {
            id: id.to_string(),
            family: ProviderFamily::Cloud {
                api: CloudApi::OpenAiChat,
            },
            requires_api_key: true,
            default_model: None,
            available_models: Vec::new(),
            base_url: None,
            token_budgets: HashMap::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            native_json: false,
            api_key_env: None,
            base_url_env: None,
            discovery: &[],
            remediation_hint: None,
        }
    }

    pub fn token_budget(&self, operation: Operation) -> u32 {
        self.token_budgets
            .get(&operation)
            .copied()
            .unwrap_or(DEFAULT_TOKEN_BUDGET)
    }

    /// Model used when the caller does not name one.
    pub fn fallback_model(&self) -> Option<&str> {
        self.default_model
            .as_deref()
            .or_else(|| self.available_models.first().map(String::as_str))
    }

    /// Strips the `provider/` or `openai/` namespace that discovery adds; backends
    /// expect bare model names on the wire.
    pub fn wire_model_name<'a>(&self, model: &'a str) -> &'a str {
        [self.id.as_str(), OPENAI_COMPAT_PREFIX]
            .iter()
            .find_map(|prefix| {
                model
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
            })
            .unwrap_or(model)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
    /// Tier-2 base URLs keyed by provider id, captured from configuration.
    base_url_overrides: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self {
            providers: vec![
                openai(),
                anthropic(),
                gemini(),
                ollama(),
                lmstudio(),
                llamacpp(),
            ],
            base_url_overrides: HashMap::new(),
        }
    }

    pub fn with_base_url_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (id, url) in &overrides {
            if !is_loopback(url) {
                info!("Provider {id} routed through remote host {url}");
            }
        }
        self.base_url_overrides = overrides;
        self
    }

    pub fn all(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
    }

    /// Always returns a usable descriptor; unknown ids get generic defaults.
    pub fn describe(&self, id: &str) -> ProviderDescriptor {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| ProviderDescriptor::generic(id.trim()))
    }

    /// Base URL precedence: explicit override, then the provider's configured
    /// environment value, then the static default.
    pub fn resolve_base_url(&self, id: &str, explicit: Option<&str>) -> Option<String> {
        let descriptor = self.get(id);
        let canonical = descriptor.map(|d| d.id.as_str()).unwrap_or(id);

        explicit
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.base_url_overrides
                    .get(canonical)
                    .filter(|url| !url.trim().is_empty())
                    .cloned()
            })
            .or_else(|| descriptor.and_then(|d| d.base_url.clone()))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn set_available_models(&mut self, id: &str, models: Vec<String>) {
        if let Some(provider) = self
            .providers
            .iter_mut()
            .find(|p| p.id.eq_ignore_ascii_case(id))
        {
            provider.available_models = models;
        }
    }
}

/// True when the URL points at this machine. Unparseable URLs are not loopback.
pub fn is_loopback(url: &str) -> bool {
    match Url::parse(url).ok().as_ref().and_then(Url::host) {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        None => false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in catalog
// ────────────────────────────────────────────────────────────────────────────

fn budgets(values: [u32; 7]) -> HashMap<Operation, u32> {
    Operation::ALL.into_iter().zip(values).collect()
}

/// analysis, matching, cover letter, tailoring, proofreading, suggestions, connection test
fn cloud_budgets() -> HashMap<Operation, u32> {
    budgets([1000, 800, 1500, 4000, 4000, 1500, 16])
}

/// Local reasoning models spend tokens on thinking before they answer.
fn local_budgets() -> HashMap<Operation, u32> {
    budgets([3000, 2000, 4000, 8000, 8000, 3000, 256])
}

fn models(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn openai() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "openai".to_string(),
        family: ProviderFamily::Cloud {
            api: CloudApi::OpenAiChat,
        },
        requires_api_key: true,
        default_model: Some("gpt-4o-mini".to_string()),
        available_models: models(&["gpt-4o-mini", "gpt-4o", "gpt-4.1", "gpt-4.1-mini", "o3-mini"]),
        base_url: Some("https://api.openai.com/v1".to_string()),
        token_budgets: cloud_budgets(),
        timeout_seconds: 60,
        native_json: true,
        api_key_env: Some("OPENAI_API_KEY"),
        base_url_env: Some("OPENAI_BASE_URL"),
        discovery: &[],
        remediation_hint: None,
    }
}

fn anthropic() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "anthropic".to_string(),
        family: ProviderFamily::Cloud {
            api: CloudApi::AnthropicMessages,
        },
        requires_api_key: true,
        default_model: Some("claude-sonnet-4-5".to_string()),
        available_models: models(&[
            "claude-sonnet-4-5",
            "claude-opus-4-1",
            "claude-3-5-haiku-latest",
        ]),
        base_url: Some("https://api.anthropic.com/v1".to_string()),
        token_budgets: cloud_budgets(),
        timeout_seconds: 120,
        native_json: false,
        api_key_env: Some("ANTHROPIC_API_KEY"),
        base_url_env: Some("ANTHROPIC_BASE_URL"),
        discovery: &[],
        remediation_hint: None,
    }
}

fn gemini() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "gemini".to_string(),
        family: ProviderFamily::Cloud {
            api: CloudApi::GeminiGenerateContent,
        },
        requires_api_key: true,
        default_model: Some("gemini-2.0-flash".to_string()),
        available_models: models(&["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"]),
        base_url: Some("https://generativelanguage.googleapis.com/v1beta".to_string()),
        token_budgets: cloud_budgets(),
        timeout_seconds: 60,
        native_json: true,
        api_key_env: Some("GEMINI_API_KEY"),
        base_url_env: Some("GEMINI_BASE_URL"),
        discovery: &[],
        remediation_hint: None,
    }
}

fn ollama() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "ollama".to_string(),
        family: ProviderFamily::LocalOpenAiCompatible,
        requires_api_key: false,
        default_model: None,
        available_models: Vec::new(),
        base_url: Some("http://localhost:11434".to_string()),
        token_budgets: local_budgets(),
        timeout_seconds: 600,
        native_json: true,
        api_key_env: None,
        base_url_env: Some("OLLAMA_BASE_URL"),
        discovery: &[DiscoveryEndpoint {
            path: "/api/tags",
            shape: ListingShape::NamedModels,
        }],
        remediation_hint: Some(
            "start the server with `ollama serve` and pull a model with `ollama pull <model>`.",
        ),
    }
}

fn lmstudio() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "lmstudio".to_string(),
        family: ProviderFamily::LocalOpenAiCompatible,
        requires_api_key: false,
        default_model: None,
        available_models: Vec::new(),
        base_url: Some("http://localhost:1234".to_string()),
        token_budgets: local_budgets(),
        timeout_seconds: 600,
        native_json: false,
        api_key_env: None,
        base_url_env: Some("LMSTUDIO_BASE_URL"),
        discovery: &[
            DiscoveryEndpoint {
                path: "/v1/models",
                shape: ListingShape::ModelObjects,
            },
            DiscoveryEndpoint {
                path: "/api/v0/models",
                shape: ListingShape::ModelObjects,
            },
        ],
        remediation_hint: Some(
            "open LM Studio, load a model and press \"Start Server\" in the Developer tab.",
        ),
    }
}

fn llamacpp() -> ProviderDescriptor {
    ProviderDescriptor {
        id: "llamacpp".to_string(),
        family: ProviderFamily::LocalRawHttp,
        requires_api_key: false,
        default_model: None,
        available_models: Vec::new(),
        base_url: Some("http://localhost:8080".to_string()),
        token_budgets: local_budgets(),
        timeout_seconds: 600,
        native_json: false,
        api_key_env: None,
        base_url_env: Some("LLAMACPP_BASE_URL"),
        discovery: &[
            DiscoveryEndpoint {
                path: "/v1/models",
                shape: ListingShape::ModelObjects,
            },
            DiscoveryEndpoint {
                path: "/models",
                shape: ListingShape::ModelObjects,
            },
        ],
        remediation_hint: Some(
            "run `llama-server -m <model.gguf> --port 8080` (add `-c 8192` for a larger context).",
        ),
    }
}
