use std::sync::Arc;

use crate::llm_client::{CompletionBackend, LlmGateway};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Gateway bound to the configured provider; used for raw completions and listings.
    pub gateway: LlmGateway,
    /// What the feature functions call. The gateway itself in production.
    pub llm: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(gateway: LlmGateway) -> Self {
        Self {
            llm: Arc::new(gateway.clone()),
            gateway,
        }
    }
}
