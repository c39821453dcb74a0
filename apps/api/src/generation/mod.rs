//! Feature functions: job analysis, skill matching, cover letters, tailoring, suggestions.
//!
//! Every feature runs the same cycle per model call:
//! Idle → BuildingPrompt → AwaitingCompletion → ParsingResponse → Success | Failed.
//! There are no automatic retries here; a failed completion fails the feature and
//! the error names the stage it failed in.
//!
//! All model calls go through `CompletionBackend`, never a vendor client.

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::json_extract::extract_json_payload;
use crate::llm_client::providers::Operation;
use crate::llm_client::{CompletionBackend, ConversationMessage, ResponseFormat};

pub mod cover_letter;
pub mod handlers;
pub mod jd_parser;
pub mod post_process;
pub mod prompts;
pub mod skills;
pub mod tailor;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Matching,
    Generation,
    Tailoring,
    Proofreading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Analysis => "Job analysis",
            Stage::Matching => "Skill matching",
            Stage::Generation => "Generation",
            Stage::Tailoring => "Tailoring",
            Stage::Proofreading => "Proofreading",
        };
        f.write_str(label)
    }
}

/// Business-level failure of a feature. Serializes as
/// `{"error": "<Stage> failed: …", "stage": …, "request_id": …}`.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {message}")]
pub struct FeatureError {
    pub stage: Stage,
    pub message: String,
    pub request_id: String,
}

impl FeatureError {
    pub fn new(stage: Stage, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            stage,
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }
}

impl Serialize for FeatureError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("FeatureError", 3)?;
        body.serialize_field("error", &self.to_string())?;
        body.serialize_field("stage", &self.stage)?;
        body.serialize_field("request_id", &self.request_id)?;
        body.end()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared call helpers
// ────────────────────────────────────────────────────────────────────────────

pub(crate) fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The fixed two-message shape every feature uses.
pub(crate) fn conversation(system: &str, user: String) -> Vec<ConversationMessage> {
    vec![
        ConversationMessage::system(system),
        ConversationMessage::user(user),
    ]
}

pub(crate) fn to_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// One free-text model call. Empty output counts as a failure.
pub(crate) async fn complete_text(
    llm: &dyn CompletionBackend,
    conversation: &[ConversationMessage],
    operation: Operation,
    stage: Stage,
    request_id: &str,
) -> Result<String, FeatureError> {
    debug!(request_id, stage = %stage, "awaiting completion");
    let content = llm
        .chat(conversation, operation, ResponseFormat::Text, request_id)
        .await
        .into_result()
        .map_err(|e| FeatureError::new(stage, e, request_id))?;

    if content.trim().is_empty() {
        return Err(FeatureError::new(stage, "model returned no text", request_id));
    }
    Ok(content)
}

/// One JSON model call; the payload is dug out of whatever text surrounds it.
pub(crate) async fn complete_json(
    llm: &dyn CompletionBackend,
    conversation: &[ConversationMessage],
    operation: Operation,
    stage: Stage,
    request_id: &str,
) -> Result<Value, FeatureError> {
    debug!(request_id, stage = %stage, "awaiting completion");
    let content = llm
        .chat(conversation, operation, ResponseFormat::Json, request_id)
        .await
        .into_result()
        .map_err(|e| FeatureError::new(stage, e, request_id))?;

    debug!(request_id, stage = %stage, "parsing response");
    extract_json_payload(&content).ok_or_else(|| {
        let preview: String = content.trim().chars().take(120).collect();
        FeatureError::new(
            stage,
            format!("response was not valid JSON: {preview:?}"),
            request_id,
        )
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted backend for pipeline tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_client::providers::Operation;
    use crate::llm_client::{
        CompletionBackend, CompletionResult, ConversationMessage, ResponseFormat, Usage,
    };

    /// Replies with canned outputs in order and records every conversation it saw.
    pub struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub calls: Mutex<Vec<(Operation, Vec<ConversationMessage>)>>,
    }

    impl ScriptedBackend {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Every message text sent to the model, joined.
        pub fn sent_text(&self) -> String {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(_, msgs)| msgs.iter().map(|m| m.content.clone()))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn chat(
            &self,
            conversation: &[ConversationMessage],
            operation: Operation,
            _format: ResponseFormat,
            request_id: &str,
        ) -> CompletionResult {
            self.calls
                .lock()
                .unwrap()
                .push((operation, conversation.to_vec()));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("Connection failed: script exhausted".to_string()));

            let (success, content, error_message) = match reply {
                Ok(text) => (true, text, None),
                Err(e) => (false, String::new(), Some(e)),
            };
            CompletionResult {
                success,
                content,
                model_used: "scripted".to_string(),
                usage: Usage::default(),
                error_message,
                error_kind: None,
                request_id: request_id.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_error_body_has_error_and_request_id() {
        let err = FeatureError::new(Stage::Matching, "Rate limit exceeded: slow down", "req-1");
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(
            body,
            json!({
                "error": "Skill matching failed: Rate limit exceeded: slow down",
                "stage": "matching",
                "request_id": "req-1"
            })
        );
    }

    #[tokio::test]
    async fn test_complete_json_reports_unparseable_output() {
        let llm = testing::ScriptedBackend::new(vec![Ok("Sorry, I can't do that.")]);
        let conv = conversation("sys", "user".to_string());
        let err = complete_json(&llm, &conv, Operation::JobAnalysis, Stage::Analysis, "r1")
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Analysis);
        assert!(err.message.contains("not valid JSON"));
        assert_eq!(err.request_id, "r1");
    }

    #[tokio::test]
    async fn test_complete_text_propagates_gateway_error_unchanged() {
        let llm = testing::ScriptedBackend::new(vec![Err("Connection failed: refused")]);
        let conv = conversation("sys", "user".to_string());
        let err = complete_text(&llm, &conv, Operation::Suggestions, Stage::Generation, "r2")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Generation failed: Connection failed: refused");
    }
}
