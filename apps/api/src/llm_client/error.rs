//! Error taxonomy shared by every provider backend.
//!
//! Vendors disagree on status codes and error bodies, so classification happens in
//! exactly one place: `classify_status` for HTTP responses and `classify_transport`
//! for failures below HTTP. The gateway converts a `GatewayError` into the error
//! fields of a `CompletionResult`; it never escapes `complete`.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    /// Includes timeouts and refused connections.
    Connection,
    /// Unparseable JSON or missing expected fields.
    MalformedResponse,
    /// Actionable: raise the token budget or the server's context window.
    TokenLimit,
    /// Anything the vendor reported that does not fit the kinds above.
    Provider,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Authentication => "Authentication failed",
            ErrorKind::RateLimit => "Rate limit exceeded",
            ErrorKind::Connection => "Connection failed",
            ErrorKind::MalformedResponse => "Malformed response",
            ErrorKind::TokenLimit => "Token limit exhausted",
            ErrorKind::Provider => "API error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    /// Appends a remediation hint for connection failures against self-hosted servers.
    pub fn with_hint(mut self, hint: Option<&str>) -> Self {
        if let (ErrorKind::Connection, Some(hint)) = (self.kind, hint) {
            self.message = format!("{} Hint: {hint}", self.message);
        }
        self
    }
}

/// Phrases vendors use when a request exceeds the model's context window.
const CONTEXT_OVERFLOW_MARKERS: &[&str] = &[
    "context length",
    "context window",
    "maximum context",
    "too many tokens",
    "max_tokens",
    "exceeds the context",
];

/// Maps a non-success HTTP status (plus its body) onto an `ErrorKind`.
pub fn classify_status(status: StatusCode, body: &str) -> ErrorKind {
    match status.as_u16() {
        401 | 403 => ErrorKind::Authentication,
        429 => ErrorKind::RateLimit,
        400 | 413 | 422 => {
            let lower = body.to_lowercase();
            if CONTEXT_OVERFLOW_MARKERS.iter().any(|m| lower.contains(m)) {
                ErrorKind::TokenLimit
            } else {
                ErrorKind::Provider
            }
        }
        502..=504 => ErrorKind::Connection,
        _ => ErrorKind::Provider,
    }
}

/// Maps a transport-level `reqwest` failure onto an `ErrorKind`.
pub fn classify_transport(err: &reqwest::Error) -> ErrorKind {
    if err.is_decode() || err.is_body() {
        ErrorKind::MalformedResponse
    } else {
        // timeouts, refused connections, DNS and TLS failures
        ErrorKind::Connection
    }
}

/// Pulls a human-readable message out of a vendor error body.
///
/// Handles `{"error": {"message": ...}}` (OpenAI, Anthropic, Gemini),
/// `{"error": "..."}` (Ollama, llama.cpp) and `{"message": ...}`; falls back to the raw body.
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .and_then(|m| m.as_str())
            .or_else(|| v.get("error").and_then(|e| e.as_str()))
            .or_else(|| v.get("message").and_then(|m| m.as_str()))
            .map(str::to_string)
    });

    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().chars().take(500).collect(),
    }
}
