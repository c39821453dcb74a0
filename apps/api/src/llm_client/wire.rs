//! Vendor request/response shapes.
//!
//! Each backend family gets a `build_request` / `parse_response` pair that turns a
//! conversation into the vendor's JSON and the vendor's JSON back into a
//! `ParsedCompletion`. Unified families deserialize into typed structs; the raw-HTTP
//! family walks the payload by hand because local servers disagree on field placement.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm_client::error::GatewayError;
use crate::llm_client::providers::{CloudApi, ProviderFamily};
use crate::llm_client::{ConversationMessage, ResponseFormat, Role, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinishReason {
    Stop,
    /// Cut off by the output token limit.
    Length,
    Other,
}

impl FinishReason {
    fn from_vendor(reason: Option<&str>) -> Self {
        match reason.map(str::to_ascii_lowercase).as_deref() {
            Some("length" | "max_tokens" | "max_output_tokens" | "limit") => FinishReason::Length,
            Some("stop" | "end_turn" | "stop_sequence" | "eos") | None => FinishReason::Stop,
            Some(_) => FinishReason::Other,
        }
    }
}

/// Vendor-neutral view of a completion response.
#[derive(Debug, Clone)]
pub(crate) struct ParsedCompletion {
    pub content: Option<String>,
    /// Secondary field some reasoning models put the answer in.
    pub reasoning: Option<String>,
    pub finish: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub(crate) struct WireRequest {
    pub path: String,
    pub body: Value,
}

pub(crate) struct RequestParams<'a> {
    pub model: &'a str,
    pub messages: &'a [ConversationMessage],
    pub format: ResponseFormat,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Joins base URL and path without doubling a `/v1` segment the user already configured.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    match path.strip_prefix("/v1") {
        Some(rest) if base.ends_with("/v1") && rest.starts_with('/') => format!("{base}{rest}"),
        _ => format!("{base}{path}"),
    }
}

pub(crate) fn build_request(family: ProviderFamily, params: &RequestParams<'_>) -> WireRequest {
    match family {
        ProviderFamily::Cloud {
            api: CloudApi::OpenAiChat,
        } => WireRequest {
            path: "/chat/completions".to_string(),
            body: chat_completion_body(params),
        },
        ProviderFamily::Cloud {
            api: CloudApi::AnthropicMessages,
        } => WireRequest {
            path: "/messages".to_string(),
            body: anthropic_body(params),
        },
        ProviderFamily::Cloud {
            api: CloudApi::GeminiGenerateContent,
        } => WireRequest {
            path: format!("/models/{}:generateContent", params.model),
            body: gemini_body(params),
        },
        ProviderFamily::LocalOpenAiCompatible => WireRequest {
            path: "/v1/chat/completions".to_string(),
            body: chat_completion_body(params),
        },
        ProviderFamily::LocalRawHttp => WireRequest {
            path: "/v1/chat/completions".to_string(),
            body: raw_chat_body(params),
        },
    }
}

pub(crate) fn apply_auth(
    builder: RequestBuilder,
    family: ProviderFamily,
    api_key: Option<&str>,
) -> RequestBuilder {
    let Some(key) = api_key.filter(|k| !k.is_empty()) else {
        return builder;
    };
    match family {
        ProviderFamily::Cloud {
            api: CloudApi::AnthropicMessages,
        } => builder
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        ProviderFamily::Cloud {
            api: CloudApi::GeminiGenerateContent,
        } => builder.header("x-goog-api-key", key),
        _ => builder.bearer_auth(key),
    }
}

pub(crate) fn parse_response(
    family: ProviderFamily,
    body: &str,
) -> Result<ParsedCompletion, GatewayError> {
    match family {
        ProviderFamily::Cloud {
            api: CloudApi::OpenAiChat,
        }
        | ProviderFamily::LocalOpenAiCompatible => parse_chat_completion(body),
        ProviderFamily::Cloud {
            api: CloudApi::AnthropicMessages,
        } => parse_anthropic(body),
        ProviderFamily::Cloud {
            api: CloudApi::GeminiGenerateContent,
        } => parse_gemini(body),
        ProviderFamily::LocalRawHttp => parse_raw(body),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI chat completions (cloud + OpenAI-compatible local servers)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessageBody>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessageBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

fn chat_completion_body(params: &RequestParams<'_>) -> Value {
    let request = ChatCompletionRequest {
        model: params.model,
        messages: params.messages,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        stream: false,
        response_format: (params.format == ResponseFormat::Json)
            .then(|| json!({"type": "json_object"})),
    };
    serde_json::to_value(&request).unwrap_or_else(|_| json!({}))
}

fn parse_chat_completion(body: &str) -> Result<ParsedCompletion, GatewayError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("invalid chat completion payload: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::malformed("response contained no choices"))?;
    let message = choice.message.unwrap_or_default();

    Ok(ParsedCompletion {
        content: message.content,
        reasoning: message.reasoning_content.or(message.reasoning),
        finish: FinishReason::from_vendor(choice.finish_reason.as_deref()),
        usage: response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens))
            .unwrap_or_default(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic messages
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

fn anthropic_body(params: &RequestParams<'_>) -> Value {
    let system: Vec<&str> = params
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let request = AnthropicRequest {
        model: params.model,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: params
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
    };
    serde_json::to_value(&request).unwrap_or_else(|_| json!({}))
}

fn parse_anthropic(body: &str) -> Result<ParsedCompletion, GatewayError> {
    let response: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("invalid messages payload: {e}")))?;

    let collect = |kind: &str| -> Option<String> {
        let parts: Vec<&str> = response
            .content
            .iter()
            .filter(|b| b.block_type == kind)
            .filter_map(|b| b.text.as_deref().or(b.thinking.as_deref()))
            .collect();
        (!parts.is_empty()).then(|| parts.join(""))
    };

    let usage = response
        .usage
        .as_ref()
        .map(|u| {
            let total = u.input_tokens.zip(u.output_tokens).map(|(i, o)| i + o);
            Usage::new(u.input_tokens, u.output_tokens, total)
        })
        .unwrap_or_default();

    Ok(ParsedCompletion {
        content: collect("text"),
        reasoning: collect("thinking"),
        finish: FinishReason::from_vendor(response.stop_reason.as_deref()),
        usage,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini generateContent
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

fn gemini_body(params: &RequestParams<'_>) -> Value {
    let mut contents = Vec::new();
    let mut system_parts = Vec::new();

    for msg in params.messages {
        match msg.role {
            Role::System => system_parts.push(json!({ "text": msg.content })),
            Role::User => contents.push(json!({ "role": "user", "parts": [{ "text": msg.content }] })),
            Role::Assistant => {
                contents.push(json!({ "role": "model", "parts": [{ "text": msg.content }] }))
            }
        }
    }

    let mut generation_config = json!({
        "maxOutputTokens": params.max_tokens,
        "temperature": params.temperature,
    });
    if params.format == ResponseFormat::Json {
        generation_config["responseMimeType"] = json!("application/json");
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });
    if !system_parts.is_empty() {
        body["systemInstruction"] = json!({ "parts": system_parts });
    }
    body
}

fn parse_gemini(body: &str) -> Result<ParsedCompletion, GatewayError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("invalid generateContent payload: {e}")))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::malformed("response contained no candidates"))?;
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let join = |thought: bool| -> Option<String> {
        let texts: Vec<&str> = parts
            .iter()
            .filter(|p| p.thought == thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!texts.is_empty()).then(|| texts.join(""))
    };

    Ok(ParsedCompletion {
        content: join(false),
        reasoning: join(true),
        finish: FinishReason::from_vendor(candidate.finish_reason.as_deref()),
        usage: response
            .usage_metadata
            .map(|u| {
                Usage::new(
                    u.prompt_token_count,
                    u.candidates_token_count,
                    u.total_token_count,
                )
            })
            .unwrap_or_default(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Raw HTTP (llama.cpp server and similar)
// ────────────────────────────────────────────────────────────────────────────

/// Built by hand: these servers reject `response_format` and unknown fields.
fn raw_chat_body(params: &RequestParams<'_>) -> Value {
    let messages: Vec<Value> = params
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();
    json!({
        "model": params.model,
        "messages": messages,
        "max_tokens": params.max_tokens,
        "temperature": params.temperature,
        "stream": false,
    })
}

fn parse_raw(body: &str) -> Result<ParsedCompletion, GatewayError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("server returned invalid JSON: {e}")))?;

    let str_at = |pointer: &str| {
        payload
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let u32_at = |pointer: &str| {
        payload
            .pointer(pointer)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };

    let content = str_at("/choices/0/message/content")
        .or_else(|| str_at("/choices/0/text"))
        .or_else(|| str_at("/content"));
    let reasoning = str_at("/choices/0/message/reasoning_content")
        .or_else(|| str_at("/choices/0/message/reasoning"));

    if content.is_none() && reasoning.is_none() && payload.get("choices").is_none() {
        return Err(GatewayError::malformed(
            "response had neither `choices` nor `content`",
        ));
    }

    let truncated = payload.get("truncated").and_then(Value::as_bool) == Some(true)
        || str_at("/stop_type").as_deref() == Some("limit");
    let finish = if truncated {
        FinishReason::Length
    } else {
        FinishReason::from_vendor(str_at("/choices/0/finish_reason").as_deref())
    };

    let prompt = u32_at("/usage/prompt_tokens").or_else(|| u32_at("/tokens_evaluated"));
    let completion = u32_at("/usage/completion_tokens").or_else(|| u32_at("/tokens_predicted"));
    let total = u32_at("/usage/total_tokens")
        .or_else(|| prompt.zip(completion).map(|(p, c)| p + c));

    Ok(ParsedCompletion {
        content,
        reasoning,
        finish,
        usage: Usage::new(prompt, completion, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<ConversationMessage> {
        vec![
            ConversationMessage::system("You are terse."),
            ConversationMessage::user("Say hi"),
        ]
    }

    fn params<'a>(messages: &'a [ConversationMessage], format: ResponseFormat) -> RequestParams<'a> {
        RequestParams {
            model: "m",
            messages,
            format,
            max_tokens: 100,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_join_url_avoids_double_v1() {
        assert_eq!(
            join_url("http://localhost:1234/v1/", "/v1/models"),
            "http://localhost:1234/v1/models"
        );
        assert_eq!(
            join_url("http://localhost:1234", "/v1/models"),
            "http://localhost:1234/v1/models"
        );
        assert_eq!(
            join_url("https://api.openai.com/v1", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_chat_body_carries_response_format_only_for_json() {
        let msgs = conversation();
        let req = build_request(
            ProviderFamily::LocalOpenAiCompatible,
            &params(&msgs, ResponseFormat::Json),
        );
        assert_eq!(req.body["response_format"]["type"], "json_object");
        assert_eq!(req.body["messages"][0]["role"], "system");

        let req = build_request(
            ProviderFamily::LocalOpenAiCompatible,
            &params(&msgs, ResponseFormat::Text),
        );
        assert!(req.body.get("response_format").is_none());
    }

    #[test]
    fn test_anthropic_body_lifts_system_prompt() {
        let msgs = conversation();
        let req = build_request(
            ProviderFamily::Cloud {
                api: CloudApi::AnthropicMessages,
            },
            &params(&msgs, ResponseFormat::Text),
        );
        assert_eq!(req.path, "/messages");
        assert_eq!(req.body["system"], "You are terse.");
        assert_eq!(req.body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(req.body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_gemini_body_shape() {
        let msgs = conversation();
        let req = build_request(
            ProviderFamily::Cloud {
                api: CloudApi::GeminiGenerateContent,
            },
            &params(&msgs, ResponseFormat::Json),
        );
        assert_eq!(req.path, "/models/m:generateContent");
        assert_eq!(req.body["systemInstruction"]["parts"][0]["text"], "You are terse.");
        assert_eq!(req.body["contents"][0]["parts"][0]["text"], "Say hi");
        assert_eq!(
            req.body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_raw_body_never_sends_response_format() {
        let msgs = conversation();
        let req = build_request(ProviderFamily::LocalRawHttp, &params(&msgs, ResponseFormat::Json));
        assert!(req.body.get("response_format").is_none());
        assert_eq!(req.body["stream"], false);
    }

    #[test]
    fn test_parse_chat_completion_with_reasoning_field() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"","reasoning_content":"answer"},"finish_reason":"stop"}],
                       "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed = parse_response(ProviderFamily::LocalOpenAiCompatible, body).unwrap();
        assert_eq!(parsed.content.as_deref(), Some(""));
        assert_eq!(parsed.reasoning.as_deref(), Some("answer"));
        assert_eq!(parsed.finish, FinishReason::Stop);
        assert_eq!(parsed.usage.total_tokens, Some(15));
    }

    #[test]
    fn test_parse_chat_completion_without_choices_is_malformed() {
        let err = parse_response(ProviderFamily::LocalOpenAiCompatible, r#"{"choices":[]}"#)
            .unwrap_err();
        assert_eq!(err.kind, crate::llm_client::error::ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_parse_anthropic() {
        let body = r#"{"content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Hello"}],
                       "stop_reason":"max_tokens","usage":{"input_tokens":7,"output_tokens":3}}"#;
        let parsed = parse_response(
            ProviderFamily::Cloud {
                api: CloudApi::AnthropicMessages,
            },
            body,
        )
        .unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Hello"));
        assert_eq!(parsed.reasoning.as_deref(), Some("hmm"));
        assert_eq!(parsed.finish, FinishReason::Length);
        assert_eq!(parsed.usage.total_tokens, Some(10));
    }

    #[test]
    fn test_parse_gemini() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}],"role":"model"},"finishReason":"STOP"}],
                       "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"totalTokenCount":6}}"#;
        let parsed = parse_response(
            ProviderFamily::Cloud {
                api: CloudApi::GeminiGenerateContent,
            },
            body,
        )
        .unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Hi there"));
        assert_eq!(parsed.finish, FinishReason::Stop);
        assert_eq!(parsed.usage.prompt_tokens, Some(4));
    }

    #[test]
    fn test_parse_raw_native_completion_shape() {
        let body = r#"{"content":"Hello","stop_type":"limit","tokens_evaluated":12,"tokens_predicted":8}"#;
        let parsed = parse_response(ProviderFamily::LocalRawHttp, body).unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Hello"));
        assert_eq!(parsed.finish, FinishReason::Length);
        assert_eq!(parsed.usage.total_tokens, Some(20));
    }

    #[test]
    fn test_parse_raw_rejects_unknown_shape() {
        assert!(parse_response(ProviderFamily::LocalRawHttp, r#"{"status":"loading"}"#).is_err());
        assert!(parse_response(ProviderFamily::LocalRawHttp, "not json").is_err());
    }
}
