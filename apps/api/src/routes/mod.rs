pub mod health;
pub mod llm;
pub mod privacy;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Gateway API
        .route("/api/v1/llm/providers", get(llm::handle_list_providers))
        .route("/api/v1/llm/models", get(llm::handle_list_models))
        .route("/api/v1/llm/connection", get(llm::handle_test_connection))
        .route("/api/v1/llm/complete", post(llm::handle_complete))
        // Resume feature API
        .route(
            "/api/v1/resumes/analyze-job",
            post(handlers::handle_analyze_job),
        )
        .route(
            "/api/v1/resumes/match-skills",
            post(handlers::handle_match_skills),
        )
        .route(
            "/api/v1/resumes/cover-letter",
            post(handlers::handle_cover_letter),
        )
        .route("/api/v1/resumes/tailor", post(handlers::handle_tailor))
        .route(
            "/api/v1/resumes/suggestions",
            post(handlers::handle_suggestions),
        )
        // Privacy API
        .route("/api/v1/privacy/sanitize", post(privacy::handle_sanitize))
        .route("/api/v1/privacy/recombine", post(privacy::handle_recombine))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::generation::testing::ScriptedBackend;
    use crate::llm_client::providers::ProviderRegistry;
    use crate::llm_client::LlmGateway;

    fn app(replies: Vec<Result<&str, &str>>) -> Router {
        let gateway = LlmGateway::new(
            ProviderRegistry::builtin(),
            HashMap::new(),
            "openai",
            None,
        )
        .unwrap();
        build_router(AppState {
            gateway,
            llm: Arc::new(ScriptedBackend::new(replies)),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(vec![]), "GET", "/health", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "resume-copilot");
    }

    #[tokio::test]
    async fn test_empty_jd_is_rejected() {
        let (status, body) = send(
            app(vec![]),
            "POST",
            "/api/v1/resumes/analyze-job",
            json!({"jd_text": "   "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_job_round_trip() {
        let (status, body) = send(
            app(vec![Ok(r#"{"company_name": "Acme Corp", "job_position": "SRE"}"#)]),
            "POST",
            "/api/v1/resumes/analyze-job",
            json!({"jd_text": "Acme Corp is hiring an SRE"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["company_name"], "Acme Corp");
        assert_eq!(body["required_skills"], json!([]));
    }

    #[tokio::test]
    async fn test_feature_failure_is_bad_gateway_with_request_id() {
        let (status, body) = send(
            app(vec![Err("Rate limit exceeded: try later")]),
            "POST",
            "/api/v1/resumes/suggestions",
            json!({"resume": {"skills": ["Go"]}, "jd_text": "Go developer"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Generation failed: Rate limit exceeded: try later");
        assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_api_key_comes_back_as_failed_result() {
        let (status, body) = send(
            app(vec![]),
            "POST",
            "/api/v1/llm/complete",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error_message"]
            .as_str()
            .unwrap()
            .contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_complete_ignores_base_url_from_request_body() {
        let mut configured = mockito::Server::new_async().await;
        let mut elsewhere = mockito::Server::new_async().await;
        let expected = configured
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-secret")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}]})
                    .to_string(),
            )
            .create_async()
            .await;
        let stray = elsewhere
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let registry = ProviderRegistry::builtin().with_base_url_overrides(HashMap::from([(
            "openai".to_string(),
            configured.url(),
        )]));
        let gateway = LlmGateway::new(
            registry,
            HashMap::from([("openai".to_string(), "sk-secret".to_string())]),
            "openai",
            None,
        )
        .unwrap();
        let app = build_router(AppState {
            gateway,
            llm: Arc::new(ScriptedBackend::new(vec![])),
        });

        let (status, body) = send(
            app,
            "POST",
            "/api/v1/llm/complete",
            json!({
                "messages": [{"role": "user", "content": "hi"}],
                "options": {"base_url": elsewhere.url()}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true, "{body}");
        expected.assert_async().await;
        stray.assert_async().await;
    }

    #[tokio::test]
    async fn test_providers_and_catalog_models() {
        let (_, providers) = send(app(vec![]), "GET", "/api/v1/llm/providers", Value::Null).await;
        let ids: Vec<&str> = providers
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|p| p["id"].as_str())
            .collect();
        assert!(ids.contains(&"ollama") && ids.contains(&"anthropic"));

        let (status, models) = send(
            app(vec![]),
            "GET",
            "/api/v1/llm/models?provider=OpenAI",
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(models["provider"], "openai");
        assert!(models["models"]
            .as_array()
            .unwrap()
            .contains(&json!("gpt-4o-mini")));
    }

    #[tokio::test]
    async fn test_privacy_split_and_merge() {
        let resume = json!({"email": "x@y.z", "skills": ["Rust"]});
        let (status, split) = send(app(vec![]), "POST", "/api/v1/privacy/sanitize", json!({"resume": resume})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(split["professional_content"].get("email").is_none());

        let (_, merged) = send(app(vec![]), "POST", "/api/v1/privacy/recombine", split).await;
        assert_eq!(merged, resume);
    }
}
