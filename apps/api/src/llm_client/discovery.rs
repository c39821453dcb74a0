//! Model Discovery: asks a local inference server which models it has loaded.
//!
//! Discovery is informative only: every failure (refused connection, timeout,
//! non-success status, unexpected JSON) yields an empty list, never an error.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm_client::providers::{ListingShape, ProviderDescriptor, OPENAI_COMPAT_PREFIX};

/// Per-endpoint budget; a slow candidate must not hold up the next one.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tries each listing endpoint of `descriptor` in order and returns the first
/// non-empty set of model identifiers.
pub async fn discover_models(
    client: &Client,
    descriptor: &ProviderDescriptor,
    base_url: &str,
) -> Vec<String> {
    discover_models_with_timeout(client, descriptor, base_url, DISCOVERY_TIMEOUT).await
}

/// `discover_models` with an explicit per-endpoint timeout.
pub async fn discover_models_with_timeout(
    client: &Client,
    descriptor: &ProviderDescriptor,
    base_url: &str,
    timeout: Duration,
) -> Vec<String> {
    let base_url = base_url.trim_end_matches('/');

    for endpoint in descriptor.discovery {
        let url = format!("{base_url}{}", endpoint.path);
        debug!("Discovering models for {} at {url}", descriptor.id);

        let body = match fetch_listing(client, &url, timeout).await {
            Ok(body) => body,
            Err(reason) => {
                warn!("Model discovery via {url} failed: {reason}");
                continue;
            }
        };

        let models = parse_listing(endpoint.shape, &body, &descriptor.id);
        if !models.is_empty() {
            info!(
                "Discovered {} model(s) for {} via {}",
                models.len(),
                descriptor.id,
                endpoint.path
            );
            return models;
        }
    }

    Vec::new()
}

async fn fetch_listing(client: &Client, url: &str, timeout: Duration) -> Result<Value, String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }

    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// Maps a listing payload onto namespaced model identifiers.
///
/// `NamedModels` entries are prefixed with the provider id (`ollama/llama3:8b`);
/// `ModelObjects` entries with the OpenAI-compatibility marker (`openai/qwen2.5-7b`).
pub fn parse_listing(shape: ListingShape, body: &Value, provider_id: &str) -> Vec<String> {
    let (field, key, prefix) = match shape {
        ListingShape::NamedModels => ("models", "name", provider_id),
        ListingShape::ModelObjects => ("data", "id", OPENAI_COMPAT_PREFIX),
    };

    body.get(field)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get(key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| format!("{prefix}/{name}"))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::providers::ProviderRegistry;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SHORT_TIMEOUT: Duration = Duration::from_millis(200);

    /// Serves an LM Studio style listing, but accepts and then never answers requests
    /// for the paths in `stalled`.
    async fn listing_server(stalled: &'static [&'static str]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    if stalled.iter().any(|path| request.starts_with(&format!("GET {path} "))) {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        return;
                    }
                    let body = r#"{"data":[{"id":"mistral-7b"}]}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_stalled_candidate_does_not_block_the_next() {
        let base_url = listing_server(&["/v1/models"]).await;
        let registry = ProviderRegistry::builtin();
        let lmstudio = registry.describe("lmstudio");

        let models = tokio::time::timeout(
            Duration::from_secs(5),
            discover_models_with_timeout(&Client::new(), &lmstudio, &base_url, SHORT_TIMEOUT),
        )
        .await
        .expect("discovery should give up on the stalled endpoint");
        assert_eq!(models, vec!["openai/mistral-7b"]);
    }

    #[tokio::test]
    async fn test_every_candidate_timing_out_yields_empty_list() {
        let base_url = listing_server(&["/v1/models", "/api/v0/models"]).await;
        let registry = ProviderRegistry::builtin();
        let lmstudio = registry.describe("lmstudio");

        let models = tokio::time::timeout(
            Duration::from_secs(5),
            discover_models_with_timeout(&Client::new(), &lmstudio, &base_url, SHORT_TIMEOUT),
        )
        .await
        .expect("discovery should give up on stalled endpoints");
        assert!(models.is_empty());
    }

    #[test]
    fn test_parse_named_models_shape() {
        let body = json!({"models": [{"name": "llama3:8b"}, {"name": "qwen3:14b"}, {"size": 1}]});
        assert_eq!(
            parse_listing(ListingShape::NamedModels, &body, "ollama"),
            vec!["ollama/llama3:8b", "ollama/qwen3:14b"]
        );
    }

    #[test]
    fn test_parse_model_objects_shape() {
        let body = json!({"object": "list", "data": [{"id": "qwen2.5-7b-instruct", "object": "model"}]});
        assert_eq!(
            parse_listing(ListingShape::ModelObjects, &body, "lmstudio"),
            vec!["openai/qwen2.5-7b-instruct"]
        );
    }

    #[test]
    fn test_parse_wrong_shape_is_empty() {
        let body = json!({"data": [{"id": "x"}]});
        assert!(parse_listing(ListingShape::NamedModels, &body, "ollama").is_empty());
        assert!(parse_listing(ListingShape::ModelObjects, &json!([]), "x").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_empty_list() {
        let registry = ProviderRegistry::builtin();
        let lmstudio = registry.describe("lmstudio");
        // port 9 (discard) is closed on test machines; every candidate is refused
        let models = discover_models(&Client::new(), &lmstudio, "http://127.0.0.1:9").await;
        assert!(models.is_empty());
    }

    #[tokio::test]
    async fn test_falls_through_to_next_candidate() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/v1/models")
            .with_status(500)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/api/v0/models")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"id":"mistral-7b"}]}"#)
            .create_async()
            .await;

        let registry = ProviderRegistry::builtin();
        let lmstudio = registry.describe("lmstudio");
        let models = discover_models(&Client::new(), &lmstudio, &server.url()).await;
        assert_eq!(models, vec!["openai/mistral-7b"]);
    }

    #[tokio::test]
    async fn test_empty_first_listing_tries_next() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/models")
            .with_status(200)
            .with_body(r#"{"data":[{"id":"gemma-2b.gguf"}]}"#)
            .create_async()
            .await;

        let registry = ProviderRegistry::builtin();
        let llamacpp = registry.describe("llamacpp");
        let models = discover_models(&Client::new(), &llamacpp, &server.url()).await;
        assert_eq!(models, vec!["openai/gemma-2b.gguf"]);
    }

    #[tokio::test]
    async fn test_ollama_tags_listing() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3.1:8b","size":4661224676}]}"#)
            .create_async()
            .await;

        let registry = ProviderRegistry::builtin();
        let ollama = registry.describe("ollama");
        let models = discover_models(&Client::new(), &ollama, &format!("{}/", server.url())).await;
        assert_eq!(models, vec!["ollama/llama3.1:8b"]);
    }

    #[tokio::test]
    async fn test_malformed_listing_yields_empty_list() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let registry = ProviderRegistry::builtin();
        let ollama = registry.describe("ollama");
        assert!(discover_models(&Client::new(), &ollama, &server.url())
            .await
            .is_empty());
    }
}
