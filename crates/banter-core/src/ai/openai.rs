use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::wire::ChatTurn;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Anything that can turn a message list into completion text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatTurn]) -> Result<String>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints (OpenAI, Ollama's `/v1`,
/// vLLM, LM Studio, ...).
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_timeout(base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Completion for CompletionClient {
    async fn complete(&self, model: &str, messages: &[ChatTurn]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest { model, messages };

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Completion API error {}: {}", status, text));
        }

        let completion: CompletionResponse = response.json().await?;
        completion.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Completion API returned no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_complete_reads_first_choice() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "llama3");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "Hello");
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Hi there!"}}]
                }))
            }),
        );
        let base = serve(router).await;

        let client = CompletionClient::new(&base, "sk-test");
        let messages = [ChatTurn::system("Be nice."), ChatTurn::user("Hello")];
        let text = client.complete("llama3", &messages).await.unwrap();
        assert_eq!(text, "Hi there!");
    }

    #[tokio::test]
    async fn test_complete_surfaces_upstream_status() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
        );
        let base = serve(router).await;

        let client = CompletionClient::new(&format!("{}/", base), "sk-test");
        let err = client.complete("llama3", &[ChatTurn::user("Hi")]).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = serve(router).await;

        let client = CompletionClient::new(&base, "sk-test");
        assert!(client.complete("llama3", &[ChatTurn::user("Hi")]).await.is_err());
    }
}
