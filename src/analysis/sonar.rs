use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnalysisError, CompletionClient};

pub const DEFAULT_SONAR_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_SONAR_MODEL: &str = "sonar-pro";

const SYSTEM_PROMPT: &str = "Be precise and concise.";

/// Connect timeout only; completions may take as long as they take.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Perplexity Sonar chat-completions client.
pub struct SonarClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl SonarClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_defaults(api_key: &str) -> Self {
        Self::new(api_key, DEFAULT_SONAR_BASE_URL, DEFAULT_SONAR_MODEL)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Primary text payload; empty when the response carries none.
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for SonarClient {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AnalysisError::Connection(self.base_url.clone())
                } else {
                    AnalysisError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ResponseParsing(e.to_string()))?;

        Ok(parsed.into_text())
    }

    fn name(&self) -> &str {
        "sonar"
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    /// Serve `router` on an ephemeral localhost port.
    async fn spawn_upstream(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = SonarClient::new("key", "https://api.perplexity.ai/", "sonar-pro");
        assert_eq!(client.base_url, "https://api.perplexity.ai");
        assert_eq!(client.model(), "sonar-pro");
    }

    #[test]
    fn defaults_point_at_sonar_pro() {
        let client = SonarClient::with_defaults("key");
        assert_eq!(client.base_url, DEFAULT_SONAR_BASE_URL);
        assert_eq!(client.model(), DEFAULT_SONAR_MODEL);
    }

    #[test]
    fn text_extraction_tolerates_missing_fields() {
        let full: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "Hello"}}]
        }))
        .unwrap();
        assert_eq!(full.into_text(), "Hello");

        let empty: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.into_text(), "");

        let no_message: ChatResponse =
            serde_json::from_value(json!({"choices": [{}]})).unwrap();
        assert_eq!(no_message.into_text(), "");
    }

    #[tokio::test]
    async fn complete_sends_bearer_and_chat_body() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer secret");
                assert_eq!(body["model"], "sonar-pro");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][0]["content"], "Be precise and concise.");
                let prompt = body["messages"][1]["content"].as_str().unwrap().to_string();
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": format!("re: {prompt}")}}]
                }))
            }),
        );
        let addr = spawn_upstream(router).await;

        let client = SonarClient::new("secret", &format!("http://{addr}"), "sonar-pro");
        let text = client.complete("What is HDL?").await.unwrap();
        assert_eq!(text, "re: What is HDL?");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = spawn_upstream(router).await;

        let client = SonarClient::new("secret", &format!("http://{addr}"), "sonar-pro");
        match client.complete("x").await.unwrap_err() {
            AnalysisError::Upstream { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = SonarClient::new("secret", &format!("http://{addr}"), "sonar-pro");
        let err = client.complete("x").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Connection(_)), "got {err}");
    }
}
