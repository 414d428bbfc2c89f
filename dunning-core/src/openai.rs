//! OpenAI HTTP client.
//!
//! Two endpoints are used:
//! - `POST /realtime/sessions`: mint an ephemeral realtime session token
//! - `POST /chat/completions`: one-shot text completion
//!
//! Requests are sent once. Failures are reported as [`UpstreamError`] and are
//! never retried.

use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Missing API key")]
    MissingApiKey,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub realtime_model: String,
    pub voice: String,
    pub summary_model: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            voice: "verse".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct RealtimeSessionRequest<'a> {
    model: &'a str,
    voice: &'a str,
    instructions: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// Raw upstream reply, relayed without inspection.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

// ============================================================================
// OpenAiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, UpstreamError> {
        Self::with_base_url(config, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / proxies)
    pub fn with_base_url(config: OpenAiConfig, base_url: String) -> Result<Self, UpstreamError> {
        if config.api_key.is_empty() {
            return Err(UpstreamError::MissingApiKey);
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Request an ephemeral realtime session. On success the body is returned
    /// byte-for-byte.
    pub async fn create_realtime_session(
        &self,
        instructions: &str,
    ) -> Result<RawResponse, UpstreamError> {
        let url = format!("{}/realtime/sessions", self.base_url);
        let request = RealtimeSessionRequest {
            model: &self.config.realtime_model,
            voice: &self.config.voice,
            instructions,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let body = response.bytes().await?;
        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Run a chat completion and return the first choice's content, if any.
    pub async fn complete_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<String>, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.config.summary_model,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let body = response.bytes().await?;
        let completion: ChatCompletionResponse = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::UnexpectedResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::UnexpectedResponse("no choices".to_string()))?;

        Ok(choice.message.content)
    }
}

async fn api_error(status: reqwest::StatusCode, response: reqwest::Response) -> UpstreamError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(body);

    tracing::error!(code = status.as_u16(), message = %message, "OpenAI API error");

    UpstreamError::Api {
        code: status.as_u16(),
        message,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::with_base_url(OpenAiConfig::new("sk-test"), server.uri())
            .expect("Failed to create client")
    }

    #[test]
    fn test_missing_api_key() {
        match OpenAiClient::new(OpenAiConfig::new("")) {
            Err(UpstreamError::MissingApiKey) => {}
            other => panic!("Expected MissingApiKey, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_realtime_session_sends_model_voice_instructions() {
        let mock_server = MockServer::start().await;
        let upstream_body = r#"{"id":"sess_1","client_secret":{"value":"ek_abc","expires_at":1735689600}}"#;

        Mock::given(method("POST"))
            .and(path("/realtime/sessions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "gpt-4o-realtime-preview-2024-12-17",
                "voice": "verse",
                "instructions": "Be polite."
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(upstream_body, "application/json"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = test_client(&mock_server)
            .create_realtime_session("Be polite.")
            .await
            .expect("session should be created");

        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], upstream_body.as_bytes());
    }

    #[tokio::test]
    async fn test_realtime_session_error_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "The server had an error" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match test_client(&mock_server).create_realtime_session("x").await {
            Err(UpstreamError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "The server had an error");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_chat_returns_first_choice() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "A summary." } }]
            })))
            .mount(&mock_server)
            .await;

        let content = test_client(&mock_server)
            .complete_chat(&[ChatMessage::system("sys"), ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(content.as_deref(), Some("A summary."));
    }

    #[tokio::test]
    async fn test_complete_chat_unexpected_shape() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .complete_chat(&[ChatMessage::user("hi")])
            .await;
        assert!(matches!(result, Err(UpstreamError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // Nothing listens on port 9 on a test host
        let client =
            OpenAiClient::with_base_url(OpenAiConfig::new("sk-test"), "http://127.0.0.1:9".to_string())
                .unwrap();
        let result = client.complete_chat(&[ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(UpstreamError::Http(_))));
    }
}
