//! Model proxy HTTP client.

use ghbridge_core::{AccessToken, Error, ModelConfig, Result};
use tracing::{debug, warn};

use crate::types::{ChatMessage, ChatRequest, ChatResponse};

/// Chat completions client.
pub struct ModelProxyClient {
    url: String,
    api_key: AccessToken,
    model_id: String,
    max_tokens: u32,
    temperature: f64,
    request_id: Option<String>,
    feature: Option<String>,
    client: reqwest::Client,
}

impl ModelProxyClient {
    /// Create a client reading the API key from `config.api_key_env`.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = AccessToken::from_env(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ModelConfig, api_key: AccessToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ghbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.completions_url(),
            api_key,
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            request_id: config.request_id.clone(),
            feature: config.feature.clone(),
            client,
        })
    }

    /// Endpoint the client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one completion and return the first choice's text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatRequest {
            model: &self.model_id,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            url = %self.url,
            model = %self.model_id,
            messages = messages.len(),
            "Model proxy request"
        );

        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(&body);
        if let Some(id) = &self.request_id {
            request = request.header("X-Request-ID", id);
        }
        if let Some(feature) = &self.feature {
            request = request.header("X-Feature", feature);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(
                status = status_code,
                message = message,
                "Model proxy error response"
            );
            return Err(Error::Api {
                status: status_code,
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| Error::Other(anyhow::anyhow!("Model proxy returned no choices")))
    }

    /// Single-turn completion with an optional system prompt.
    pub async fn ask(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ModelConfig {
        ModelConfig {
            base_url: base_url.to_string(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = ModelConfig {
            api_key_env: "GHBRIDGE_TEST_MODEL_KEY_MISSING".to_string(),
            ..ModelConfig::default()
        };
        std::env::remove_var("GHBRIDGE_TEST_MODEL_KEY_MISSING");

        match ModelProxyClient::from_config(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("GHBRIDGE_TEST_MODEL_KEY_MISSING")),
            Err(other) => panic!("Expected config error, got {:?}", other),
            Ok(_) => panic!("Expected config error"),
        }
    }

    #[test]
    fn test_stream_selects_path() {
        let mut config = config("http://proxy.local/litellm/");
        config.stream = true;
        let client = ModelProxyClient::new(&config, AccessToken::new("k")).unwrap();
        assert_eq!(client.url(), "http://proxy.local/litellm/stream/chat/completions");
    }

    mod integration {
        use super::*;
        use httpmock::prelude::*;

        fn completion(content: &str) -> serde_json::Value {
            serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }]
            })
        }

        #[tokio::test]
        async fn test_complete() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer proxy-key")
                    .body_includes("\"model\":\"bedrock/claude-sonnet-4\"")
                    .body_includes("\"max_tokens\":30000")
                    .body_includes("\"role\":\"user\"")
                    .body_includes("\"content\":\"hello\"");
                then.status(200).json_body(completion("hi there"));
            });

            let client =
                ModelProxyClient::new(&config(&server.base_url()), AccessToken::new("proxy-key"))
                    .unwrap();
            let text = client.ask(None, "hello").await.unwrap();

            assert_eq!(text, "hi there");
            mock.assert();
        }

        #[tokio::test]
        async fn test_complete_multi_turn() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_includes(
                        "\"messages\":[{\"role\":\"user\",\"content\":\"list repos\"},\
                         {\"role\":\"assistant\",\"content\":\"octocat/hello-world\"},\
                         {\"role\":\"user\",\"content\":\"and its issues?\"}]",
                    );
                then.status(200).json_body(completion("none open"));
            });

            let client =
                ModelProxyClient::new(&config(&server.base_url()), AccessToken::new("proxy-key"))
                    .unwrap();
            let messages = [
                ChatMessage::user("list repos"),
                ChatMessage::assistant("octocat/hello-world"),
                ChatMessage::user("and its issues?"),
            ];
            let text = client.complete(&messages).await.unwrap();

            assert_eq!(text, "none open");
            mock.assert();
        }

        #[tokio::test]
        async fn test_complete_sends_proxy_headers() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("X-Request-ID", "req-42")
                    .header("X-Feature", "ghbridge-cli")
                    .body_includes("\"role\":\"system\"");
                then.status(200).json_body(completion("ok"));
            });

            let mut config = config(&server.base_url());
            config.request_id = Some("req-42".to_string());
            config.feature = Some("ghbridge-cli".to_string());

            let client = ModelProxyClient::new(&config, AccessToken::new("k")).unwrap();
            let text = client.ask(Some("Be brief."), "hello").await.unwrap();

            assert_eq!(text, "ok");
            mock.assert();
        }

        #[tokio::test]
        async fn test_complete_api_error() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).body("invalid api key");
            });

            let client =
                ModelProxyClient::new(&config(&server.base_url()), AccessToken::new("bad"))
                    .unwrap();
            let err = client.ask(None, "hello").await.unwrap_err();

            match err {
                Error::Api { status, message } => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "invalid api key");
                }
                other => panic!("Expected API error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_complete_no_choices() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(serde_json::json!({"choices": []}));
            });

            let client =
                ModelProxyClient::new(&config(&server.base_url()), AccessToken::new("k"))
                    .unwrap();
            let err = client.ask(None, "hello").await.unwrap_err();
            assert!(matches!(err, Error::Other(_)));
        }

        #[tokio::test]
        async fn test_complete_unreachable_is_http_error() {
            // Nothing listens on port 9 (discard) in the test environment.
            let client =
                ModelProxyClient::new(&config("http://127.0.0.1:9"), AccessToken::new("k"))
                    .unwrap();
            let err = client.ask(None, "hello").await.unwrap_err();
            assert!(matches!(err, Error::Http(_)));
        }
    }
}
