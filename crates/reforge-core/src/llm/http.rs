//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{GenerationError, GenerationRequest, TextGenerator};

/// HTTP generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpGeneratorConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        HttpGeneratorConfig {
            base_url: std::env::var("REFORGE_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("REFORGE_API_KEY").ok(),
            timeout_secs: std::env::var("REFORGE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        }
    }
}

impl HttpGeneratorConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(base_url: &str) -> Self {
        HttpGeneratorConfig {
            base_url: base_url.to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single-provider generator. `allow_fallback` has no effect here: there is
/// only one upstream.
pub struct HttpTextGenerator {
    config: HttpGeneratorConfig,
    http_client: reqwest::Client,
}

impl HttpTextGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("reforge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(HttpTextGenerator {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(HttpGeneratorConfig::from_env())
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.http_client.post(self.config.endpoint()).json(&body);
        if let Some(token) = &self.config.api_key {
            builder = builder.bearer_auth(token);
        }

        debug!(model = %request.model, prompt_chars = request.prompt.len(), "sending generation request");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let config = HttpGeneratorConfig::new("http://localhost:8080/v1/");
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn config_builder_sets_key() {
        let config = HttpGeneratorConfig::new("http://localhost").with_api_key("sk-test");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn chat_response_decodes_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let mut config = HttpGeneratorConfig::new("http://127.0.0.1:1");
        config.timeout_secs = 2;
        let generator = HttpTextGenerator::new(config).unwrap();
        let err = generator
            .generate(&GenerationRequest::new("hi", "m"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Transport(_) | GenerationError::Timeout { .. }
        ));
    }
}
