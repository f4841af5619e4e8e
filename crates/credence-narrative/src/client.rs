//! Text-generation endpoint client
//!
//! Speaks the OpenAI-compatible chat-completions protocol, which is what the
//! hosted inference providers we target expose.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NarrativeConfig;
use crate::error::NarrativeError;
use crate::Result;

/// Anything that can turn a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a chat-completions endpoint
pub struct ChatCompletionsClient {
    config: NarrativeConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Create a new client. Fails with `NotConfigured` when no API key is set.
    pub fn new(config: NarrativeConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or(NarrativeError::NotConfigured)?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("credence-narrative/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(ChatCompletionsClient {
            config,
            api_key,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(NarrativeConfig::from_env())
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 200,
        };

        let response = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(NarrativeError::EmptyResponse)?;

        debug!(chars = text.len(), "narrative completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let config = NarrativeConfig::new("http://localhost:1/v1/chat/completions", "m");
        let err = ChatCompletionsClient::new(config).err().expect("must fail");
        assert!(matches!(err, NarrativeError::NotConfigured));
    }

    #[test]
    fn test_response_parsing_takes_first_choice() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  Approved.  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).expect("parse");
        let content = parsed.choices[0].message.content.as_deref();
        assert_eq!(content.map(str::trim), Some("Approved."));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let config = NarrativeConfig::new("http://127.0.0.1:9/v1/chat/completions", "m")
            .with_api_key("k")
            .with_timeout(std::time::Duration::from_secs(2));
        let client = ChatCompletionsClient::new(config).expect("client");

        // Should return an error, not panic
        let result = client.generate("system", "prompt").await;
        assert!(matches!(result, Err(NarrativeError::Http(_))));
    }
}
