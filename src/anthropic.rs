use crate::config::Provider;
use crate::error::{Error, Result};
use crate::llm::ChatBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60;

// Model constants
pub const CLAUDE_SONNET: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Serialize, Clone)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: Option<&str>, timeout_secs: Option<u64>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS)))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.to_string(),
            model: model.unwrap_or(CLAUDE_SONNET).to_string(),
        }
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<AnthropicMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: max_tokens.unwrap_or(1000),
            messages,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::provider("anthropic", describe_error(status.as_u16(), &error_text)));
        }

        let completion: MessagesResponse = response.json().await?;
        extract_text(completion).ok_or_else(|| Error::provider("anthropic", "No text response from Claude"))
    }
}

/// Prefer the structured `{error: {type, message}}` body when present.
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<AnthropicError>(body) {
        Ok(parsed) => format!(
            "API error ({}): {} - {}",
            status, parsed.error.error_type, parsed.error.message
        ),
        Err(_) => format!("API error ({}): {}", status, body),
    }
}

fn extract_text(response: MessagesResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .rev()
        .find(|c| c.content_type == "text")
        .and_then(|c| c.text)
}

#[async_trait]
impl ChatBackend for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![AnthropicMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat_completion(messages, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_structured_error() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#;
        assert_eq!(
            describe_error(429, body),
            "API error (429): rate_limit_error - slow down"
        );
        assert_eq!(describe_error(500, "oops"), "API error (500): oops");
    }

    #[test]
    fn test_extract_last_text_block() {
        let raw = r#"{"content":[{"type":"text","text":"first"},{"type":"tool_use"},{"type":"text","text":"أهلاً"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).as_deref(), Some("أهلاً"));
    }

    #[test]
    fn test_request_body_has_no_system_field() {
        let request = MessagesRequest {
            model: CLAUDE_SONNET.to_string(),
            max_tokens: 10,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "مرحبا".to_string(),
            }],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("system").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_extract_text_without_text_blocks() {
        let raw = r#"{"content":[{"type":"tool_use"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert!(extract_text(parsed).is_none());
    }

    #[test]
    fn test_default_model() {
        let client = AnthropicClient::new("key", None, None);
        assert_eq!(client.model(), CLAUDE_SONNET);
        let haiku = AnthropicClient::new("key", Some("claude-3-5-haiku-20241022"), Some(5));
        assert_eq!(haiku.model(), "claude-3-5-haiku-20241022");
    }
}
