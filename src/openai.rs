use crate::config::Provider;
use crate::error::{Error, Result};
use crate::llm::ChatBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
const REQUEST_TIMEOUT_SECS: u64 = 60; // 60 second timeout for API requests

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4";
pub const MISTRAL_DEFAULT_MODEL: &str = "mistral-large-latest";

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for the OpenAI chat-completions wire format. Mistral speaks the
/// same format at its own endpoint, so both providers share this client.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_url: &'static str,
    model: String,
    provider: Provider,
}

impl OpenAIClient {
    fn build(
        provider: Provider,
        api_url: &'static str,
        api_key: &str,
        model: &str,
        timeout_secs: Option<u64>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.to_string(),
            api_url,
            model: model.to_string(),
            provider,
        }
    }

    pub fn openai(api_key: &str, model: Option<&str>, timeout_secs: Option<u64>) -> Self {
        Self::build(
            Provider::OpenAI,
            OPENAI_API_URL,
            api_key,
            model.unwrap_or(OPENAI_DEFAULT_MODEL),
            timeout_secs,
        )
    }

    pub fn mistral(api_key: &str, model: Option<&str>, timeout_secs: Option<u64>) -> Self {
        Self::build(
            Provider::Mistral,
            MISTRAL_API_URL,
            api_key,
            model.unwrap_or(MISTRAL_DEFAULT_MODEL),
            timeout_secs,
        )
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: max_tokens.or(Some(1000)),
        };

        let response = self
            .client
            .post(self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::provider(
                self.provider.as_str(),
                format!("API error ({}): {}", status, error_text),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| Error::provider(self.provider.as_str(), "No response content"))
    }
}

#[async_trait]
impl ChatBackend for OpenAIClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage {
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
    fn test_mistral_uses_own_endpoint_and_model() {
        let client = OpenAIClient::mistral("key", None, None);
        assert_eq!(client.api_url, MISTRAL_API_URL);
        assert_eq!(client.model(), MISTRAL_DEFAULT_MODEL);
        assert_eq!(client.provider(), Provider::Mistral);
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "مرحبا".into(),
            }],
            max_tokens: Some(1000),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "مرحبا");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }
}
