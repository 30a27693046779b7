//! Model backend abstraction shared by the emotion engine and the runtime waterfall.

use crate::anthropic::AnthropicClient;
use crate::config::{Config, Provider};
use crate::error::Result;
use crate::gemini::GeminiClient;
use crate::openai::OpenAIClient;
use async_trait::async_trait;
use std::sync::Arc;

/// A single-turn text completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Model identifier reported back in replies.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build a backend for every provider in `config.model_priority` that has an
/// API key, preserving priority order. Cohere has no client and is skipped.
pub fn build_backends(config: &Config) -> Vec<Arc<dyn ChatBackend>> {
    let settings = &config.providers;
    let timeout = settings.request_timeout_secs;
    let mut backends: Vec<Arc<dyn ChatBackend>> = Vec::new();

    for provider in &config.model_priority {
        let backend: Option<Arc<dyn ChatBackend>> = match provider {
            Provider::Anthropic => settings.anthropic_api_key.as_deref().map(|key| {
                Arc::new(AnthropicClient::new(key, settings.anthropic_model.as_deref(), timeout))
                    as Arc<dyn ChatBackend>
            }),
            Provider::OpenAI => settings.openai_api_key.as_deref().map(|key| {
                Arc::new(OpenAIClient::openai(key, settings.openai_model.as_deref(), timeout))
                    as Arc<dyn ChatBackend>
            }),
            Provider::Mistral => settings.mistral_api_key.as_deref().map(|key| {
                Arc::new(OpenAIClient::mistral(key, settings.mistral_model.as_deref(), timeout))
                    as Arc<dyn ChatBackend>
            }),
            Provider::Google => settings.google_api_key.as_deref().map(|key| {
                Arc::new(GeminiClient::new(key, settings.google_model.as_deref(), timeout))
                    as Arc<dyn ChatBackend>
            }),
            Provider::Cohere => None,
        };

        if let Some(backend) = backend {
            backends.push(backend);
        }
    }

    backends
}

/// Strip markdown code fences models like to wrap short answers in.
pub fn clean_reply(reply: &str) -> String {
    reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;

    /// Scripted backend for tests: returns a fixed reply or fails.
    pub struct ScriptedBackend {
        pub provider: Provider,
        pub reply: Option<String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn ok(provider: Provider, reply: &str) -> Self {
            Self {
                provider,
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(provider: Provider) -> Self {
            Self {
                provider,
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| Error::provider(self.provider.as_str(), "scripted failure"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_backends_respects_keys_and_order() {
        let mut config = Config::with_data_dir("/tmp/unused");
        config.providers.anthropic_api_key = Some("a".into());
        config.providers.google_api_key = Some("g".into());

        let backends = build_backends(&config);
        let order: Vec<Provider> = backends.iter().map(|b| b.provider()).collect();
        assert_eq!(order, vec![Provider::Anthropic, Provider::Google]);
    }

    #[test]
    fn test_build_backends_empty_without_keys() {
        let config = Config::with_data_dir("/tmp/unused");
        assert!(build_backends(&config).is_empty());
    }

    #[test]
    fn test_clean_reply_strips_fences() {
        assert_eq!(clean_reply("```json\nحزن\n```"), "حزن");
        assert_eq!(clean_reply("  fear "), "fear");
    }
}
