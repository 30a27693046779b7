//! Configuration for Mashaaer.

use crate::error::Result;
use crate::logging;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_PRIORITY: &str = "mistral,openai,anthropic,google,cohere";

/// Upstream model providers, in the names used by `AI_MODEL_PRIORITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Mistral,
    OpenAI,
    Anthropic,
    Google,
    Cohere,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Mistral => "mistral",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Cohere => "cohere",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mistral" => Some(Provider::Mistral),
            "openai" => Some(Provider::OpenAI),
            "anthropic" => Some(Provider::Anthropic),
            "google" => Some(Provider::Google),
            "cohere" => Some(Provider::Cohere),
            _ => None,
        }
    }
}

/// Parse a comma separated priority list. Unknown names are dropped.
pub fn parse_priority(list: &str) -> Vec<Provider> {
    list.split(',').filter_map(Provider::from_str).collect()
}

/// Mashaaer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory for JSON state files, logs and the SQLite database.
    pub data_dir: PathBuf,
    /// Provider order for the fallback waterfall.
    pub model_priority: Vec<Provider>,
    pub features: FeatureFlags,
    pub memory: MemorySettings,
    pub providers: ProviderSettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mashaaer");

        Self {
            data_dir,
            model_priority: parse_priority(DEFAULT_MODEL_PRIORITY),
            features: FeatureFlags::default(),
            memory: MemorySettings::default(),
            providers: ProviderSettings::default(),
        }
    }
}

/// Toggles for the optional stages of the fallback brain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub emotion_engine: bool,
    pub persona_autoswitch: bool,
    pub response_shaper: bool,
    pub memory_reactor: bool,
    /// Ask the first configured model to classify emotion before keywords.
    pub emotion_llm: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            emotion_engine: true,
            persona_autoswitch: true,
            response_shaper: true,
            memory_reactor: true,
            emotion_llm: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemorySettings {
    pub max_episodic_memories: usize,
    pub consolidation_interval_hours: i64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_episodic_memories: 100,
            consolidation_interval_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub openai_model: Option<String>,
    pub mistral_model: Option<String>,
    pub google_model: Option<String>,
    /// Per-request timeout in seconds; 60 when unset.
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Primary location: ~/.config/mashaaer/mashaaer.toml
        if let Some(config_dir) = dirs::config_dir() {
            let primary = config_dir.join("mashaaer").join("mashaaer.toml");
            if primary.exists() {
                match Self::load_from_file(&primary) {
                    Ok(config) => return Ok(config),
                    Err(e) => logging::log_error(
                        None,
                        &format!("Failed to load config from {}: {}", primary.display(), e),
                    ),
                }
            }
        }

        let fallback = PathBuf::from("mashaaer.toml");
        if fallback.exists() {
            match Self::load_from_file(&fallback) {
                Ok(config) => return Ok(config),
                Err(e) => logging::log_error(
                    None,
                    &format!("Failed to load config from {}: {}", fallback.display(), e),
                ),
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay API keys, priority and data dir from the environment.
    /// Takes a lookup function so tests never touch the real process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.providers.anthropic_api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.providers.openai_api_key = Some(key);
        }
        if let Some(key) = non_empty("MISTRAL_API_KEY") {
            self.providers.mistral_api_key = Some(key);
        }
        if let Some(key) = non_empty("GOOGLE_API_KEY") {
            self.providers.google_api_key = Some(key);
        }
        if let Some(priority) = non_empty("AI_MODEL_PRIORITY") {
            self.model_priority = parse_priority(&priority);
        }
        if let Some(dir) = non_empty("MASHAAER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Config rooted at an explicit directory, mainly for tests and the CLI `--data-dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("mashaaer.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_priority_order() {
        let config = Config::default();
        assert_eq!(
            config.model_priority,
            vec![
                Provider::Mistral,
                Provider::OpenAI,
                Provider::Anthropic,
                Provider::Google,
                Provider::Cohere
            ]
        );
        assert_eq!(config.memory.max_episodic_memories, 100);
        assert!(config.features.emotion_engine);
        assert!(!config.features.emotion_llm);
    }

    #[test]
    fn test_parse_priority_skips_unknown() {
        let parsed = parse_priority("anthropic, llama ,google");
        assert_eq!(parsed, vec![Provider::Anthropic, Provider::Google]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("AI_MODEL_PRIORITY", "openai"),
            ("GOOGLE_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.providers.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model_priority, vec![Provider::OpenAI]);
        assert!(config.providers.google_api_key.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mashaaer.toml");
        fs::write(
            &path,
            r#"
model_priority = ["anthropic"]

[features]
response_shaper = false

[memory]
max_episodic_memories = 20
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.model_priority, vec![Provider::Anthropic]);
        assert!(!config.features.response_shaper);
        assert!(config.features.memory_reactor);
        assert_eq!(config.memory.max_episodic_memories, 20);
        assert_eq!(config.memory.consolidation_interval_hours, 24);
    }
}
