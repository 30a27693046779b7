//! Emotion detection for Arabic and English text.
//!
//! Keyword classifiers per language, with an optional model pass in front
//! of them (`EmotionEngine`).

pub mod arabic;
pub mod english;

use crate::llm::{self, ChatBackend};
use crate::logging;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The five standardized emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sadness,
    Happiness,
    Anger,
    Fear,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Sadness,
        Emotion::Happiness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Sadness => "sadness",
            Emotion::Happiness => "happiness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn arabic(&self) -> &'static str {
        match self {
            Emotion::Sadness => "حزن",
            Emotion::Happiness => "فرح",
            Emotion::Anger => "غضب",
            Emotion::Fear => "خوف",
            Emotion::Neutral => "حياد",
        }
    }

    /// Label in the requested language; unknown language gets English.
    pub fn label(&self, language: Language) -> &'static str {
        match language {
            Language::Arabic => self.arabic(),
            _ => self.as_str(),
        }
    }

    /// Accepts both English and Arabic labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == label.to_lowercase() || e.arabic() == label)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Emotion::Sadness | Emotion::Anger | Emotion::Fear)
    }

    pub fn is_neutral(&self) -> bool {
        *self == Emotion::Neutral
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    English,
    Unknown,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::English => "en",
            Language::Unknown => "unknown",
        }
    }
}

fn is_arabic_char(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Arabic if any char falls in the Arabic block, English if any ASCII letter.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_arabic_char) {
        Language::Arabic
    } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
        Language::English
    } else {
        Language::Unknown
    }
}

/// Keyword emotion detection. Unknown language falls back to the English lists.
pub fn detect_emotion(text: &str) -> (Emotion, Language) {
    if text.trim().is_empty() {
        return (Emotion::Neutral, Language::Unknown);
    }

    let language = detect_language(text);
    let emotion = match language {
        Language::Arabic => arabic::classify(text),
        Language::English | Language::Unknown => english::classify(text),
    };
    (emotion, language)
}

/// First label found in a model reply, checked in sadness, happiness,
/// anger, fear, neutral order.
pub fn parse_model_emotion(reply: &str, language: Language) -> Option<Emotion> {
    let reply = llm::clean_reply(reply).to_lowercase();
    Emotion::ALL
        .into_iter()
        .find(|e| reply.contains(e.label(language)))
}

/// Emotion classifier with an optional model pass before the keyword lists.
#[derive(Clone, Default)]
pub struct EmotionEngine {
    backend: Option<Arc<dyn ChatBackend>>,
}

impl EmotionEngine {
    pub fn keyword_only() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn uses_model(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn detect(&self, text: &str) -> (Emotion, Language) {
        if text.trim().is_empty() {
            return (Emotion::Neutral, Language::Unknown);
        }

        let language = detect_language(text);
        if let Some(backend) = &self.backend {
            let prompt = match language {
                Language::Arabic => arabic::model_prompt(text),
                _ => english::model_prompt(text),
            };
            match backend.complete(&prompt).await {
                Ok(reply) => {
                    if let Some(emotion) = parse_model_emotion(&reply, language) {
                        return (emotion, language);
                    }
                    logging::log_emotion(
                        None,
                        &format!("Model returned unexpected emotion format: {}. Using keywords.", reply.trim()),
                    );
                }
                Err(e) => {
                    logging::log_error(None, &format!("Model emotion detection failed: {}. Using keywords.", e));
                }
            }
        }

        detect_emotion(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use crate::llm::testing::ScriptedBackend;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("مرحبا"), Language::Arabic);
        assert_eq!(detect_language("hello مرحبا"), Language::Arabic);
        assert_eq!(detect_language("hello"), Language::English);
        assert_eq!(detect_language("12345 !!"), Language::Unknown);
    }

    #[test]
    fn test_detect_emotion_routes_by_language() {
        assert_eq!(detect_emotion("أنا سعيد"), (Emotion::Happiness, Language::Arabic));
        assert_eq!(detect_emotion("I am scared"), (Emotion::Fear, Language::English));
        assert_eq!(detect_emotion("   "), (Emotion::Neutral, Language::Unknown));
        assert_eq!(detect_emotion("123"), (Emotion::Neutral, Language::Unknown));
    }

    #[test]
    fn test_labels_round_trip() {
        for emotion in Emotion::ALL {
            assert_eq!(Emotion::from_label(emotion.arabic()), Some(emotion));
            assert_eq!(Emotion::from_label(emotion.as_str()), Some(emotion));
        }
        assert_eq!(Emotion::from_label("Fear"), Some(Emotion::Fear));
        assert_eq!(Emotion::from_label("joy"), None);
    }

    #[test]
    fn test_parse_model_emotion() {
        assert_eq!(parse_model_emotion("Fear.", Language::English), Some(Emotion::Fear));
        assert_eq!(parse_model_emotion("الإجابة: غضب", Language::Arabic), Some(Emotion::Anger));
        assert_eq!(parse_model_emotion("confused", Language::English), None);
    }

    #[tokio::test]
    async fn test_engine_prefers_model_reply() {
        let backend = Arc::new(ScriptedBackend::ok(Provider::Google, "خوف"));
        let engine = EmotionEngine::with_backend(backend.clone());
        let (emotion, language) = engine.detect("أنا سعيد").await;
        assert_eq!(emotion, Emotion::Fear);
        assert_eq!(language, Language::Arabic);
        assert!(backend.prompts.lock()[0].contains("حزن، فرح، غضب، خوف، حياد"));
    }

    #[tokio::test]
    async fn test_engine_falls_back_to_keywords() {
        let engine = EmotionEngine::with_backend(Arc::new(ScriptedBackend::failing(Provider::Google)));
        assert_eq!(engine.detect("I am so happy").await.0, Emotion::Happiness);

        let engine = EmotionEngine::with_backend(Arc::new(ScriptedBackend::ok(Provider::OpenAI, "no idea")));
        assert_eq!(engine.detect("I am so happy").await.0, Emotion::Happiness);

        assert_eq!(EmotionEngine::keyword_only().detect("angry!").await.0, Emotion::Anger);
    }
}
