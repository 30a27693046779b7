//! Provider waterfall with a local fallback brain.
//!
//! Backends are tried in priority order; the first non-empty reply wins.
//! When every backend fails (or none is configured) the reply is drafted
//! from the current persona's templates and passed through the optional
//! emotion, autoswitch, shaping and memory-reaction stages.

use crate::config::{Config, FeatureFlags};
use crate::db;
use crate::emotion::{self, Emotion};
use crate::intent::classify_intent;
use crate::llm::{self, ChatBackend};
use crate::logging;
use crate::persona::{auto_switch_persona, PersonaController, PersonaId};
use crate::personas_network::template_reply;
use crate::timeline::{self, MemoryReaction};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

const INFORMATION_WORDS: &[&str] = &["معلومة", "تاريخ", "تعريف"];
const RECENT_QUESTION_WORDS: &[&str] = &["سؤال حديث", "تقني"];
const LONG_DISCUSSION_WORDS: &[&str] = &["نقاش طويل", "تفسير"];
const EMOTION_WORDS: &[&str] = &["فرح", "حزن", "غضب", "خوف"];

/// What kind of request reached the fallback, judged from prompt keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackContext {
    Information,
    RecentQuestion,
    LongDiscussion,
    Emotional(Emotion),
    Default,
}

impl FallbackContext {
    pub fn from_prompt(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has_any(INFORMATION_WORDS) {
            FallbackContext::Information
        } else if has_any(RECENT_QUESTION_WORDS) {
            FallbackContext::RecentQuestion
        } else if has_any(LONG_DISCUSSION_WORDS) {
            FallbackContext::LongDiscussion
        } else {
            EMOTION_WORDS
                .iter()
                .find(|w| lower.contains(*w))
                .and_then(|w| Emotion::from_label(w))
                .map(FallbackContext::Emotional)
                .unwrap_or(FallbackContext::Default)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackContext::Information => "information",
            FallbackContext::RecentQuestion => "recent_question",
            FallbackContext::LongDiscussion => "long_discussion",
            FallbackContext::Emotional(_) => "emotional",
            FallbackContext::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    Api,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeReply {
    pub text: String,
    pub emotion: Emotion,
    pub engine: String,
    pub mode: ReplyMode,
    pub model: String,
    pub persona: PersonaId,
    pub memory_reaction: Option<MemoryReaction>,
}

/// Prefix a reply with an Arabic line matching its emotion.
pub fn shape_response(text: &str, emotion: Emotion) -> String {
    match emotion {
        Emotion::Sadness => format!("أنا معك... كلامك حسّسني بالضيق شوي: {}", text),
        Emotion::Happiness => format!("والله فرّحتني معك! 😄 {}", text),
        Emotion::Anger => format!("حاسس بنار بكلامك... {}", text),
        Emotion::Fear => format!("ولا يهمك، خليني أكون جنبك بهاللحظة: {}", text),
        Emotion::Neutral => text.to_string(),
    }
}

pub struct RuntimeBridge {
    backends: Vec<Arc<dyn ChatBackend>>,
    features: FeatureFlags,
    controller: Mutex<PersonaController>,
}

impl RuntimeBridge {
    pub fn new(backends: Vec<Arc<dyn ChatBackend>>, features: FeatureFlags) -> Self {
        Self {
            backends,
            features,
            controller: Mutex::new(PersonaController::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(llm::build_backends(config), config.features.clone())
    }

    pub fn backends(&self) -> &[Arc<dyn ChatBackend>] {
        &self.backends
    }

    pub fn current_persona(&self) -> PersonaId {
        self.controller.lock().current()
    }

    /// Switch the persona by English or Arabic name.
    pub fn set_persona(&self, name: &str) -> bool {
        self.controller.lock().set_persona(name)
    }

    pub async fn generate(&self, prompt: &str, session_id: &str) -> RuntimeReply {
        for backend in &self.backends {
            let provider = backend.provider();
            match backend.complete(prompt).await {
                Ok(reply) if !reply.trim().is_empty() => {
                    logging::log_routing(
                        Some(session_id),
                        &format!("Answered by {} ({})", provider.as_str(), backend.model()),
                    );
                    return RuntimeReply {
                        text: reply.trim().to_string(),
                        emotion: Emotion::Neutral,
                        engine: provider.as_str().to_string(),
                        mode: ReplyMode::Api,
                        model: backend.model().to_string(),
                        persona: self.current_persona(),
                        memory_reaction: None,
                    };
                }
                Ok(_) => {
                    logging::log_routing(
                        Some(session_id),
                        &format!("{} returned an empty reply, trying next provider", provider.as_str()),
                    );
                }
                Err(e) => {
                    logging::log_error(
                        Some(session_id),
                        &format!("{} failed: {}. Trying next provider", provider.as_str(), e),
                    );
                }
            }
        }

        let context = FallbackContext::from_prompt(prompt);
        logging::log_routing(
            Some(session_id),
            &format!("All providers unavailable, local fallback (context={})", context.as_str()),
        );
        self.fallback_brain(prompt, session_id, context)
    }

    /// Local reply from persona templates, then the feature-flagged stages.
    pub fn fallback_brain(&self, prompt: &str, session_id: &str, context: FallbackContext) -> RuntimeReply {
        let mut controller = self.controller.lock();
        let raw = controller.apply_persona(&template_reply(controller.current(), prompt, &mut rand::rng()));

        let emotion = if self.features.emotion_engine {
            emotion::detect_emotion(&raw).0
        } else {
            Emotion::Neutral
        };

        if self.features.persona_autoswitch {
            auto_switch_persona(&mut controller, emotion, classify_intent(prompt));
        }

        let shaped = if self.features.response_shaper {
            shape_response(&raw, emotion)
        } else {
            raw.clone()
        };

        // Read the timeline before this turn is appended to it
        let memory_reaction = self
            .features
            .memory_reactor
            .then(|| timeline::react_to_memory(session_id, emotion));

        timeline::log_emotion(session_id, emotion, &raw);
        if let Err(e) = db::save_training_pair(prompt, &shaped, emotion) {
            logging::log_error(Some(session_id), &format!("Failed to log training pair: {}", e));
        }

        RuntimeReply {
            text: shaped,
            emotion,
            engine: "local".to_string(),
            mode: ReplyMode::Fallback,
            model: format!("persona-templates/{}", context.as_str()),
            persona: controller.current(),
            memory_reaction,
        }
    }
}
