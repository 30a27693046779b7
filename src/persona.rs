//! Persona identities, prompt styling and automatic persona switching.

use crate::emotion::Emotion;
use crate::intent::Intent;
use crate::logging;
use serde::{Deserialize, Serialize};

/// The seven personas. Declaration order is the tie-break order wherever
/// weights are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Caring,
    Advisor,
    FunnyFriend,
    Poet,
    Scientist,
    Philosopher,
    Neutral,
}

impl PersonaId {
    pub const ALL: [PersonaId; 7] = [
        PersonaId::Caring,
        PersonaId::Advisor,
        PersonaId::FunnyFriend,
        PersonaId::Poet,
        PersonaId::Scientist,
        PersonaId::Philosopher,
        PersonaId::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Caring => "caring",
            PersonaId::Advisor => "advisor",
            PersonaId::FunnyFriend => "funny_friend",
            PersonaId::Poet => "poet",
            PersonaId::Scientist => "scientist",
            PersonaId::Philosopher => "philosopher",
            PersonaId::Neutral => "neutral",
        }
    }

    /// Display name shown to users.
    pub fn arabic_name(&self) -> &'static str {
        match self {
            PersonaId::Caring => "حنون",
            PersonaId::Advisor => "مستشار",
            PersonaId::FunnyFriend => "صديق مهضوم",
            PersonaId::Poet => "شاعر",
            PersonaId::Scientist => "عالم",
            PersonaId::Philosopher => "فيلسوف",
            PersonaId::Neutral => "محايد",
        }
    }

    /// Accepts the English id or the Arabic display name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        PersonaId::ALL
            .into_iter()
            .find(|p| p.as_str() == name || p.arabic_name() == name)
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.arabic_name())
    }
}

/// How a persona styles a prompt handed to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaStyle {
    pub prefix: &'static str,
    pub tone: &'static str,
    pub style: &'static str,
}

pub fn style_of(persona: PersonaId) -> PersonaStyle {
    match persona {
        PersonaId::Caring => PersonaStyle {
            prefix: "كأنك أم دافئة تتكلم مع طفلها:",
            tone: "ناعم",
            style: "هادئ، متفهم، مطمئن",
        },
        PersonaId::Advisor => PersonaStyle {
            prefix: "كأنك مدرب حياة يعطي نصائح حقيقية:",
            tone: "جدي",
            style: "منطقي، واضح، مباشر",
        },
        PersonaId::FunnyFriend => PersonaStyle {
            prefix: "كأنك صديق مضحك بيرد بأسلوب عفوي:",
            tone: "خفيف دم",
            style: "ساخر، محبب، شبابي",
        },
        PersonaId::Poet => PersonaStyle {
            prefix: "كأنك شاعر يحكي شعور الإنسان بلغة فنية:",
            tone: "عاطفي",
            style: "شاعري، ناعم، خيالي",
        },
        PersonaId::Scientist => PersonaStyle {
            prefix: "كأنك عالم يشرح الحقائق بدقة وهدوء:",
            tone: "موضوعي",
            style: "منظم، دقيق، مدعوم بالأدلة",
        },
        PersonaId::Philosopher => PersonaStyle {
            prefix: "كأنك فيلسوف يتأمل في معنى الأشياء:",
            tone: "تأملي",
            style: "عميق، متسائل، هادئ",
        },
        PersonaId::Neutral => PersonaStyle {
            prefix: "",
            tone: "محايد",
            style: "بسيط، مباشر",
        },
    }
}

// ============ Controller ============

/// Holds the persona currently used to style prompts.
#[derive(Debug, Clone)]
pub struct PersonaController {
    current: PersonaId,
}

impl Default for PersonaController {
    fn default() -> Self {
        Self {
            current: PersonaId::Neutral,
        }
    }
}

impl PersonaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch by name. Unknown names leave the current persona untouched.
    pub fn set_persona(&mut self, name: &str) -> bool {
        match PersonaId::from_name(name) {
            Some(persona) => {
                self.current = persona;
                true
            }
            None => false,
        }
    }

    pub fn set(&mut self, persona: PersonaId) {
        self.current = persona;
    }

    pub fn current(&self) -> PersonaId {
        self.current
    }

    pub fn style(&self) -> PersonaStyle {
        style_of(self.current)
    }

    pub fn apply_persona(&self, prompt: &str) -> String {
        format!("{}\n{}", self.style().prefix, prompt)
    }
}

// ============ Autoswitch ============

fn persona_for_emotion(emotion: Emotion) -> PersonaId {
    match emotion {
        Emotion::Happiness => PersonaId::FunnyFriend,
        Emotion::Sadness => PersonaId::Caring,
        Emotion::Anger => PersonaId::Advisor,
        Emotion::Fear => PersonaId::Caring,
        Emotion::Neutral => PersonaId::Neutral,
    }
}

fn persona_for_intent(intent: Intent) -> PersonaId {
    match intent {
        Intent::TimeFocus | Intent::Business => PersonaId::Advisor,
        Intent::Creative | Intent::Book | Intent::Quote | Intent::Music => PersonaId::Poet,
        Intent::Movie => PersonaId::FunnyFriend,
        Intent::AiNews | Intent::WorldFacts | Intent::History => PersonaId::Scientist,
        Intent::Default => PersonaId::Neutral,
    }
}

/// Pick a persona from emotion and intent, with a few fused combinations,
/// and make it current.
pub fn auto_switch_persona(
    controller: &mut PersonaController,
    emotion: Emotion,
    intent: Intent,
) -> PersonaId {
    let selected = match (emotion, intent) {
        (Emotion::Anger, Intent::TimeFocus | Intent::Business) => PersonaId::Advisor,
        (Emotion::Sadness, Intent::Creative | Intent::Music | Intent::Book) => PersonaId::Poet,
        (Emotion::Happiness, Intent::Movie | Intent::Music) => PersonaId::FunnyFriend,
        (Emotion::Fear, Intent::Business | Intent::AiNews) => PersonaId::Scientist,
        (Emotion::Neutral, _) => persona_for_intent(intent),
        _ => persona_for_emotion(emotion),
    };

    if controller.current() != selected {
        logging::log_persona(
            None,
            &format!(
                "Switching persona {} -> {} (emotion={}, intent={})",
                controller.current(),
                selected,
                emotion,
                intent.as_str()
            ),
        );
    }
    controller.set(selected);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_persona_by_name() {
        let mut controller = PersonaController::new();
        assert_eq!(controller.current(), PersonaId::Neutral);
        assert!(controller.set_persona("شاعر"));
        assert_eq!(controller.current(), PersonaId::Poet);
        assert!(controller.set_persona("advisor"));
        assert!(!controller.set_persona("pirate"));
        assert_eq!(controller.current(), PersonaId::Advisor);
    }

    #[test]
    fn test_apply_persona_prefixes_prompt() {
        let mut controller = PersonaController::new();
        assert_eq!(controller.apply_persona("سؤال"), "\nسؤال");
        controller.set(PersonaId::Caring);
        assert_eq!(
            controller.apply_persona("سؤال"),
            "كأنك أم دافئة تتكلم مع طفلها:\nسؤال"
        );
    }

    #[test]
    fn test_autoswitch_emotion_defaults() {
        let mut c = PersonaController::new();
        assert_eq!(auto_switch_persona(&mut c, Emotion::Sadness, Intent::Default), PersonaId::Caring);
        assert_eq!(auto_switch_persona(&mut c, Emotion::Happiness, Intent::Book), PersonaId::FunnyFriend);
        assert_eq!(c.current(), PersonaId::FunnyFriend);
    }

    #[test]
    fn test_autoswitch_fusion_cases() {
        let mut c = PersonaController::new();
        assert_eq!(auto_switch_persona(&mut c, Emotion::Sadness, Intent::Music), PersonaId::Poet);
        assert_eq!(auto_switch_persona(&mut c, Emotion::Fear, Intent::AiNews), PersonaId::Scientist);
        assert_eq!(auto_switch_persona(&mut c, Emotion::Anger, Intent::Business), PersonaId::Advisor);
        assert_eq!(auto_switch_persona(&mut c, Emotion::Neutral, Intent::History), PersonaId::Scientist);
        assert_eq!(auto_switch_persona(&mut c, Emotion::Neutral, Intent::Default), PersonaId::Neutral);
    }
}
