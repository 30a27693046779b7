//! Persona mesh: blends the network's persona replies into a single answer
//! using context-adjusted blend weights.

use crate::emotion::Emotion;
use crate::error::Result;
use crate::persist;
use crate::persona::PersonaId;
use crate::personas_network::{ParallelPersonasNetwork, PersonaResponse, Speaker};
use crate::timeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

pub const BLEND_FILE: &str = "persona_blend.json";

const MAX_CONTEXT_HISTORY: usize = 10;

const QUESTION_WORDS: &[&str] = &[
    "كيف", "لماذا", "متى", "أين", "ما هو", "how", "why", "when", "where", "what",
];

const EMOTIONAL_WORDS: &[&str] = &[
    "أشعر", "حزين", "سعيد", "غاضب", "خائف", "مسرور", "متضايق", "قلق", "خجول", "متحمس", "feel",
    "sad", "happy", "angry", "afraid", "excited", "upset", "worried", "shy", "anxious", "love",
    "hate", "miss", "hope", "fear", "أحب", "أكره", "أشتاق", "أتمنى", "أخشى",
];

/// Personas that suit an emotion best.
pub fn personas_for_emotion(emotion: Emotion) -> &'static [PersonaId] {
    match emotion {
        Emotion::Sadness => &[PersonaId::Caring, PersonaId::Poet],
        Emotion::Happiness => &[PersonaId::FunnyFriend, PersonaId::Poet],
        Emotion::Anger => &[PersonaId::Advisor, PersonaId::Neutral],
        Emotion::Fear => &[PersonaId::Caring, PersonaId::Advisor],
        Emotion::Neutral => &[],
    }
}

pub fn is_question(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.contains('?') || text.contains('؟') || QUESTION_WORDS.iter().any(|q| lower.contains(q))
}

pub fn has_emotional_words(text: &str) -> bool {
    let lower = text.to_lowercase();
    EMOTIONAL_WORDS.iter().any(|w| lower.contains(w))
}

fn normalize(weights: &mut BTreeMap<PersonaId, f64>) {
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for weight in weights.values_mut() {
            *weight /= total;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub user_input: String,
    pub response: String,
    pub emotion: Emotion,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedResponse {
    pub text: String,
    pub persona: Speaker,
    pub confidence: f64,
    pub blend: BTreeMap<PersonaId, f64>,
}

pub struct PersonaMesh {
    network: ParallelPersonasNetwork,
    blend_path: PathBuf,
    active_blend: BTreeMap<PersonaId, f64>,
    last_responses: BTreeMap<PersonaId, PersonaResponse>,
    context_history: VecDeque<ContextEntry>,
}

impl PersonaMesh {
    pub fn load(data_dir: &Path) -> Self {
        let network = ParallelPersonasNetwork::load(data_dir);
        let blend_path = data_dir.join(BLEND_FILE);

        let active = network.active_personas().to_vec();
        let active_blend = persist::load_or(&blend_path, || equal_blend(&active));

        Self {
            network,
            blend_path,
            active_blend,
            last_responses: BTreeMap::new(),
            context_history: VecDeque::new(),
        }
    }

    pub fn network(&self) -> &ParallelPersonasNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut ParallelPersonasNetwork {
        &mut self.network
    }

    pub fn context_history(&self) -> &VecDeque<ContextEntry> {
        &self.context_history
    }

    pub fn last_responses(&self) -> &BTreeMap<PersonaId, PersonaResponse> {
        &self.last_responses
    }

    fn save_blend(&self) {
        persist::save_logged(&self.blend_path, &self.active_blend);
    }

    pub fn save(&self) -> Result<()> {
        persist::save(&self.blend_path, &self.active_blend)?;
        self.network.save()
    }

    /// Blend every active persona's reply for the session's last emotion.
    pub fn unified_response(&mut self, input: &str, session_id: &str) -> UnifiedResponse {
        let emotion = timeline::last_emotion(session_id);

        let responses = self.network.responses(input, Some(emotion));
        self.last_responses = responses
            .iter()
            .filter_map(|r| r.persona.persona_id().map(|id| (id, r.clone())))
            .collect();

        self.determine_optimal_blend(input, emotion);
        let unified = self.blend_responses(responses);
        self.update_context_history(input, &unified.text, emotion);
        unified
    }

    fn update_context_history(&mut self, input: &str, response: &str, emotion: Emotion) {
        self.context_history.push_back(ContextEntry {
            user_input: input.to_string(),
            response: response.to_string(),
            emotion,
            timestamp: Utc::now(),
        });
        while self.context_history.len() > MAX_CONTEXT_HISTORY {
            self.context_history.pop_front();
        }
    }

    pub fn determine_optimal_blend(&mut self, input: &str, emotion: Emotion) {
        let mut blend = self.active_blend.clone();

        let mut boost = |personas: &[PersonaId], factor: f64| {
            for persona in personas {
                if let Some(weight) = blend.get_mut(persona) {
                    *weight *= factor;
                }
            }
        };

        boost(personas_for_emotion(emotion), 1.5);
        if is_question(input) {
            boost(&[PersonaId::Advisor], 1.3);
        }
        if has_emotional_words(input) {
            boost(&[PersonaId::Caring, PersonaId::Poet], 1.2);
        }

        normalize(&mut blend);
        self.active_blend = blend;
        self.save_blend();
    }

    /// Merge persona replies into one, led by the heaviest blended persona.
    pub fn blend_responses(&self, mut responses: Vec<PersonaResponse>) -> UnifiedResponse {
        if responses.is_empty() {
            return UnifiedResponse {
                text: "I'm not sure how to respond to that.".to_string(),
                persona: Speaker::Unified,
                confidence: 0.0,
                blend: BTreeMap::new(),
            };
        }

        let blend_of = |r: &PersonaResponse| {
            r.persona
                .persona_id()
                .and_then(|id| self.active_blend.get(&id).copied())
                .unwrap_or(0.0)
        };
        responses.sort_by(|a, b| blend_of(b).total_cmp(&blend_of(a)));

        if responses.len() == 1 {
            let only = &responses[0];
            return UnifiedResponse {
                text: only.text.clone(),
                persona: Speaker::Unified,
                confidence: only.confidence,
                blend: only.persona.persona_id().map(|id| (id, 1.0)).into_iter().collect(),
            };
        }

        let mut weights: BTreeMap<PersonaId, f64> = BTreeMap::new();
        for response in &responses {
            if let Some(id) = response.persona.persona_id() {
                weights.insert(id, blend_of(response) * response.confidence);
            }
        }
        normalize(&mut weights);
        let weight_of = |r: &PersonaResponse| {
            r.persona
                .persona_id()
                .and_then(|id| weights.get(&id).copied())
                .unwrap_or(0.0)
        };

        let primary = &responses[0];
        let secondary = &responses[1];
        let mut text = primary.text.clone();

        if weight_of(secondary) > 0.3 {
            let parts: Vec<&str> = secondary.text.split('.').collect();
            if parts.len() > 1 {
                let insight = parts[1].trim();
                if !insight.is_empty() && !text.contains(insight) {
                    text.push_str(&format!(" {}.", insight));
                }
            }
        }

        let confidence = responses.iter().map(|r| weight_of(r) * r.confidence).sum();

        UnifiedResponse {
            text,
            persona: Speaker::Unified,
            confidence,
            blend: weights,
        }
    }

    pub fn persona_contributions(&self) -> BTreeMap<PersonaId, f64> {
        self.active_blend.clone()
    }

    /// Scale blend weights by `1 + adjustment`, then renormalize.
    pub fn adjust_persona_weights(&mut self, adjustments: &BTreeMap<PersonaId, f64>) {
        for (persona, adjustment) in adjustments {
            if let Some(weight) = self.active_blend.get_mut(persona) {
                *weight *= 1.0 + adjustment;
            }
        }
        normalize(&mut self.active_blend);
        self.save_blend();
    }
}

fn equal_blend(active: &[PersonaId]) -> BTreeMap<PersonaId, f64> {
    if active.is_empty() {
        return BTreeMap::new();
    }
    let share = 1.0 / active.len() as f64;
    active.iter().map(|id| (*id, share)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> (tempfile::TempDir, PersonaMesh) {
        let dir = tempfile::tempdir().unwrap();
        let mesh = PersonaMesh::load(dir.path());
        (dir, mesh)
    }

    fn response(persona: PersonaId, text: &str, confidence: f64) -> PersonaResponse {
        PersonaResponse {
            persona: Speaker::Persona(persona),
            text: text.to_string(),
            tone: String::new(),
            confidence,
        }
    }

    #[test]
    fn test_default_blend_is_equal() {
        let (_dir, mesh) = mesh();
        let blend = mesh.persona_contributions();
        assert_eq!(blend.len(), 7);
        assert!(blend.values().all(|w| (w - 1.0 / 7.0).abs() < 1e-9));
    }

    #[test]
    fn test_blend_boosts_emotion_personas_and_persists() {
        let (dir, mut mesh) = mesh();
        mesh.determine_optimal_blend("أشعر بالحزن، كيف أتجاوز هذا؟", Emotion::Sadness);

        let blend = mesh.persona_contributions();
        let total: f64 = blend.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(blend[&PersonaId::Caring] > blend[&PersonaId::Advisor]);
        assert!(blend[&PersonaId::Advisor] > blend[&PersonaId::Neutral]);

        let reloaded = PersonaMesh::load(dir.path());
        assert!((reloaded.persona_contributions()[&PersonaId::Caring] - blend[&PersonaId::Caring]).abs() < 1e-9);
    }

    #[test]
    fn test_blend_empty_and_single() {
        let (_dir, mesh) = mesh();
        let empty = mesh.blend_responses(Vec::new());
        assert_eq!(empty.text, "I'm not sure how to respond to that.");
        assert_eq!(empty.confidence, 0.0);

        let single = mesh.blend_responses(vec![response(PersonaId::Poet, "شعر.", 0.7)]);
        assert_eq!(single.text, "شعر.");
        assert_eq!(single.blend[&PersonaId::Poet], 1.0);
        assert_eq!(single.persona, Speaker::Unified);
    }

    #[test]
    fn test_blend_appends_secondary_insight() {
        let (_dir, mut mesh) = mesh();
        let mut adjust = BTreeMap::new();
        adjust.insert(PersonaId::Caring, 1.0);
        mesh.adjust_persona_weights(&adjust);

        let blended = mesh.blend_responses(vec![
            response(PersonaId::Advisor, "نصيحة أولى. نصيحة ثانية.", 0.5),
            response(PersonaId::Caring, "أفهم شعورك. أنا هنا لأجلك.", 0.8),
        ]);
        assert_eq!(blended.text, "أفهم شعورك. أنا هنا لأجلك.");

        let blended = mesh.blend_responses(vec![
            response(PersonaId::Caring, "أفهم شعورك.", 0.8),
            response(PersonaId::Advisor, "نصيحة أولى. نصيحة ثانية.", 0.8),
        ]);
        assert_eq!(blended.text, "أفهم شعورك. نصيحة ثانية.");
        let weight_sum: f64 = blended.blend.values().sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);
        assert!((blended.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unified_response_caps_history() {
        let (_dir, mut mesh) = mesh();
        let session = format!("mesh-test-{}", uuid::Uuid::new_v4());
        for i in 0..12 {
            let reply = mesh.unified_response(&format!("رسالة رقم {}", i), &session);
            assert!(!reply.text.is_empty());
        }
        assert_eq!(mesh.context_history().len(), 10);
        assert_eq!(mesh.context_history()[0].user_input, "رسالة رقم 2");
        assert_eq!(mesh.last_responses().len(), 7);
    }

    #[test]
    fn test_question_and_emotional_word_detection() {
        assert!(is_question("what now"));
        assert!(is_question("هل أنت هنا؟"));
        assert!(!is_question("صباح الخير"));
        assert!(has_emotional_words("I feel tired"));
        assert!(!has_emotional_words("صباح الخير"));
    }
}
