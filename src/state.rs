//! State integrator: ties emotion analysis, memory and the persona mesh
//! together under a small motivation model and blends their replies.

use crate::bridge::{MemoryAnalysis, MemoryPersonaBridge, Topic};
use crate::config::MemorySettings;
use crate::decision_matrix::{EmotionDecisionMatrix, EmotionStatistics, EmotionalContext, Strategy};
use crate::emotion::Emotion;
use crate::error::{Error, Result};
use crate::logging;
use crate::memory_indexer::MemoryIndexer;
use crate::memory_store::{MemoryQuery, MemoryRecord, MemoryStore, NewMemory};
use crate::mesh::PersonaMesh;
use crate::persist;
use crate::persona::PersonaId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "state_data.json";

const MAX_TRANSITIONS: usize = 500;
const MAX_MOTIVATION_HISTORY: usize = 500;

const HELP_KEYWORDS: &[&str] = &["ساعدني", "احتاج", "كيف يمكنني", "help", "need", "how can i"];

/// Declaration order breaks ties when picking the dominant motivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motivation {
    Connection,
    Understanding,
    Helpfulness,
    Growth,
    Consistency,
}

impl Motivation {
    pub const ALL: [Motivation; 5] = [
        Motivation::Connection,
        Motivation::Understanding,
        Motivation::Helpfulness,
        Motivation::Growth,
        Motivation::Consistency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Motivation::Connection => "connection",
            Motivation::Understanding => "understanding",
            Motivation::Helpfulness => "helpfulness",
            Motivation::Growth => "growth",
            Motivation::Consistency => "consistency",
        }
    }

    /// (emotion weight, persona weight) when this motivation leads.
    fn base_weights(&self) -> (f64, f64) {
        match self {
            Motivation::Connection => (0.7, 0.3),
            Motivation::Consistency => (0.3, 0.7),
            Motivation::Understanding => (0.5, 0.5),
            Motivation::Helpfulness => (0.4, 0.6),
            Motivation::Growth => (0.6, 0.4),
        }
    }
}

impl std::fmt::Display for Motivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Motivations = BTreeMap<Motivation, f64>;

fn default_motivations() -> Motivations {
    Motivation::ALL.into_iter().map(|m| (m, 0.5)).collect()
}

fn dominant_motivation(motivations: &Motivations) -> Motivation {
    let mut best = Motivation::Helpfulness;
    let mut best_value = f64::MIN;
    for m in Motivation::ALL {
        let value = motivations.get(&m).copied().unwrap_or(0.0);
        if value > best_value {
            best = m;
            best_value = value;
        }
    }
    best
}

fn adjust(motivations: &mut Motivations, motivation: Motivation, delta: f64, floor: f64) {
    let value = motivations.entry(motivation).or_insert(0.5);
    *value = (*value + delta).clamp(floor, 1.0);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentState {
    pub active_emotion: Emotion,
    pub emotion_intensity: f64,
    pub dominant_persona: PersonaId,
    pub persona_blend: BTreeMap<PersonaId, f64>,
    pub motivation_focus: Motivation,
    pub context_awareness: f64,
    pub session_id: String,
    pub interaction_count: u64,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            active_emotion: Emotion::Neutral,
            emotion_intensity: 0.5,
            dominant_persona: PersonaId::Neutral,
            persona_blend: BTreeMap::new(),
            motivation_focus: Motivation::Helpfulness,
            context_awareness: 0.5,
            session_id: "default".to_string(),
            interaction_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotivationSnapshot {
    pub timestamp: DateTime<Utc>,
    pub motivations: Motivations,
    pub dominant: Motivation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub emotion: Emotion,
    pub emotion_intensity: f64,
    pub dominant_persona: PersonaId,
    pub motivation_focus: Motivation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackImpact {
    pub persona: f64,
    pub emotion: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateData {
    #[serde(default)]
    motivation_history: BTreeMap<String, Vec<MotivationSnapshot>>,
    #[serde(default)]
    state_transitions: Vec<StateTransition>,
    #[serde(default)]
    feedback_impact: FeedbackImpact,
}

#[derive(Debug, Clone)]
pub struct ResponseParameters {
    pub emotional_context: EmotionalContext,
    pub persona_weights: BTreeMap<PersonaId, f64>,
    pub motivation_focus: Motivation,
    pub context_awareness: f64,
    pub current_state: CurrentState,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegratedResponse {
    pub text: String,
    pub emotion_weight: f64,
    pub persona_weight: f64,
    pub emotion: Emotion,
    pub dominant_persona: PersonaId,
    pub motivation_focus: Motivation,
    pub confidence: f64,
    pub primary_strategy: Strategy,
    pub secondary_strategy: Strategy,
    pub memory_analysis: MemoryAnalysis,
    pub state: CurrentState,
    /// Episodic memory written for this exchange.
    pub memory_id: Option<String>,
}

/// Outcome of blending the emotional and persona replies.
#[derive(Debug, Clone, PartialEq)]
pub struct Blend {
    pub text: String,
    pub emotion_weight: f64,
    pub persona_weight: f64,
}

/// Weigh the two replies by motivation focus and intensity. A side at 0.7
/// or more wins outright; otherwise sentences are interleaved.
pub fn blend_responses(emotional: &str, persona: &str, focus: Motivation, intensity: f64) -> Blend {
    let (mut emotion_weight, mut persona_weight) = focus.base_weights();

    if intensity > 0.7 {
        emotion_weight = (emotion_weight + 0.2).min(0.8);
        persona_weight = 1.0 - emotion_weight;
    } else if intensity < 0.3 {
        emotion_weight = (emotion_weight - 0.2).max(0.2);
        persona_weight = 1.0 - emotion_weight;
    }

    let text = if emotion_weight >= 0.7 {
        emotional.to_string()
    } else if persona_weight >= 0.7 {
        persona.to_string()
    } else {
        let (primary, secondary) = if emotion_weight >= persona_weight {
            (emotional, persona)
        } else {
            (persona, emotional)
        };
        let primary_parts: Vec<&str> = primary.split('.').collect();
        let secondary_parts: Vec<&str> = secondary.split('.').collect();

        let mut text = format!("{}.", primary_parts[0]);
        if let Some(insight) = secondary_parts.get(1).map(|s| s.trim()) {
            if !insight.is_empty() && !primary.contains(insight) {
                text.push_str(&format!(" {}.", insight));
            }
        }
        if let Some(rest) = primary_parts.get(1).map(|s| s.trim()) {
            if !rest.is_empty() {
                text.push_str(&format!(" {}.", rest));
            }
        }
        text
    };

    Blend {
        text,
        emotion_weight,
        persona_weight,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub current_state: CurrentState,
    pub motivations: Motivations,
    pub emotion_stats: EmotionStatistics,
    pub persona_contributions: BTreeMap<PersonaId, f64>,
    pub feedback_impact: FeedbackImpact,
    pub interaction_count: u64,
    pub predicted_next_emotion: Emotion,
}

pub struct StateIntegrator {
    path: PathBuf,
    store: MemoryStore,
    indexer: MemoryIndexer,
    mesh: PersonaMesh,
    bridge: MemoryPersonaBridge,
    matrix: EmotionDecisionMatrix,
    motivations: Motivations,
    current_state: CurrentState,
    data: StateData,
}

impl StateIntegrator {
    pub fn load(data_dir: &Path, settings: &MemorySettings) -> Self {
        let path = data_dir.join(STATE_FILE);
        Self {
            data: persist::load_or(&path, StateData::default),
            path,
            store: MemoryStore::load(data_dir, settings),
            indexer: MemoryIndexer::load(data_dir),
            mesh: PersonaMesh::load(data_dir),
            bridge: MemoryPersonaBridge::load(data_dir),
            matrix: EmotionDecisionMatrix::load(data_dir),
            motivations: default_motivations(),
            current_state: CurrentState::default(),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    pub fn indexer(&self) -> &MemoryIndexer {
        &self.indexer
    }

    /// Rebuild the memory index from the store.
    pub fn reindex(&mut self) -> usize {
        self.indexer.rebuild_index(&self.store)
    }

    pub fn mesh(&self) -> &PersonaMesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut PersonaMesh {
        &mut self.mesh
    }

    pub fn motivations(&self) -> &Motivations {
        &self.motivations
    }

    pub fn current_state(&self) -> &CurrentState {
        &self.current_state
    }

    fn save(&self) {
        persist::save_logged(&self.path, &self.data);
    }

    pub fn update_motivations(&mut self, input: &str, context: &EmotionalContext) {
        let m = &mut self.motivations;

        if context.current_emotion.is_neutral() {
            adjust(m, Motivation::Connection, -0.02, 0.3);
        } else {
            adjust(m, Motivation::Connection, 0.05, 0.0);
        }
        if input.contains('?') || input.contains('؟') {
            adjust(m, Motivation::Understanding, 0.05, 0.0);
        }
        let lower = input.to_lowercase();
        if HELP_KEYWORDS.iter().any(|k| lower.contains(k)) {
            adjust(m, Motivation::Helpfulness, 0.1, 0.0);
        }
        if self.current_state.interaction_count > 0 {
            adjust(m, Motivation::Growth, 0.01, 0.0);
        }
        if context.stability > 0.7 {
            adjust(m, Motivation::Consistency, 0.03, 0.0);
        } else {
            adjust(m, Motivation::Consistency, -0.03, 0.3);
        }

        let dominant = dominant_motivation(&self.motivations);
        self.current_state.motivation_focus = dominant;

        let history = self
            .data
            .motivation_history
            .entry(self.current_state.session_id.clone())
            .or_default();
        history.push(MotivationSnapshot {
            timestamp: Utc::now(),
            motivations: self.motivations.clone(),
            dominant,
        });
        if history.len() > MAX_MOTIVATION_HISTORY {
            let excess = history.len() - MAX_MOTIVATION_HISTORY;
            history.drain(..excess);
        }
    }

    /// Analyze the input (logging its emotion to the session timeline),
    /// update motivations and derive persona weights and context awareness.
    pub fn determine_response_parameters(&mut self, input: &str, session_id: &str, emotion: Emotion) -> ResponseParameters {
        self.current_state.session_id = session_id.to_string();
        self.current_state.interaction_count += 1;

        let emotional_context = self.matrix.analyze_emotional_context(input, session_id, emotion);
        self.update_motivations(input, &emotional_context);

        let analysis = self.bridge.analyze_user_input(&self.store, &self.indexer, input);
        let persona_weights = self.bridge.determine_persona_weights(&analysis);

        self.current_state.active_emotion = emotional_context.current_emotion;
        self.current_state.emotion_intensity = emotional_context.intensity;
        self.current_state.dominant_persona = persona_weights
            .iter()
            .fold(None, |best: Option<(PersonaId, f64)>, (p, w)| match best {
                Some((_, bw)) if bw >= *w => best,
                _ => Some((*p, *w)),
            })
            .map(|(p, _)| p)
            .unwrap_or(PersonaId::Neutral);
        self.current_state.persona_blend = persona_weights.clone();

        let relevant = self.store.retrieve_episodic_memories(&MemoryQuery {
            text: Some(input.to_string()),
            emotion: None,
            limit: Some(3),
        });
        self.current_state.context_awareness = (0.3 + relevant.len() as f64 * 0.2).min(1.0);

        self.data.state_transitions.push(StateTransition {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            emotion: emotional_context.current_emotion,
            emotion_intensity: emotional_context.intensity,
            dominant_persona: self.current_state.dominant_persona,
            motivation_focus: self.current_state.motivation_focus,
        });
        if self.data.state_transitions.len() > MAX_TRANSITIONS {
            let excess = self.data.state_transitions.len() - MAX_TRANSITIONS;
            self.data.state_transitions.drain(..excess);
        }
        self.save();

        logging::log_state(
            Some(session_id),
            &format!(
                "emotion={} intensity={:.2} persona={} focus={} awareness={:.2}",
                emotional_context.current_emotion,
                emotional_context.intensity,
                self.current_state.dominant_persona.as_str(),
                self.current_state.motivation_focus,
                self.current_state.context_awareness
            ),
        );

        ResponseParameters {
            emotional_context,
            persona_weights,
            motivation_focus: self.current_state.motivation_focus,
            context_awareness: self.current_state.context_awareness,
            current_state: self.current_state.clone(),
        }
    }

    /// Full reply pipeline for one user turn.
    pub fn generate_integrated_response(&mut self, input: &str, session_id: &str, emotion: Emotion) -> IntegratedResponse {
        let params = self.determine_response_parameters(input, session_id, emotion);

        let mut context_text = input.to_string();
        if params.context_awareness > 0.5 {
            let recalled = self.store.retrieve_episodic_memories(&MemoryQuery {
                text: Some(input.to_string()),
                emotion: None,
                limit: Some(1),
            });
            if let Some(memory) = recalled.first() {
                context_text = format!("{} (في سياق {})", input, memory.input);
            }
        }

        let intensity = params.emotional_context.intensity;
        let emotional = self
            .matrix
            .generate_emotional_response(params.emotional_context.clone(), &context_text);
        let guided = self
            .bridge
            .compose_guided_response(&self.store, &self.indexer, &mut self.mesh, input, session_id);

        let blend = blend_responses(&emotional.text, &guided.response.text, params.motivation_focus, intensity);
        let confidence = blend.emotion_weight * 0.5 + blend.persona_weight * guided.response.confidence;

        let memory_context = serde_json::json!({
            "state": params.current_state,
            "motivation_focus": params.motivation_focus,
        });
        let stored = self.store.store_episodic_memory(
            NewMemory::new(input, blend.text.clone(), params.emotional_context.current_emotion)
                .with_context(memory_context),
        );
        if let Some(memory) = &stored {
            self.indexer.index_memory(&MemoryRecord::Episodic(memory.clone()));
        }

        IntegratedResponse {
            text: blend.text,
            emotion_weight: blend.emotion_weight,
            persona_weight: blend.persona_weight,
            emotion: params.emotional_context.current_emotion,
            dominant_persona: params.current_state.dominant_persona,
            motivation_focus: params.motivation_focus,
            confidence,
            primary_strategy: emotional.primary_strategy,
            secondary_strategy: emotional.secondary_strategy,
            memory_analysis: guided.memory_analysis,
            state: params.current_state,
            memory_id: stored.map(|m| m.id),
        }
    }

    /// Split a score in [-1, 1] between the decision matrix and the bridge
    /// by the blend weights, and nudge the motivation that led.
    pub fn process_feedback(&mut self, session_id: &str, response: &IntegratedResponse, score: f64) -> Result<()> {
        if !(-1.0..=1.0).contains(&score) {
            return Err(Error::InvalidFeedback(format!("score {} is outside [-1, 1]", score)));
        }

        let emotion_feedback = score * response.emotion_weight;
        let persona_feedback = score * response.persona_weight;

        let impact = &mut self.data.feedback_impact;
        impact.emotion += emotion_feedback;
        impact.persona += persona_feedback;
        impact.memory += persona_feedback * 0.5;

        if emotion_feedback != 0.0 {
            self.matrix.process_feedback(
                session_id,
                response.emotion,
                response.primary_strategy,
                response.secondary_strategy,
                emotion_feedback,
            );
        }
        if persona_feedback != 0.0 {
            let topic: Topic = response.memory_analysis.topic;
            self.bridge
                .update_associations_from_feedback(topic.as_str(), response.dominant_persona, persona_feedback);
        }

        if score > 0.0 {
            adjust(&mut self.motivations, response.motivation_focus, 0.05, 0.2);
        } else if score < 0.0 {
            adjust(&mut self.motivations, response.motivation_focus, -0.05, 0.2);
        }

        self.save();
        logging::log_state(Some(session_id), &format!("Feedback {:.2} applied", score));
        Ok(())
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            current_state: self.current_state.clone(),
            motivations: self.motivations.clone(),
            emotion_stats: self.matrix.emotion_statistics(Some(&self.current_state.session_id)),
            persona_contributions: self.mesh.persona_contributions(),
            feedback_impact: self.data.feedback_impact,
            interaction_count: self.current_state.interaction_count,
            predicted_next_emotion: self.matrix.predicted_next_emotion(self.current_state.active_emotion),
        }
    }
}
