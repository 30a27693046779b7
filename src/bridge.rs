//! Memory-guided persona selection. The topic of the input, its emotional
//! content and related memories decide how much each persona weighs in the
//! mesh before it answers.

use crate::emotion::Emotion;
use crate::logging;
use crate::memory_indexer::{MemoryIndexer, SearchFilters};
use crate::memory_store::{EpisodicMemory, MemoryRecord, MemoryStore, NewMemory};
use crate::mesh::{personas_for_emotion, PersonaMesh, UnifiedResponse};
use crate::persist;
use crate::persona::PersonaId;
use crate::timeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ASSOCIATIONS_FILE: &str = "memory_persona_associations.json";

const RELEVANT_MEMORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Personal,
    Technical,
    Emotional,
    Philosophical,
    Practical,
    Creative,
    Default,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Personal => "personal",
            Topic::Technical => "technical",
            Topic::Emotional => "emotional",
            Topic::Philosophical => "philosophical",
            Topic::Practical => "practical",
            Topic::Creative => "creative",
            Topic::Default => "default",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Personal => &["أنا", "نفسي", "حياتي", "عائلتي", "i", "me", "my", "myself", "family"],
            Topic::Technical => &["كيف", "تقنية", "علم", "برمجة", "how", "technology", "science", "programming"],
            Topic::Emotional => &["أشعر", "حزين", "سعيد", "غاضب", "خائف", "feel", "sad", "happy", "angry", "afraid"],
            Topic::Philosophical => &["معنى", "وجود", "حياة", "موت", "meaning", "existence", "life", "death"],
            Topic::Practical => &["مساعدة", "حل", "مشكلة", "نصيحة", "help", "solve", "problem", "advice"],
            Topic::Creative => &["فكرة", "إبداع", "فن", "شعر", "idea", "creative", "art", "poetry"],
            Topic::Default => &[],
        }
    }

    pub fn personas(&self) -> &'static [PersonaId] {
        match self {
            Topic::Personal => &[PersonaId::Caring, PersonaId::FunnyFriend],
            Topic::Technical => &[PersonaId::Advisor, PersonaId::Scientist],
            Topic::Emotional => &[PersonaId::Caring, PersonaId::Poet],
            Topic::Philosophical => &[PersonaId::Philosopher, PersonaId::Poet],
            Topic::Practical => &[PersonaId::Advisor, PersonaId::Neutral],
            Topic::Creative => &[PersonaId::Poet, PersonaId::FunnyFriend],
            Topic::Default => &[PersonaId::Neutral],
        }
    }
}

// Scored topics in tie-break order
const SCORED_TOPICS: [Topic; 6] = [
    Topic::Emotional,
    Topic::Philosophical,
    Topic::Personal,
    Topic::Technical,
    Topic::Creative,
    Topic::Practical,
];

const EMOTION_CONTENT: &[(Emotion, &[&str])] = &[
    (Emotion::Sadness, &["حزين", "بكاء", "ألم", "فقدان", "sad", "cry", "pain", "loss"]),
    (Emotion::Happiness, &["سعيد", "فرح", "ضحك", "سرور", "happy", "joy", "laugh", "pleasure"]),
    (Emotion::Anger, &["غاضب", "عصبي", "إحباط", "angry", "upset", "frustrated"]),
    (Emotion::Fear, &["خائف", "قلق", "توتر", "afraid", "anxious", "nervous"]),
];

const COMMON_WORDS: &[&str] = &[
    "و", "في", "من", "على", "إلى", "أن", "the", "and", "in", "of", "to", "a", "is", "that",
];

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Keyword score per topic, half a point for each related memory that
/// mentions the topic.
pub fn categorize_topic(text: &str, memories: &[MemoryRecord]) -> Topic {
    let lower = text.to_lowercase();
    let memory_texts: Vec<String> = memories
        .iter()
        .filter_map(|m| match m {
            MemoryRecord::Episodic(e) => Some(format!("{} {}", e.input, e.response).to_lowercase()),
            MemoryRecord::Semantic { .. } => None,
        })
        .collect();

    let mut best = (Topic::Default, 0.0);
    for topic in SCORED_TOPICS {
        let mut score = count_hits(&lower, topic.keywords()) as f64;
        for memory_text in &memory_texts {
            if count_hits(memory_text, topic.keywords()) > 0 {
                score += 0.5;
            }
        }
        if score > best.1 {
            best = (topic, score);
        }
    }
    best.0
}

/// Distinct words longer than two characters, punctuation trimmed.
pub fn extract_entities(text: &str) -> Vec<String> {
    let punctuation: &[char] = &['.', ',', '?', '!', '(', ')', '[', ']', '{', '}', '"', ':', ';'];
    let mut entities: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let word = word.trim_matches(punctuation);
        if word.chars().count() > 2
            && !COMMON_WORDS.contains(&word.to_lowercase().as_str())
            && !entities.iter().any(|e| e == word)
        {
            entities.push(word.to_string());
        }
    }
    entities
}

/// `min(1, 0.1 + 0.3 × hits)` per emotion with at least one keyword.
pub fn detect_emotional_content(text: &str) -> BTreeMap<Emotion, f64> {
    let lower = text.to_lowercase();
    EMOTION_CONTENT
        .iter()
        .filter_map(|(emotion, keywords)| match count_hits(&lower, keywords) {
            0 => None,
            n => Some((*emotion, (0.1 + 0.3 * n as f64).min(1.0))),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct InputAnalysis {
    pub topic: Topic,
    pub entities: Vec<String>,
    pub emotional_content: BTreeMap<Emotion, f64>,
    pub relevant_memories: Vec<MemoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnalysis {
    pub topic: Topic,
    pub persona_weights: BTreeMap<PersonaId, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidedResponse {
    #[serde(flatten)]
    pub response: UnifiedResponse,
    pub memory_analysis: MemoryAnalysis,
}

type Associations = BTreeMap<String, BTreeMap<PersonaId, f64>>;

fn default_associations() -> Associations {
    use PersonaId::*;
    let table: [(&str, &[(PersonaId, f64)]); 6] = [
        ("personal_info", &[(Caring, 0.6), (FunnyFriend, 0.3), (Neutral, 0.1)]),
        ("preferences", &[(Advisor, 0.4), (FunnyFriend, 0.4), (Neutral, 0.2)]),
        ("emotions", &[(Caring, 0.5), (Poet, 0.4), (Neutral, 0.1)]),
        ("knowledge", &[(Scientist, 0.6), (Advisor, 0.3), (Neutral, 0.1)]),
        ("philosophy", &[(Philosopher, 0.7), (Poet, 0.2), (Neutral, 0.1)]),
        ("default", &[(Neutral, 0.5), (Advisor, 0.3), (Caring, 0.2)]),
    ];
    table
        .into_iter()
        .map(|(category, weights)| (category.to_string(), weights.iter().copied().collect()))
        .collect()
}

fn normalize(weights: &mut BTreeMap<PersonaId, f64>) {
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for weight in weights.values_mut() {
            *weight /= total;
        }
    }
}

pub struct MemoryPersonaBridge {
    path: PathBuf,
    associations: Associations,
}

impl MemoryPersonaBridge {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(ASSOCIATIONS_FILE);
        let associations = persist::load_or(&path, default_associations);
        Self { path, associations }
    }

    pub fn associations(&self) -> &Associations {
        &self.associations
    }

    pub fn analyze_user_input(&self, store: &MemoryStore, indexer: &MemoryIndexer, input: &str) -> InputAnalysis {
        let relevant_memories =
            indexer.search_memories(store, input, &SearchFilters::default(), RELEVANT_MEMORY_LIMIT);
        InputAnalysis {
            topic: categorize_topic(input, &relevant_memories),
            entities: extract_entities(input),
            emotional_content: detect_emotional_content(input),
            relevant_memories,
        }
    }

    /// Normalized persona weights for an analyzed input.
    pub fn determine_persona_weights(&self, analysis: &InputAnalysis) -> BTreeMap<PersonaId, f64> {
        let mut weights = self
            .associations
            .get("default")
            .cloned()
            .unwrap_or_else(|| BTreeMap::from([(PersonaId::Neutral, 1.0)]));

        let mut add = |persona: PersonaId, amount: f64| {
            *weights.entry(persona).or_insert(0.0) += amount;
        };

        for persona in analysis.topic.personas() {
            add(*persona, 0.3);
        }
        for (emotion, score) in &analysis.emotional_content {
            for persona in personas_for_emotion(*emotion) {
                add(*persona, score * 0.4);
            }
        }
        for memory in &analysis.relevant_memories {
            if let MemoryRecord::Episodic(episodic) = memory {
                for persona in personas_for_emotion(episodic.emotion) {
                    add(*persona, 0.2);
                }
            }
        }

        normalize(&mut weights);
        weights
    }

    /// Steer the mesh with memory-derived weights and answer. Nothing is stored.
    pub fn compose_guided_response(
        &self,
        store: &MemoryStore,
        indexer: &MemoryIndexer,
        mesh: &mut PersonaMesh,
        input: &str,
        session_id: &str,
    ) -> GuidedResponse {
        let analysis = self.analyze_user_input(store, indexer, input);
        let persona_weights = self.determine_persona_weights(&analysis);

        let adjustments: BTreeMap<PersonaId, f64> =
            persona_weights.iter().map(|(p, w)| (*p, w - 0.5)).collect();
        mesh.adjust_persona_weights(&adjustments);

        let response = mesh.unified_response(input, session_id);
        logging::log_persona(
            Some(session_id),
            &format!("Memory-guided response, topic={}", analysis.topic.as_str()),
        );

        GuidedResponse {
            response,
            memory_analysis: MemoryAnalysis {
                topic: analysis.topic,
                persona_weights,
            },
        }
    }

    /// Guided response that is also stored and indexed as an episodic memory.
    pub fn memory_guided_response(
        &self,
        store: &mut MemoryStore,
        indexer: &mut MemoryIndexer,
        mesh: &mut PersonaMesh,
        input: &str,
        session_id: &str,
    ) -> (GuidedResponse, Option<EpisodicMemory>) {
        let guided = self.compose_guided_response(store, indexer, mesh, input, session_id);

        let context = serde_json::json!({
            "persona_weights": guided.memory_analysis.persona_weights,
            "topic": guided.memory_analysis.topic,
        });
        let stored = store.store_episodic_memory(
            NewMemory::new(input, guided.response.text.clone(), timeline::last_emotion(session_id))
                .with_context(context),
        );
        if let Some(memory) = &stored {
            indexer.index_memory(&MemoryRecord::Episodic(memory.clone()));
        }

        (guided, stored)
    }

    /// Scale an association by `1 + 0.2 × score`, clamp to [0.1, 1] and
    /// renormalize the topic.
    pub fn update_associations_from_feedback(&mut self, topic: &str, persona: PersonaId, score: f64) {
        let weights = self
            .associations
            .entry(topic.to_string())
            .or_insert_with(|| BTreeMap::from([(PersonaId::Neutral, 0.5)]));

        let current = weights.get(&persona).copied().unwrap_or(0.1);
        weights.insert(persona, (current * (1.0 + score * 0.2)).clamp(0.1, 1.0));
        normalize(weights);

        persist::save_logged(&self.path, &self.associations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: MemoryStore,
        indexer: MemoryIndexer,
        mesh: PersonaMesh,
        bridge: MemoryPersonaBridge,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        Fixture {
            store: MemoryStore::load(dir.path(), &MemorySettings::default()),
            indexer: MemoryIndexer::load(dir.path()),
            mesh: PersonaMesh::load(dir.path()),
            bridge: MemoryPersonaBridge::load(dir.path()),
            _dir: dir,
        }
    }

    #[test]
    fn test_topic_tie_break_prefers_emotional() {
        assert_eq!(categorize_topic("أشعر بمعنى", &[]), Topic::Emotional);
        assert_eq!(categorize_topic("ما معنى الوجود", &[]), Topic::Philosophical);
        assert_eq!(categorize_topic("مرحبا", &[]), Topic::Default);
        assert_eq!(categorize_topic("أحتاج نصيحة لحل مشكلة", &[]), Topic::Practical);
    }

    #[test]
    fn test_entities_and_emotional_content() {
        let entities = extract_entities("The cat, the CAT and the (dog)!");
        assert_eq!(entities, vec!["cat", "CAT", "dog"]);

        let content = detect_emotional_content("I am sad and I cry, also anxious");
        assert!((content[&Emotion::Sadness] - 0.7).abs() < 1e-9);
        assert!((content[&Emotion::Fear] - 0.4).abs() < 1e-9);
        assert!(!content.contains_key(&Emotion::Happiness));
    }

    #[test]
    fn test_persona_weights_normalized_and_steered() {
        let f = fixture();
        let analysis = f.bridge.analyze_user_input(&f.store, &f.indexer, "أنا حزين جداً");
        // "أنا" and "حزين" tie; emotional wins the tie
        assert_eq!(analysis.topic, Topic::Emotional);

        let weights = f.bridge.determine_persona_weights(&analysis);
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        // default 0.2 + emotional topic 0.3 + sadness 0.16
        assert!(weights[&PersonaId::Caring] > weights[&PersonaId::Neutral]);
        assert!(weights.contains_key(&PersonaId::Poet));
    }

    #[test]
    fn test_memory_guided_response_stores_once() {
        let mut f = fixture();
        let session = format!("bridge-test-{}", uuid::Uuid::new_v4());
        let (guided, stored) = f.bridge.memory_guided_response(
            &mut f.store,
            &mut f.indexer,
            &mut f.mesh,
            "كيف أتعلم البرمجة؟",
            &session,
        );

        assert_eq!(guided.memory_analysis.topic, Topic::Technical);
        assert!(!guided.response.text.is_empty());
        let stored = stored.unwrap();
        assert_eq!(f.store.episodic_memories().len(), 1);
        assert_eq!(stored.response, guided.response.text);
        assert_eq!(stored.context["topic"], "technical");

        let found = f.indexer.search_memories(&f.store, "البرمجة", &SearchFilters::default(), 5);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_feedback_updates_and_persists_associations() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = MemoryPersonaBridge::load(dir.path());
        bridge.update_associations_from_feedback("emotions", PersonaId::Caring, 1.0);

        let emotions = &bridge.associations()["emotions"];
        let total: f64 = emotions.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((emotions[&PersonaId::Caring] - 0.6 / 1.1).abs() < 1e-9);

        bridge.update_associations_from_feedback("emotional", PersonaId::Poet, -1.0);
        let fresh = &bridge.associations()["emotional"];
        assert!((fresh[&PersonaId::Poet] - 0.1 / 0.6).abs() < 1e-9);

        let reloaded = MemoryPersonaBridge::load(dir.path());
        assert_eq!(reloaded.associations()["emotional"].len(), 2);
    }
}
