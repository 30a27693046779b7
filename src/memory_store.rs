//! Episodic and semantic memory persisted as one JSON document.

use crate::config::MemorySettings;
use crate::emotion::Emotion;
use crate::error::Result;
use crate::logging;
use crate::persist;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const STORE_FILE: &str = "memory_store.json";

/// A single remembered interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub id: String,
    pub input: String,
    pub response: String,
    pub emotion: Emotion,
    #[serde(default)]
    pub context: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub importance: f64,
    pub retrieval_count: u32,
}

/// What a caller hands in; the store fills the rest.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub input: String,
    pub response: String,
    pub emotion: Option<Emotion>,
    pub context: serde_json::Value,
}

impl NewMemory {
    pub fn new(input: impl Into<String>, response: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            input: input.into(),
            response: response.into(),
            emotion: Some(emotion),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMemory {
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub sources: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub text: Option<String>,
    pub emotion: Option<Emotion>,
    pub limit: Option<usize>,
}

/// Flattened view used by listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemoryRecord {
    Episodic(EpisodicMemory),
    Semantic {
        id: String,
        category: String,
        key: String,
        value: String,
        timestamp: DateTime<Utc>,
        confidence: f64,
    },
}

impl MemoryRecord {
    pub fn id(&self) -> &str {
        match self {
            MemoryRecord::Episodic(m) => &m.id,
            MemoryRecord::Semantic { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MemoryRecord::Episodic(m) => m.timestamp,
            MemoryRecord::Semantic { timestamp, .. } => *timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSummary {
    pub personal_info: BTreeMap<String, String>,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    /// Percentage of episodic memories per emotion.
    pub emotional_trends: BTreeMap<Emotion, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    episodic_memories: Vec<EpisodicMemory>,
    #[serde(default)]
    semantic_memories: BTreeMap<String, BTreeMap<String, SemanticMemory>>,
    last_consolidation: DateTime<Utc>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            episodic_memories: Vec::new(),
            semantic_memories: BTreeMap::new(),
            last_consolidation: Utc::now(),
        }
    }
}

// (category, key, pattern) applied to lowercased input
static FACT_PATTERNS: Lazy<Vec<(&'static str, &'static str, Regex)>> = Lazy::new(|| {
    [
        ("personal_info", "name", r"(?:اسمي|my name is)\s+(\S+)"),
        ("preferences", "dislikes", r"(?:لا أحب|i don't like|i dislike)\s+(.+)"),
        ("preferences", "likes", r"(?:أحب|i like)\s+(.+)"),
        ("personal_info", "location", r"(?:أعيش في|i live in)\s+(.+)"),
    ]
    .into_iter()
    .filter_map(|(category, key, pattern)| Regex::new(pattern).ok().map(|re| (category, key, re)))
    .collect()
});

/// Base importance before the length and flat bonuses.
fn emotion_importance(emotion: Emotion) -> f64 {
    match emotion {
        Emotion::Happiness => 0.7,
        Emotion::Sadness => 0.8,
        Emotion::Anger => 0.8,
        Emotion::Fear => 0.7,
        Emotion::Neutral => 0.5,
    }
}

pub fn calculate_importance(input: &str, emotion: Emotion) -> f64 {
    let mut importance = emotion_importance(emotion);
    if input.chars().count() > 100 {
        importance += 0.1;
    }
    importance += 0.2;
    importance.min(1.0)
}

pub struct MemoryStore {
    path: PathBuf,
    max_episodic: usize,
    data: StoreData,
}

impl MemoryStore {
    pub fn load(data_dir: &Path, settings: &MemorySettings) -> Self {
        let path = data_dir.join(STORE_FILE);
        let data = persist::load_or(&path, StoreData::default);
        Self {
            path,
            max_episodic: settings.max_episodic_memories,
            data,
        }
    }

    pub fn save(&self) -> Result<()> {
        persist::save(&self.path, &self.data)
    }

    fn persist(&self) {
        persist::save_logged(&self.path, &self.data);
    }

    pub fn episodic_memories(&self) -> &[EpisodicMemory] {
        &self.data.episodic_memories
    }

    pub fn semantic_memories(&self) -> &BTreeMap<String, BTreeMap<String, SemanticMemory>> {
        &self.data.semantic_memories
    }

    pub fn last_consolidation(&self) -> DateTime<Utc> {
        self.data.last_consolidation
    }

    fn trim_by_importance(&mut self) {
        let memories = &mut self.data.episodic_memories;
        if memories.len() > self.max_episodic {
            memories.sort_by(|a, b| b.importance.total_cmp(&a.importance));
            memories.truncate(self.max_episodic);
        }
    }

    /// Store an interaction at the front of the list. Empty input is rejected.
    pub fn store_episodic_memory(&mut self, memory: NewMemory) -> Option<EpisodicMemory> {
        if memory.input.trim().is_empty() {
            return None;
        }

        let emotion = memory.emotion.unwrap_or_default();
        let episodic = EpisodicMemory {
            id: uuid::Uuid::new_v4().to_string(),
            importance: calculate_importance(&memory.input, emotion),
            input: memory.input,
            response: memory.response,
            emotion,
            context: memory.context,
            timestamp: Utc::now(),
            retrieval_count: 0,
        };

        self.data.episodic_memories.insert(0, episodic.clone());
        self.trim_by_importance();
        self.extract_semantic_information(&episodic.input);
        self.persist();

        logging::log_memory(
            None,
            &format!(
                "Stored episodic memory {} (emotion={}, importance={:.2})",
                episodic.id, episodic.emotion, episodic.importance
            ),
        );
        Some(episodic)
    }

    fn extract_semantic_information(&mut self, input: &str) {
        let text = input.to_lowercase();
        let mut found: Vec<(&str, &str, String)> = Vec::new();

        for (category, key, re) in FACT_PATTERNS.iter() {
            // "لا أحب x" must not also record x as a like
            if *key == "likes" && found.iter().any(|(_, k, _)| *k == "dislikes") {
                continue;
            }
            if let Some(value) = re.captures(&text).and_then(|c| c.get(1)) {
                found.push((category, key, value.as_str().trim().to_string()));
            }
        }

        for (category, key, value) in found {
            self.store_semantic_memory(category, key, &value);
        }
    }

    /// Record a fact. Repeating the current value raises its source count.
    pub fn store_semantic_memory(&mut self, category: &str, key: &str, value: &str) {
        if category.is_empty() || key.is_empty() {
            return;
        }

        let facts = self.data.semantic_memories.entry(category.to_string()).or_default();
        match facts.get_mut(key) {
            Some(existing) if existing.value == value => {
                existing.sources += 1;
                existing.timestamp = Utc::now();
            }
            _ => {
                facts.insert(
                    key.to_string(),
                    SemanticMemory {
                        value: value.to_string(),
                        timestamp: Utc::now(),
                        confidence: 0.8,
                        sources: 1,
                    },
                );
            }
        }
        self.persist();
    }

    pub fn retrieve_semantic_memory(&self, category: &str, key: &str) -> Option<&SemanticMemory> {
        self.data.semantic_memories.get(category)?.get(key)
    }

    pub fn semantic_category(&self, category: &str) -> Option<&BTreeMap<String, SemanticMemory>> {
        self.data.semantic_memories.get(category)
    }

    /// Newest matching memories. Each hit is counted and gains importance.
    pub fn retrieve_episodic_memories(&mut self, query: &MemoryQuery) -> Vec<EpisodicMemory> {
        let needle = query.text.as_ref().map(|t| t.to_lowercase()).filter(|t| !t.is_empty());
        let limit = query.limit.unwrap_or(5);

        let mut results: Vec<EpisodicMemory> = self
            .data
            .episodic_memories
            .iter()
            .filter(|m| match &needle {
                Some(n) => m.input.to_lowercase().contains(n) || m.response.to_lowercase().contains(n),
                None => true,
            })
            .filter(|m| query.emotion.map_or(true, |e| m.emotion == e))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);

        let hits: HashSet<&str> = results.iter().map(|m| m.id.as_str()).collect();
        for memory in self.data.episodic_memories.iter_mut() {
            if hits.contains(memory.id.as_str()) {
                memory.retrieval_count += 1;
                memory.importance = (memory.importance + 0.1).min(1.0);
            }
        }
        self.persist();

        results
    }

    /// Decay old memories, reward recalled ones, raise confidence of
    /// repeatedly confirmed facts.
    pub fn consolidate(&mut self) {
        let now = Utc::now();
        for memory in self.data.episodic_memories.iter_mut() {
            let age = now - memory.timestamp;
            if age > Duration::days(30) {
                memory.importance -= 0.2;
            } else if age > Duration::days(7) {
                memory.importance -= 0.1;
            }

            if memory.retrieval_count > 5 {
                memory.importance += 0.3;
            } else if memory.retrieval_count > 2 {
                memory.importance += 0.2;
            }
            memory.importance = memory.importance.clamp(0.1, 1.0);
        }
        self.trim_by_importance();

        for fact in self.data.semantic_memories.values_mut().flat_map(|f| f.values_mut()) {
            if fact.sources > 3 {
                fact.confidence = 0.95;
            } else if fact.sources > 1 {
                fact.confidence = 0.9;
            }
        }

        self.data.last_consolidation = now;
        self.persist();
        logging::log_memory(
            None,
            &format!(
                "Consolidated {} episodic memories",
                self.data.episodic_memories.len()
            ),
        );
    }

    /// Consolidate when at least `interval_hours` passed since the last run.
    pub fn consolidate_if_due(&mut self, interval_hours: i64) -> bool {
        if Utc::now() - self.data.last_consolidation < Duration::hours(interval_hours) {
            return false;
        }
        self.consolidate();
        true
    }

    pub fn emotional_trends(&self) -> BTreeMap<Emotion, f64> {
        let total = self.data.episodic_memories.len();
        let mut counts: BTreeMap<Emotion, usize> = BTreeMap::new();
        for memory in &self.data.episodic_memories {
            *counts.entry(memory.emotion).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(emotion, count)| (emotion, count as f64 / total as f64 * 100.0))
            .collect()
    }

    pub fn user_summary(&self) -> UserSummary {
        let value_of = |category: &str, key: &str| {
            self.retrieve_semantic_memory(category, key)
                .map(|f| f.value.clone())
        };

        UserSummary {
            personal_info: self
                .semantic_category("personal_info")
                .map(|facts| facts.iter().map(|(k, f)| (k.clone(), f.value.clone())).collect())
                .unwrap_or_default(),
            likes: value_of("preferences", "likes").into_iter().collect(),
            dislikes: value_of("preferences", "dislikes").into_iter().collect(),
            emotional_trends: self.emotional_trends(),
        }
    }

    pub fn all_memories(&self) -> Vec<MemoryRecord> {
        let episodic = self
            .data
            .episodic_memories
            .iter()
            .cloned()
            .map(MemoryRecord::Episodic);

        let semantic = self.data.semantic_memories.iter().flat_map(|(category, facts)| {
            facts.iter().map(move |(key, fact)| semantic_record(category, key, fact))
        });

        episodic.chain(semantic).collect()
    }

    /// `category:key` addresses a fact, anything else an episodic id.
    pub fn memory_by_id(&self, id: &str) -> Option<MemoryRecord> {
        if let Some((category, key)) = id.split_once(':') {
            if let Some(fact) = self.retrieve_semantic_memory(category, key) {
                return Some(semantic_record(category, key, fact));
            }
        }
        self.episodic_by_id(id).cloned().map(MemoryRecord::Episodic)
    }

    pub fn episodic_by_id(&self, id: &str) -> Option<&EpisodicMemory> {
        self.data.episodic_memories.iter().find(|m| m.id == id)
    }
}

fn semantic_record(category: &str, key: &str, fact: &SemanticMemory) -> MemoryRecord {
    MemoryRecord::Semantic {
        id: format!("{}:{}", category, key),
        category: category.to_string(),
        key: key.to_string(),
        value: fact.value.clone(),
        timestamp: fact.timestamp,
        confidence: fact.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(max: usize) -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let settings = MemorySettings {
            max_episodic_memories: max,
            ..MemorySettings::default()
        };
        let store = MemoryStore::load(dir.path(), &settings);
        (dir, store)
    }

    #[test]
    fn test_importance_table() {
        assert!((calculate_importance("hi", Emotion::Neutral) - 0.7).abs() < 1e-9);
        assert!((calculate_importance("hi", Emotion::Happiness) - 0.9).abs() < 1e-9);
        assert_eq!(calculate_importance("hi", Emotion::Sadness), 1.0);
        let long = "a".repeat(101);
        assert!((calculate_importance(&long, Emotion::Neutral) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_store_rejects_empty_and_persists() {
        let (dir, mut store) = store_with(100);
        assert!(store.store_episodic_memory(NewMemory::new("  ", "x", Emotion::Neutral)).is_none());

        let stored = store
            .store_episodic_memory(NewMemory::new("مرحبا", "أهلاً", Emotion::Happiness))
            .unwrap();
        assert_eq!(stored.retrieval_count, 0);

        let reloaded = MemoryStore::load(dir.path(), &MemorySettings::default());
        assert_eq!(reloaded.episodic_memories().len(), 1);
        assert_eq!(reloaded.episodic_memories()[0].id, stored.id);
    }

    #[test]
    fn test_newest_first_and_trim_by_importance() {
        let (_dir, mut store) = store_with(2);
        store.store_episodic_memory(NewMemory::new("sad one", "", Emotion::Sadness));
        store.store_episodic_memory(NewMemory::new("plain one", "", Emotion::Neutral));
        assert_eq!(store.episodic_memories()[0].input, "plain one");

        store.store_episodic_memory(NewMemory::new("angry one", "", Emotion::Anger));
        let inputs: Vec<&str> = store.episodic_memories().iter().map(|m| m.input.as_str()).collect();
        assert_eq!(inputs.len(), 2);
        assert!(!inputs.contains(&"plain one"));
    }

    #[test]
    fn test_semantic_extraction() {
        let (_dir, mut store) = store_with(100);
        store.store_episodic_memory(NewMemory::new("My name is Sara and I live in Cairo", "", Emotion::Neutral));
        store.store_episodic_memory(NewMemory::new("لا أحب القهوة", "", Emotion::Neutral));

        assert_eq!(store.retrieve_semantic_memory("personal_info", "name").unwrap().value, "sara");
        assert_eq!(store.retrieve_semantic_memory("personal_info", "location").unwrap().value, "cairo");
        assert_eq!(store.retrieve_semantic_memory("preferences", "dislikes").unwrap().value, "القهوة");
        assert!(store.retrieve_semantic_memory("preferences", "likes").is_none());

        store.store_episodic_memory(NewMemory::new("أحب الشاي", "", Emotion::Happiness));
        assert_eq!(store.retrieve_semantic_memory("preferences", "likes").unwrap().value, "الشاي");
    }

    #[test]
    fn test_semantic_sources_increment() {
        let (_dir, mut store) = store_with(100);
        store.store_semantic_memory("personal_info", "name", "sara");
        store.store_semantic_memory("personal_info", "name", "sara");
        assert_eq!(store.retrieve_semantic_memory("personal_info", "name").unwrap().sources, 2);
        store.store_semantic_memory("personal_info", "name", "mona");
        let fact = store.retrieve_semantic_memory("personal_info", "name").unwrap();
        assert_eq!((fact.value.as_str(), fact.sources), ("mona", 1));
    }

    #[test]
    fn test_retrieve_filters_and_bumps() {
        let (_dir, mut store) = store_with(100);
        store.store_episodic_memory(NewMemory::new("talk about work", "ok", Emotion::Neutral));
        store.store_episodic_memory(NewMemory::new("work is hard", "sorry", Emotion::Sadness));
        store.store_episodic_memory(NewMemory::new("music", "nice", Emotion::Happiness));

        let hits = store.retrieve_episodic_memories(&MemoryQuery {
            text: Some("WORK".into()),
            ..MemoryQuery::default()
        });
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].input, "work is hard");

        let sad = store.retrieve_episodic_memories(&MemoryQuery {
            text: Some("work".into()),
            emotion: Some(Emotion::Sadness),
            limit: Some(5),
        });
        assert_eq!(sad.len(), 1);

        let bumped = store.episodic_by_id(&sad[0].id).unwrap();
        assert_eq!(bumped.retrieval_count, 2);
        let neutral = store.episodic_memories().iter().find(|m| m.input == "talk about work").unwrap();
        assert!((neutral.importance - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_consolidation_decay_and_boost() {
        let (_dir, mut store) = store_with(100);
        store.store_episodic_memory(NewMemory::new("old", "", Emotion::Neutral));
        store.store_episodic_memory(NewMemory::new("recalled", "", Emotion::Neutral));
        store.store_semantic_memory("personal_info", "name", "sara");
        store.store_semantic_memory("personal_info", "name", "sara");

        for memory in store.data.episodic_memories.iter_mut() {
            if memory.input == "old" {
                memory.timestamp = Utc::now() - Duration::days(40);
            } else {
                memory.retrieval_count = 6;
            }
        }

        assert!(!store.consolidate_if_due(24));
        store.data.last_consolidation = Utc::now() - Duration::hours(25);
        assert!(store.consolidate_if_due(24));

        let old = store.episodic_memories().iter().find(|m| m.input == "old").unwrap();
        assert!((old.importance - 0.5).abs() < 1e-9);
        let recalled = store.episodic_memories().iter().find(|m| m.input == "recalled").unwrap();
        assert_eq!(recalled.importance, 1.0);
        assert_eq!(store.retrieve_semantic_memory("personal_info", "name").unwrap().confidence, 0.9);
    }

    #[test]
    fn test_listing_summary_and_lookup() {
        let (_dir, mut store) = store_with(100);
        let stored = store
            .store_episodic_memory(NewMemory::new("my name is omar", "", Emotion::Happiness))
            .unwrap();
        store.store_episodic_memory(NewMemory::new("hello", "", Emotion::Sadness));

        let all = store.all_memories();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|m| m.id() == "personal_info:name"));

        assert!(matches!(store.memory_by_id("personal_info:name"), Some(MemoryRecord::Semantic { .. })));
        assert_eq!(store.memory_by_id(&stored.id).unwrap().id(), stored.id);
        assert!(store.memory_by_id("nope").is_none());

        let summary = store.user_summary();
        assert_eq!(summary.personal_info["name"], "omar");
        assert_eq!(summary.emotional_trends[&Emotion::Sadness], 50.0);
    }
}
