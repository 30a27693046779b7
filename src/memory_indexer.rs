//! Secondary indexes over the memory store: keywords, categories, months,
//! emotions, priorities and cross references between nearby memories.

use crate::emotion::Emotion;
use crate::logging;
use crate::memory_store::{MemoryRecord, MemoryStore};
use crate::persist;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "memory_index.json";

const STOPWORDS: &[&str] = &[
    "و", "في", "من", "على", "إلى", "عن", "مع", "هذا", "هذه", "ذلك", "تلك", "هو", "هي", "أنا", "أنت",
    "نحن", "هم",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("personal", &["أنا", "نفسي", "حياتي", "مشاعري", "شخصي"]),
    ("social", &["صديق", "عائلة", "أهل", "زملاء", "علاقة", "اجتماعي"]),
    ("work", &["عمل", "وظيفة", "مشروع", "مهمة", "مهني"]),
    ("education", &["دراسة", "تعلم", "مدرسة", "جامعة", "تعليم"]),
    ("health", &["صحة", "مرض", "طبيب", "علاج", "رياضة"]),
    ("entertainment", &["فيلم", "موسيقى", "لعبة", "ترفيه", "هواية"]),
    ("technology", &["تقنية", "حاسوب", "هاتف", "برنامج", "تطبيق"]),
    ("finance", &["مال", "ميزانية", "توفير", "استثمار", "مصروف"]),
    ("spiritual", &["دين", "روحانية", "إيمان", "تأمل", "معنوي"]),
    ("emotional", &["سعادة", "حزن", "غضب", "خوف", "حب", "مشاعر"]),
];

const CROSS_REFERENCE_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_importance(importance: f64) -> Self {
        if importance >= 0.8 {
            Priority::High
        } else if importance >= 0.5 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// Lowercase, punctuation to spaces, drop stopwords and words of two
/// characters or fewer.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w) && w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Highest-scoring topic category; ties go to the earlier category.
pub fn categorize(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let mut best = ("general", 0);
    for (category, keywords) in CATEGORIES {
        let score = keywords.iter().filter(|k| lower.contains(*k)).count();
        if score > best.1 {
            best = (category, score);
        }
    }
    best.0
}

pub fn time_period(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

/// The fields of a memory the index cares about.
struct Indexable {
    id: String,
    text: String,
    timestamp: DateTime<Utc>,
    emotion: Option<Emotion>,
    priority: Priority,
}

impl Indexable {
    fn from_record(record: &MemoryRecord) -> Self {
        match record {
            MemoryRecord::Episodic(m) => Self {
                id: m.id.clone(),
                text: format!("{} {}", m.input, m.response),
                timestamp: m.timestamp,
                emotion: Some(m.emotion),
                priority: Priority::from_importance(m.importance),
            },
            MemoryRecord::Semantic {
                id,
                value,
                timestamp,
                confidence,
                ..
            } => Self {
                id: id.clone(),
                text: value.clone(),
                timestamp: *timestamp,
                emotion: None,
                priority: Priority::from_importance(*confidence),
            },
        }
    }
}

fn related(a: &Indexable, b: &Indexable) -> bool {
    if a.emotion.is_some() && a.emotion == b.emotion {
        return true;
    }

    let ka: HashSet<String> = extract_keywords(&a.text).into_iter().collect();
    let kb: HashSet<String> = extract_keywords(&b.text).into_iter().collect();
    if ka.intersection(&kb).count() >= 2 {
        return true;
    }

    (a.timestamp - b.timestamp).abs() <= Duration::hours(1)
}

fn push_unique<K: Ord>(index: &mut BTreeMap<K, Vec<String>>, key: K, id: &str) {
    let ids = index.entry(key).or_default();
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub emotion: Option<Emotion>,
    /// `YYYY-MM`
    pub time_period: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self == &SearchFilters::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexData {
    #[serde(default)]
    keyword_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    category_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    temporal_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    emotion_index: BTreeMap<Emotion, Vec<String>>,
    #[serde(default)]
    priority_index: BTreeMap<Priority, Vec<String>>,
    #[serde(default)]
    cross_references: BTreeMap<String, Vec<String>>,
    last_indexed: Option<DateTime<Utc>>,
    last_updated: DateTime<Utc>,
}

impl Default for IndexData {
    fn default() -> Self {
        Self {
            keyword_index: BTreeMap::new(),
            category_index: BTreeMap::new(),
            temporal_index: BTreeMap::new(),
            emotion_index: BTreeMap::new(),
            priority_index: BTreeMap::new(),
            cross_references: BTreeMap::new(),
            last_indexed: None,
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub keyword_count: usize,
    pub category_count: usize,
    pub time_period_count: usize,
    pub emotion_count: usize,
    pub priority_count: usize,
    pub cross_reference_count: usize,
    pub last_indexed: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

pub struct MemoryIndexer {
    path: PathBuf,
    data: IndexData,
}

impl MemoryIndexer {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(INDEX_FILE);
        let data = persist::load_or(&path, IndexData::default);
        Self { path, data }
    }

    fn persist(&mut self) {
        self.data.last_updated = Utc::now();
        persist::save_logged(&self.path, &self.data);
    }

    fn add(&mut self, item: &Indexable) {
        for keyword in extract_keywords(&item.text) {
            push_unique(&mut self.data.keyword_index, keyword, &item.id);
        }
        push_unique(&mut self.data.category_index, categorize(&item.text).to_string(), &item.id);
        push_unique(&mut self.data.temporal_index, time_period(item.timestamp), &item.id);
        if let Some(emotion) = item.emotion {
            push_unique(&mut self.data.emotion_index, emotion, &item.id);
        }
        push_unique(&mut self.data.priority_index, item.priority, &item.id);
    }

    /// Index one memory and persist the index.
    pub fn index_memory(&mut self, record: &MemoryRecord) {
        self.add(&Indexable::from_record(record));
        self.persist();
    }

    /// Rebuild every index from the store. Returns the number indexed.
    pub fn rebuild_index(&mut self, store: &MemoryStore) -> usize {
        let last_indexed = Some(Utc::now());
        self.data = IndexData {
            last_indexed,
            ..IndexData::default()
        };

        let mut items: Vec<Indexable> = store.all_memories().iter().map(Indexable::from_record).collect();
        for item in &items {
            self.add(item);
        }

        items.sort_by_key(|item| item.timestamp);
        for (i, item) in items.iter().enumerate() {
            let start = i.saturating_sub(CROSS_REFERENCE_WINDOW);
            let end = (i + CROSS_REFERENCE_WINDOW + 1).min(items.len());
            for (j, other) in items.iter().enumerate().take(end).skip(start) {
                if i != j && related(item, other) {
                    push_unique(&mut self.data.cross_references, item.id.clone(), &other.id);
                }
            }
        }

        self.persist();
        logging::log_memory(None, &format!("Rebuilt memory index over {} memories", items.len()));
        items.len()
    }

    fn resolve<'a, I>(store: &MemoryStore, ids: I, limit: usize) -> Vec<MemoryRecord>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut records: Vec<MemoryRecord> = ids.into_iter().filter_map(|id| store.memory_by_id(id)).collect();
        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        records.truncate(limit);
        records
    }

    fn ids_for<K: Ord>(index: &BTreeMap<K, Vec<String>>, key: &K) -> HashSet<String> {
        index.get(key).map(|ids| ids.iter().cloned().collect()).unwrap_or_default()
    }

    /// Memories containing every query keyword and passing every filter,
    /// newest first. Nothing comes back without a query or a filter.
    pub fn search_memories(
        &self,
        store: &MemoryStore,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<MemoryRecord> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() && filters.is_empty() {
            return Vec::new();
        }

        let mut candidates: Option<HashSet<String>> = None;
        let mut narrow = |ids: HashSet<String>| {
            candidates = Some(match candidates.take() {
                Some(current) => current.intersection(&ids).cloned().collect(),
                None => ids,
            });
        };

        for keyword in &keywords {
            narrow(Self::ids_for(&self.data.keyword_index, keyword));
        }
        if let Some(emotion) = filters.emotion {
            narrow(Self::ids_for(&self.data.emotion_index, &emotion));
        }
        if let Some(period) = &filters.time_period {
            narrow(Self::ids_for(&self.data.temporal_index, period));
        }
        if let Some(priority) = filters.priority {
            narrow(Self::ids_for(&self.data.priority_index, &priority));
        }
        if let Some(category) = &filters.category {
            narrow(Self::ids_for(&self.data.category_index, category));
        }

        match candidates {
            Some(ids) if !ids.is_empty() => Self::resolve(store, ids.iter(), limit),
            _ => Vec::new(),
        }
    }

    pub fn related_memories(&self, store: &MemoryStore, memory_id: &str, limit: usize) -> Vec<MemoryRecord> {
        match self.data.cross_references.get(memory_id) {
            Some(ids) => Self::resolve(store, ids, limit),
            None => Vec::new(),
        }
    }

    pub fn memories_by_emotion(&self, store: &MemoryStore, emotion: Emotion, limit: usize) -> Vec<MemoryRecord> {
        match self.data.emotion_index.get(&emotion) {
            Some(ids) => Self::resolve(store, ids, limit),
            None => Vec::new(),
        }
    }

    pub fn memories_by_time_period(
        &self,
        store: &MemoryStore,
        year: i32,
        month: u32,
        limit: usize,
    ) -> Vec<MemoryRecord> {
        let period = format!("{:04}-{:02}", year, month);
        match self.data.temporal_index.get(&period) {
            Some(ids) => Self::resolve(store, ids, limit),
            None => Vec::new(),
        }
    }

    pub fn index_stats(&self) -> IndexStats {
        IndexStats {
            keyword_count: self.data.keyword_index.len(),
            category_count: self.data.category_index.len(),
            time_period_count: self.data.temporal_index.len(),
            emotion_count: self.data.emotion_index.len(),
            priority_count: self.data.priority_index.len(),
            cross_reference_count: self.data.cross_references.len(),
            last_indexed: self.data.last_indexed,
            last_updated: self.data.last_updated,
        }
    }
}

/// Current month as `(year, month)`.
pub fn current_period() -> (i32, u32) {
    let now = Utc::now();
    (now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;
    use crate::memory_store::NewMemory;

    fn setup() -> (tempfile::TempDir, MemoryStore, MemoryIndexer) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::load(dir.path(), &MemorySettings::default());
        store.store_episodic_memory(NewMemory::new("أحب العمل في مشروع جديد", "رائع", Emotion::Happiness));
        store.store_episodic_memory(NewMemory::new("صديق قديم زارني اليوم", "جميل", Emotion::Happiness));
        store.store_episodic_memory(NewMemory::new("المشروع الجديد متعب جداً", "أفهمك", Emotion::Sadness));
        let indexer = MemoryIndexer::load(dir.path());
        (dir, store, indexer)
    }

    #[test]
    fn test_extract_keywords() {
        assert_eq!(extract_keywords("أنا في البيت، مع صديق!"), vec!["البيت", "صديق"]);
        assert_eq!(extract_keywords("Hi, the big dog"), vec!["the", "big", "dog"]);
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("ذهبت إلى الطبيب بسبب مرض"), "health");
        assert_eq!(categorize("أنا مع صديق"), "personal");
        assert_eq!(categorize("random words"), "general");
    }

    #[test]
    fn test_priority_from_importance() {
        assert_eq!(Priority::from_importance(0.9), Priority::High);
        assert_eq!(Priority::from_importance(0.5), Priority::Medium);
        assert_eq!(Priority::from_importance(0.2), Priority::Low);
    }

    #[test]
    fn test_rebuild_and_search() {
        let (dir, store, mut indexer) = setup();
        // three episodic memories plus the extracted "likes" fact
        assert_eq!(indexer.rebuild_index(&store), 4);

        // the episodic memory and the "likes" fact extracted from it
        let hits = indexer.search_memories(&store, "مشروع", &SearchFilters::default(), 10);
        assert_eq!(hits.len(), 2);

        let both = indexer.search_memories(&store, "الجديد متعب", &SearchFilters::default(), 10);
        assert_eq!(both.len(), 1);
        let none = indexer.search_memories(&store, "الجديد صديق", &SearchFilters::default(), 10);
        assert!(none.is_empty());

        let happy = SearchFilters {
            emotion: Some(Emotion::Happiness),
            ..SearchFilters::default()
        };
        assert_eq!(indexer.search_memories(&store, "", &happy, 10).len(), 2);
        assert!(indexer.search_memories(&store, "", &SearchFilters::default(), 10).is_empty());

        let reloaded = MemoryIndexer::load(dir.path());
        assert_eq!(reloaded.index_stats().emotion_count, 2);
        assert!(reloaded.index_stats().last_indexed.is_some());
    }

    #[test]
    fn test_time_period_and_related() {
        let (_dir, store, mut indexer) = setup();
        indexer.rebuild_index(&store);

        let (year, month) = current_period();
        assert_eq!(indexer.memories_by_time_period(&store, year, month, 10).len(), 4);
        assert!(indexer.memories_by_time_period(&store, 1999, 1, 10).is_empty());

        let first = &store.episodic_memories()[0];
        let related = indexer.related_memories(&store, &first.id, 10);
        assert_eq!(related.len(), 3);
        assert!(related.iter().all(|r| r.id() != first.id));

        let sad = indexer.memories_by_emotion(&store, Emotion::Sadness, 10);
        assert_eq!(sad.len(), 1);
    }

    #[test]
    fn test_index_memory_incremental() {
        let (_dir, mut store, mut indexer) = setup();
        let stored = store
            .store_episodic_memory(NewMemory::new("رحلة إلى البحر", "", Emotion::Neutral))
            .unwrap();
        indexer.index_memory(&MemoryRecord::Episodic(stored.clone()));
        indexer.index_memory(&MemoryRecord::Episodic(stored));

        let hits = indexer.search_memories(&store, "البحر", &SearchFilters::default(), 10);
        assert_eq!(hits.len(), 1);
        let filtered = SearchFilters {
            priority: Some(Priority::Low),
            ..SearchFilters::default()
        };
        assert!(indexer.search_memories(&store, "البحر", &filtered, 10).is_empty());
    }
}
