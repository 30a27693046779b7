pub mod anthropic;
pub mod bridge;
pub mod config;
pub mod db;
pub mod decision_matrix;
pub mod emotion;
pub mod error;
pub mod gemini;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod memory_indexer;
pub mod memory_store;
pub mod mesh;
pub mod openai;
pub mod persist;
pub mod persona;
pub mod personas_network;
pub mod runtime;
pub mod state;
pub mod timeline;

use config::Config;
use emotion::{Emotion, EmotionEngine};
use error::{Error, Result};
use memory_indexer::{IndexStats, SearchFilters};
use memory_store::{MemoryRecord, UserSummary};
use parking_lot::Mutex;
use persona::PersonaId;
use personas_network::{FeedbackKind, NetworkStatus};
use runtime::{RuntimeBridge, RuntimeReply};
use serde::Serialize;
use state::{IntegratedResponse, StateIntegrator, SystemStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct MashaaerStatus {
    pub system: SystemStatus,
    pub network: NetworkStatus,
    pub index: IndexStats,
    pub user: UserSummary,
    pub backends: Vec<String>,
    pub recorded_emotions: BTreeMap<Emotion, i64>,
}

/// The assistant: emotion engine, integrated state, runtime waterfall and
/// the SQLite mirror behind one handle.
pub struct Mashaaer {
    config: Config,
    engine: EmotionEngine,
    runtime: RuntimeBridge,
    state: Arc<Mutex<StateIntegrator>>,
    last_responses: Mutex<HashMap<String, IntegratedResponse>>,
}

impl Mashaaer {
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(config, |c| db::init_database(&c.db_path()))
    }

    fn open_with<F>(config: Config, init_db: F) -> Result<Self>
    where
        F: FnOnce(&Config) -> Result<()>,
    {
        std::fs::create_dir_all(&config.data_dir)?;

        if let Err(e) = logging::init_logging(&config.log_dir()) {
            eprintln!("Failed to initialize logging: {}", e);
        }
        // Keep the last 7 days of logs
        let _ = logging::cleanup_old_logs();

        init_db(&config)?;

        let backends = llm::build_backends(&config);
        let engine = match backends.first() {
            Some(backend) if config.features.emotion_llm => EmotionEngine::with_backend(backend.clone()),
            _ => EmotionEngine::keyword_only(),
        };
        let runtime = RuntimeBridge::new(backends, config.features.clone());
        let state = StateIntegrator::load(&config.data_dir, &config.memory);

        logging::log_state(
            None,
            &format!(
                "Mashaaer ready (data_dir={}, backends={}, emotion_model={})",
                config.data_dir.display(),
                runtime.backends().len(),
                engine.uses_model()
            ),
        );

        Ok(Self {
            config,
            engine,
            runtime,
            state: Arc::new(Mutex::new(state)),
            last_responses: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One conversational turn through the integrated pipeline.
    pub async fn chat(&self, session_id: &str, text: &str) -> Result<IntegratedResponse> {
        if text.trim().is_empty() {
            return Err(Error::Other("empty message".to_string()));
        }

        let (emotion, language) = self.engine.detect(text).await;
        logging::log_emotion(
            Some(session_id),
            &format!("Detected {} ({})", emotion, language.code()),
        );

        let response = {
            let mut state = self.state.lock();
            let response = state.generate_integrated_response(text, session_id, emotion);
            self.mirror_memories(&state, response.memory_id.as_deref());
            response
        };

        let mut interaction = db::Interaction::new(session_id, text, &response.text, response.emotion, "integrated");
        interaction.persona = Some(response.dominant_persona.as_str().to_string());
        if let Err(e) = db::save_interaction(&interaction) {
            logging::log_error(Some(session_id), &format!("Failed to save interaction: {}", e));
        }

        self.last_responses
            .lock()
            .insert(session_id.to_string(), response.clone());
        Ok(response)
    }

    fn mirror_memories(&self, state: &StateIntegrator, memory_id: Option<&str>) {
        let store = state.store();
        if let Some(memory) = memory_id.and_then(|id| store.episodic_by_id(id)) {
            if let Err(e) = db::save_episodic_memory(memory) {
                logging::log_error(None, &format!("Failed to mirror episodic memory: {}", e));
            }
        }
        for (category, entries) in store.semantic_memories() {
            for (key, memory) in entries {
                if let Err(e) = db::save_semantic_memory(category, key, memory) {
                    logging::log_error(None, &format!("Failed to mirror fact {}/{}: {}", category, key, e));
                }
            }
        }
    }

    /// Raw runtime waterfall, bypassing the integrated pipeline.
    pub async fn generate(&self, session_id: &str, prompt: &str) -> RuntimeReply {
        let reply = self.runtime.generate(prompt, session_id).await;

        let mut interaction = db::Interaction::new(session_id, prompt, &reply.text, reply.emotion, &reply.engine);
        interaction.persona = Some(reply.persona.as_str().to_string());
        if let Err(e) = db::save_interaction(&interaction) {
            logging::log_error(Some(session_id), &format!("Failed to save interaction: {}", e));
        }
        reply
    }

    pub fn set_persona(&self, name: &str) -> bool {
        self.runtime.set_persona(name)
    }

    pub fn feedback(&self, session_id: &str, response: &IntegratedResponse, score: f64) -> Result<()> {
        self.state.lock().process_feedback(session_id, response, score)
    }

    /// Rate the most recent reply of a session.
    pub fn feedback_last(&self, session_id: &str, score: f64) -> Result<()> {
        let response = self
            .last_responses
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::InvalidFeedback(format!("no reply to rate in session {}", session_id)))?;
        self.feedback(session_id, &response, score)
    }

    pub fn persona_feedback(&self, persona: PersonaId, positive: bool) {
        let kind = if positive {
            FeedbackKind::Positive
        } else {
            FeedbackKind::Negative
        };
        self.state
            .lock()
            .mesh_mut()
            .network_mut()
            .process_user_feedback(persona, kind);
    }

    pub fn search_memories(&self, query: &str, filters: &SearchFilters, limit: usize) -> Vec<MemoryRecord> {
        let state = self.state.lock();
        state.indexer().search_memories(state.store(), query, filters, limit)
    }

    pub fn status(&self) -> MashaaerStatus {
        let state = self.state.lock();
        MashaaerStatus {
            system: state.system_status(),
            network: state.mesh().network().network_status(),
            index: state.indexer().index_stats(),
            user: state.store().user_summary(),
            backends: self
                .runtime
                .backends()
                .iter()
                .map(|b| format!("{}:{}", b.provider().as_str(), b.model()))
                .collect(),
            recorded_emotions: db::interaction_emotion_counts(None).unwrap_or_default(),
        }
    }

    /// Consolidate memories now and rebuild the index.
    pub fn consolidate(&self) -> usize {
        let mut state = self.state.lock();
        state.store_mut().consolidate();
        state.reindex()
    }

    /// Background task that consolidates once the configured interval has
    /// passed, checking hourly.
    pub fn spawn_consolidation(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let interval_hours = self.config.memory.consolidation_interval_hours;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                let mut guard = state.lock();
                if guard.store_mut().consolidate_if_due(interval_hours) {
                    let indexed = guard.reindex();
                    logging::log_memory(None, &format!("Scheduled consolidation, {} records reindexed", indexed));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Mashaaer) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        let app = Mashaaer::open_with(config, |_| db::init_in_memory()).unwrap();
        (dir, app)
    }

    fn session() -> String {
        format!("lib-test-{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_chat_stores_and_mirrors() {
        let (_dir, app) = open_temp();
        let s = session();

        let response = app.chat(&s, "أنا حزين لأن اسمي سامي ولا أحد يتذكره").await.unwrap();
        assert_eq!(response.emotion, Emotion::Sadness);
        assert!(!response.text.is_empty());

        let rows = db::get_session_interactions(&s, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].engine, "integrated");

        let hits = app.search_memories("سامي", &SearchFilters::default(), 5);
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_empty_chat_is_rejected() {
        let (_dir, app) = open_temp();
        assert!(app.chat(&session(), "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_feedback_last_requires_a_reply() {
        let (_dir, app) = open_temp();
        let s = session();
        assert!(matches!(app.feedback_last(&s, 1.0), Err(Error::InvalidFeedback(_))));

        app.chat(&s, "كيف يمكنني تنظيم وقتي؟").await.unwrap();
        app.feedback_last(&s, 0.5).unwrap();
        assert!(app.status().system.feedback_impact.persona > 0.0);
    }

    #[tokio::test]
    async fn test_generate_without_backends_uses_fallback() {
        let (_dir, app) = open_temp();
        let reply = app.generate(&session(), "مرحبا").await;
        assert_eq!(reply.engine, "local");
        assert!(app.status().backends.is_empty());
    }

    #[test]
    fn test_persona_feedback_reaches_network() {
        let (_dir, app) = open_temp();
        app.persona_feedback(PersonaId::Poet, true);
        let status = app.status();
        assert_eq!(status.network.user_feedback[&PersonaId::Poet].positive, 1);
    }
}
