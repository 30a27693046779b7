use crate::emotion::Emotion;
use crate::error::{Error, Result};
use crate::memory_store::{EpisodicMemory, SemanticMemory};
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// Database connection singleton
static DB: Lazy<Mutex<Option<Connection>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Interaction {
    pub id: String,
    pub session_id: String,
    pub user_input: String,
    pub response: String,
    pub emotion: String,
    pub persona: Option<String>,
    pub engine: String,
    pub created_at: String,
}

impl Interaction {
    pub fn new(session_id: &str, user_input: &str, response: &str, emotion: Emotion, engine: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_input: user_input.to_string(),
            response: response.to_string(),
            emotion: emotion.as_str().to_string(),
            persona: None,
            engine: engine.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticRow {
    pub category: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub sources: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrainingPair {
    pub id: i64,
    pub prompt: String,
    pub response: String,
    pub emotion: String,
    pub created_at: String,
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Every exchange the assistant answered
        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            user_input TEXT NOT NULL,
            response TEXT NOT NULL,
            emotion TEXT NOT NULL,
            persona TEXT,
            engine TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_interactions_session ON interactions(session_id);

        -- Mirror of the episodic JSON store
        CREATE TABLE IF NOT EXISTS episodic_memories (
            id TEXT PRIMARY KEY,
            input TEXT NOT NULL,
            response TEXT NOT NULL,
            emotion TEXT NOT NULL,
            context TEXT NOT NULL,
            importance REAL DEFAULT 0.5,
            retrieval_count INTEGER DEFAULT 0,
            created_at TEXT NOT NULL
        );

        -- Mirror of the semantic JSON store
        CREATE TABLE IF NOT EXISTS semantic_memories (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            confidence REAL DEFAULT 0.7,
            sources INTEGER DEFAULT 1,
            updated_at TEXT NOT NULL,
            UNIQUE(category, key)
        );

        -- Prompt/reply pairs from the local fallback
        CREATE TABLE IF NOT EXISTS training_pairs (
            id INTEGER PRIMARY KEY,
            prompt TEXT NOT NULL,
            response TEXT NOT NULL,
            emotion TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn init_database(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    create_tables(&conn)?;
    *DB.lock() = Some(conn);
    Ok(())
}

/// Install an in-memory database unless one is already open.
pub fn init_in_memory() -> Result<()> {
    let mut db = DB.lock();
    if db.is_none() {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        *db = Some(conn);
    }
    Ok(())
}

fn with_connection<F, T>(f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let db = DB.lock();
    let conn = db.as_ref().ok_or(Error::DatabaseNotInitialized)?;
    f(conn)
}

// ============ Interactions ============

pub fn save_interaction(interaction: &Interaction) -> Result<()> {
    with_connection(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO interactions (id, session_id, user_input, response, emotion, persona, engine, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                interaction.id,
                interaction.session_id,
                interaction.user_input,
                interaction.response,
                interaction.emotion,
                interaction.persona,
                interaction.engine,
                interaction.created_at
            ],
        )?;
        Ok(())
    })
}

pub fn get_session_interactions(session_id: &str, limit: usize) -> Result<Vec<Interaction>> {
    with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, user_input, response, emotion, persona, engine, created_at
             FROM interactions
             WHERE session_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![session_id, limit as i64], |row| {
            Ok(Interaction {
                id: row.get(0)?,
                session_id: row.get(1)?,
                user_input: row.get(2)?,
                response: row.get(3)?,
                emotion: row.get(4)?,
                persona: row.get(5)?,
                engine: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut result = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        result.reverse();
        Ok(result)
    })
}

/// Emotion histogram over one session, or every session when `None`.
/// Labels that no longer parse are skipped.
pub fn interaction_emotion_counts(session_id: Option<&str>) -> Result<BTreeMap<Emotion, i64>> {
    with_connection(|conn| {
        let mut counts = BTreeMap::new();
        let mut collect = |label: String, count: i64| {
            if let Some(emotion) = Emotion::from_label(&label) {
                *counts.entry(emotion).or_insert(0) += count;
            }
        };

        match session_id {
            Some(session) => {
                let mut stmt = conn.prepare(
                    "SELECT emotion, COUNT(*) FROM interactions WHERE session_id = ?1 GROUP BY emotion",
                )?;
                let rows = stmt.query_map([session], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
                for row in rows {
                    let (label, count) = row?;
                    collect(label, count);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT emotion, COUNT(*) FROM interactions GROUP BY emotion")?;
                let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
                for row in rows {
                    let (label, count) = row?;
                    collect(label, count);
                }
            }
        }
        Ok(counts)
    })
}

// ============ Memories ============

pub fn save_episodic_memory(memory: &EpisodicMemory) -> Result<()> {
    let context = serde_json::to_string(&memory.context)?;
    with_connection(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO episodic_memories (id, input, response, emotion, context, importance, retrieval_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                memory.id,
                memory.input,
                memory.response,
                memory.emotion.as_str(),
                context,
                memory.importance,
                memory.retrieval_count,
                memory.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    })
}

pub fn count_episodic_memories() -> Result<i64> {
    with_connection(|conn| {
        let count = conn.query_row("SELECT COUNT(*) FROM episodic_memories", [], |row| row.get(0))?;
        Ok(count)
    })
}

pub fn save_semantic_memory(category: &str, key: &str, memory: &SemanticMemory) -> Result<()> {
    with_connection(|conn| {
        conn.execute(
            "INSERT INTO semantic_memories (category, key, value, confidence, sources, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, key) DO UPDATE SET
                value = ?3,
                confidence = ?4,
                sources = ?5,
                updated_at = ?6",
            params![
                category,
                key,
                memory.value,
                memory.confidence,
                memory.sources,
                memory.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    })
}

pub fn get_semantic_memories(category: &str) -> Result<Vec<SemanticRow>> {
    with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT category, key, value, confidence, sources, updated_at
             FROM semantic_memories WHERE category = ?1 ORDER BY key ASC",
        )?;

        let rows = stmt.query_map([category], |row| {
            Ok(SemanticRow {
                category: row.get(0)?,
                key: row.get(1)?,
                value: row.get(2)?,
                confidence: row.get(3)?,
                sources: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

// ============ Training Pairs ============

pub fn save_training_pair(prompt: &str, response: &str, emotion: Emotion) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    with_connection(|conn| {
        conn.execute(
            "INSERT INTO training_pairs (prompt, response, emotion, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![prompt, response, emotion.as_str(), now],
        )?;
        Ok(())
    })
}

/// Most recent pairs whose prompt contains `needle`, newest first.
pub fn find_training_pairs(needle: &str, limit: usize) -> Result<Vec<TrainingPair>> {
    with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, prompt, response, emotion, created_at
             FROM training_pairs
             WHERE instr(prompt, ?1) > 0
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![needle, limit as i64], |row| {
            Ok(TrainingPair {
                id: row.get(0)?,
                prompt: row.get(1)?,
                response: row.get(2)?,
                emotion: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

// ============ Reset ============

fn clear_tables(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM interactions", [])?;
    conn.execute("DELETE FROM episodic_memories", [])?;
    conn.execute("DELETE FROM semantic_memories", [])?;
    conn.execute("DELETE FROM training_pairs", [])?;
    Ok(())
}

pub fn reset_all_data() -> Result<()> {
    with_connection(clear_tables)
}
