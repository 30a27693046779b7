//! Structured logging module for Mashaaer
//!
//! Writes dated log files under `<data_dir>/logs/` with categories:
//! - EMOTION: Emotion detection and timeline events
//! - PERSONA: Persona switching, blending and evolution
//! - MEMORY: Episodic/semantic memory changes and consolidation
//! - ROUTING: Provider waterfall and fallback decisions
//! - STATE: Motivation and integrated state transitions
//! - ERROR: Errors and persistence failures

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Emotion, // Emotion detection, timeline appends
    Persona, // Persona switching, blend and evolution
    Memory,  // Memory store, index, consolidation
    Routing, // Provider waterfall and fallback brain
    State,   // Motivations and state transitions
    Error,   // Errors and persistence failures
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Emotion => "EMOTION",
            LogCategory::Persona => "PERSONA",
            LogCategory::Memory => "MEMORY",
            LogCategory::Routing => "ROUTING",
            LogCategory::State => "STATE",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory that receives log files; console-only until `init_logging` runs.
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("mashaaer-{}.log", today))
}

/// Initialize the logging system - creates the log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    *LOG_DIR.lock() = Some(log_dir.to_path_buf());

    log(LogCategory::State, None, "Mashaaer logging initialized");

    Ok(())
}

/// Format one log line. Session ids are shortened to their first 8 chars.
pub fn format_line(category: LogCategory, session_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let session_context = session_id
        .map(|id| {
            let short: String = id.chars().take(8).collect();
            format!("session={} | ", short)
        })
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        session_context,
        message
    )
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let log_line = format_line(category, session_id, message);

    print!("{}", log_line);

    let dir = LOG_DIR.lock().clone();
    if let Some(dir) = dir {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(log_line.as_bytes());
        }
    }
}

pub fn log_emotion(session_id: Option<&str>, message: &str) {
    log(LogCategory::Emotion, session_id, message);
}

pub fn log_persona(session_id: Option<&str>, message: &str) {
    log(LogCategory::Persona, session_id, message);
}

pub fn log_memory(session_id: Option<&str>, message: &str) {
    log(LogCategory::Memory, session_id, message);
}

/// Log a routing decision (which provider, why it was skipped)
pub fn log_routing(session_id: Option<&str>, message: &str) {
    log(LogCategory::Routing, session_id, message);
}

pub fn log_state(session_id: Option<&str>, message: &str) {
    log(LogCategory::State, session_id, message);
}

/// Log an error
pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs() -> std::io::Result<usize> {
    let Some(log_dir) = LOG_DIR.lock().clone() else {
        return Ok(0);
    };
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(&log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_shortens_session() {
        let line = format_line(LogCategory::Memory, Some("abcdef123456"), "stored");
        assert!(line.contains("[MEMORY]"));
        assert!(line.contains("session=abcdef12 | stored"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_format_line_without_session() {
        let line = format_line(LogCategory::Error, None, "boom");
        assert!(line.contains("[ERROR] boom"));
    }

    #[test]
    fn test_format_line_multibyte_session() {
        let line = format_line(LogCategory::Emotion, Some("جلسة-طويلة-جدا"), "x");
        assert!(line.contains("session=جلسة-طوي | x"));
    }
}
