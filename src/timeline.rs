//! Per-session emotion timeline (process-global, in memory) and the memory
//! reactor that comments on mood changes.

use crate::emotion::Emotion;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub emotion: Emotion,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// Session id -> ordered emotion records
static TIMELINES: Lazy<Mutex<HashMap<String, Vec<EmotionRecord>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn log_emotion(session_id: &str, emotion: Emotion, text: &str) {
    let record = EmotionRecord {
        emotion,
        text: text.to_string(),
        timestamp: Utc::now(),
    };
    TIMELINES
        .lock()
        .entry(session_id.to_string())
        .or_default()
        .push(record);
}

/// Last logged emotion, neutral for a fresh session.
pub fn last_emotion(session_id: &str) -> Emotion {
    TIMELINES
        .lock()
        .get(session_id)
        .and_then(|records| records.last())
        .map(|r| r.emotion)
        .unwrap_or(Emotion::Neutral)
}

pub fn emotion_timeline(session_id: &str) -> Vec<EmotionRecord> {
    TIMELINES.lock().get(session_id).cloned().unwrap_or_default()
}

pub fn clear_session(session_id: &str) {
    TIMELINES.lock().remove(session_id);
}

// ============ Memory Reactor ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    New,
    Change,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryReaction {
    pub reaction_type: ReactionType,
    pub message: String,
    /// Most frequent emotion in the session so far.
    pub emotion_trend: Emotion,
    pub emotion_history: BTreeMap<Emotion, usize>,
}

/// Compare the current emotion with what the session logged before it.
/// Call before logging the current emotion.
pub fn react_to_memory(session_id: &str, current: Emotion) -> MemoryReaction {
    let timeline = emotion_timeline(session_id);

    let Some(last) = timeline.last().map(|r| r.emotion) else {
        return MemoryReaction {
            reaction_type: ReactionType::New,
            message: "هذه أول مرة نتفاعل فيها".to_string(),
            emotion_trend: Emotion::Neutral,
            emotion_history: BTreeMap::new(),
        };
    };

    let mut counts: BTreeMap<Emotion, usize> = BTreeMap::new();
    for record in &timeline {
        *counts.entry(record.emotion).or_insert(0) += 1;
    }

    // Ties go to the emotion seen first in the timeline
    let mut dominant = Emotion::Neutral;
    let mut best = 0;
    for record in &timeline {
        let count = counts[&record.emotion];
        if count > best {
            best = count;
            dominant = record.emotion;
        }
    }

    let changed = last != current;
    let message = if changed {
        format!("أشعر أن مزاجك تغير من {} إلى {}", last.arabic(), current.arabic())
    } else {
        format!("مزاجك مستمر في {}", current.arabic())
    };

    MemoryReaction {
        reaction_type: if changed {
            ReactionType::Change
        } else {
            ReactionType::Continue
        },
        message,
        emotion_trend: dominant,
        emotion_history: counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> String {
        format!("timeline-test-{}-{}", name, uuid::Uuid::new_v4())
    }

    #[test]
    fn test_fresh_session_is_neutral_and_empty() {
        let s = session("fresh");
        assert_eq!(last_emotion(&s), Emotion::Neutral);
        assert!(emotion_timeline(&s).is_empty());
    }

    #[test]
    fn test_log_and_read_back_in_order() {
        let s = session("order");
        log_emotion(&s, Emotion::Sadness, "first");
        log_emotion(&s, Emotion::Happiness, "second");

        let timeline = emotion_timeline(&s);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].text, "first");
        assert_eq!(last_emotion(&s), Emotion::Happiness);

        clear_session(&s);
        assert!(emotion_timeline(&s).is_empty());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let a = session("a");
        let b = session("b");
        log_emotion(&a, Emotion::Anger, "grr");
        assert_eq!(last_emotion(&b), Emotion::Neutral);
    }

    #[test]
    fn test_reactor_new_session() {
        let reaction = react_to_memory(&session("reactor-new"), Emotion::Fear);
        assert_eq!(reaction.reaction_type, ReactionType::New);
        assert_eq!(reaction.message, "هذه أول مرة نتفاعل فيها");
    }

    #[test]
    fn test_reactor_change_and_continue() {
        let s = session("reactor");
        log_emotion(&s, Emotion::Sadness, "a");
        log_emotion(&s, Emotion::Sadness, "b");
        log_emotion(&s, Emotion::Happiness, "c");

        let change = react_to_memory(&s, Emotion::Anger);
        assert_eq!(change.reaction_type, ReactionType::Change);
        assert_eq!(change.message, "أشعر أن مزاجك تغير من فرح إلى غضب");
        assert_eq!(change.emotion_trend, Emotion::Sadness);
        assert_eq!(change.emotion_history[&Emotion::Sadness], 2);

        let cont = react_to_memory(&s, Emotion::Happiness);
        assert_eq!(cont.reaction_type, ReactionType::Continue);
        assert_eq!(cont.message, "مزاجك مستمر في فرح");
    }
}
