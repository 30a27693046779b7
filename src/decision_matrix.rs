//! Emotion decision matrix: picks reaction strategies from the current
//! emotion, its intensity and the session's emotional history, and learns
//! strategy effectiveness from feedback.

use crate::emotion::{self, Emotion};
use crate::logging;
use crate::persist;
use crate::timeline::{self, EmotionRecord};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const RESPONSE_DATA_FILE: &str = "emotion_response_data.json";

const MAX_FEEDBACK_PER_SESSION: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Empathize,
    Encourage,
    Celebrate,
    Amplify,
    Deescalate,
    Acknowledge,
    Reassure,
    Inform,
    Engage,
}

impl Strategy {
    pub const ALL: [Strategy; 9] = [
        Strategy::Empathize,
        Strategy::Encourage,
        Strategy::Celebrate,
        Strategy::Amplify,
        Strategy::Deescalate,
        Strategy::Acknowledge,
        Strategy::Reassure,
        Strategy::Inform,
        Strategy::Engage,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Empathize => "Show understanding and validation of emotions",
            Strategy::Encourage => "Provide encouragement and positive reinforcement",
            Strategy::Celebrate => "Join in celebration of positive emotions or events",
            Strategy::Amplify => "Amplify positive emotions and experiences",
            Strategy::Deescalate => "Calm and reduce intensity of negative emotions",
            Strategy::Acknowledge => "Acknowledge emotions without judgment",
            Strategy::Reassure => "Provide reassurance and safety",
            Strategy::Inform => "Provide factual information and context",
            Strategy::Engage => "Actively engage with the topic or question",
        }
    }

    pub fn templates(&self) -> [&'static str; 3] {
        match self {
            Strategy::Empathize => [
                "أتفهم شعورك بـ{emotion}. من الطبيعي أن تشعر هكذا عندما {context}.",
                "أشعر أنك {emotion_intensity} {emotion}. أنا هنا من أجلك.",
                "يبدو أنك تمر بوقت صعب مع {context}. أنا أستمع إليك.",
            ],
            Strategy::Encourage => [
                "لقد أظهرت قوة كبيرة في التعامل مع {context}. أنا أؤمن بقدرتك على تجاوز هذا.",
                "كل خطوة للأمام مهمة، مهما كانت صغيرة. أنت تحرز تقدمًا.",
                "تذكر أن الأوقات الصعبة هي فرص للنمو. لديك ما يلزم للتغلب على هذا.",
            ],
            Strategy::Celebrate => [
                "هذه أخبار رائعة عن {context}! أنا سعيد جدًا من أجلك!",
                "تهانينا! فرحتك مستحقة تمامًا.",
                "هذا بالتأكيد شيء يستحق الاحتفال! كيف ستحتفل بهذه المناسبة؟",
            ],
            Strategy::Amplify => [
                "هذه التجربة الإيجابية مع {context} يمكن أن تكون بداية للمزيد من الأشياء الجيدة القادمة.",
                "سعادتك معدية! أخبرني المزيد عما يجعلك تشعر بهذه الطريقة.",
                "لحظات الفرح هذه مهمة جدًا. كيف يمكننا جعل هذا الشعور يدوم لفترة أطول؟",
            ],
            Strategy::Deescalate => [
                "أتفهم أنك محبط بشأن {context}. دعنا نتراجع خطوة وننظر إلى هذا بشكل مختلف.",
                "مشاعرك صحيحة. ربما يمكننا إيجاد طريقة بناءة لمعالجة {context}.",
                "أسمع أنك منزعج. هل سيساعد تقسيم الموقف إلى أجزاء أصغر؟",
            ],
            Strategy::Acknowledge => [
                "أسمع أنك تشعر بـ{emotion} حيال {context}. هذه استجابة طبيعية.",
                "{emotion} مفهوم بالنظر إلى الظروف.",
                "من المنطقي أن تشعر بـ{emotion} حيال {context}.",
            ],
            Strategy::Reassure => [
                "لا بأس أن تشعر بـ{emotion} حيال {context}. كثير من الناس سيشعرون بنفس الطريقة.",
                "بينما قد يبدو {context} ساحقًا، يمكننا العمل على هذا معًا، خطوة بخطوة.",
                "مخاوفك بشأن {context} صحيحة. دعنا نفكر فيما قد يساعدك على الشعور بمزيد من الأمان.",
            ],
            Strategy::Inform => [
                "إليك ما أعرفه عن {context} والذي قد يكون مفيدًا لك.",
                "من فهمي، {context} يتضمن عدة جوانب رئيسية تستحق النظر.",
                "دعني أشارك بعض المعلومات حول {context} التي قد تمنحك مزيدًا من الوضوح.",
            ],
            Strategy::Engage => [
                "هذه نقطة مثيرة للاهتمام حول {context}. ما هي الجوانب التي تثير فضولك أكثر؟",
                "أود استكشاف {context} معك. ما هو منظورك في هذا الموضوع؟",
                "{context} له أبعاد عديدة. أي زاوية ترغب في التركيز عليها؟",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Brief,
    Moderate,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    Medium,
    High,
}

impl IntensityLevel {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity < 0.4 {
            IntensityLevel::Low
        } else if intensity > 0.7 {
            IntensityLevel::High
        } else {
            IntensityLevel::Medium
        }
    }

    fn words(&self) -> &'static [&'static str] {
        match self {
            IntensityLevel::Low => &["قليلاً", "somewhat"],
            IntensityLevel::Medium => &["", "moderately"],
            IntensityLevel::High => &["جداً", "very", "extremely"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Deteriorating,
    Stable,
    Fluctuating,
}

/// Base reaction for an emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reaction {
    pub primary: Strategy,
    pub secondary: Strategy,
    pub tone: &'static str,
    pub length: ResponseLength,
    pub question_likelihood: f64,
}

pub fn base_reaction(emotion: Emotion) -> Reaction {
    let (primary, secondary, tone, length, question_likelihood) = match emotion {
        Emotion::Sadness => (Strategy::Empathize, Strategy::Encourage, "gentle", ResponseLength::Moderate, 0.3),
        Emotion::Happiness => (Strategy::Celebrate, Strategy::Amplify, "enthusiastic", ResponseLength::Moderate, 0.5),
        Emotion::Anger => (Strategy::Deescalate, Strategy::Acknowledge, "calm", ResponseLength::Brief, 0.2),
        Emotion::Fear => (Strategy::Reassure, Strategy::Inform, "steady", ResponseLength::Moderate, 0.4),
        Emotion::Neutral => (Strategy::Inform, Strategy::Engage, "neutral", ResponseLength::Balanced, 0.5),
    };
    Reaction {
        primary,
        secondary,
        tone,
        length,
        question_likelihood,
    }
}

const INTENSITY_MODIFIERS: &[(&str, f64)] = &[
    ("جداً", 0.3),
    ("كثيراً", 0.3),
    ("للغاية", 0.3),
    ("very", 0.3),
    ("extremely", 0.4),
    ("قليلاً", -0.2),
    ("نوعاً ما", -0.2),
    ("slightly", -0.2),
    ("somewhat", -0.2),
];

const FOLLOW_UP_QUESTIONS: [&str; 3] = [
    "كيف يمكنني مساعدتك أكثر؟",
    "هل هناك شيء محدد تود التحدث عنه؟",
    "ما رأيك في هذا؟",
];

/// Intensity in [0.1, 1.0] from modifier words and punctuation.
pub fn intensity_of(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut intensity = 0.5;
    for (modifier, delta) in INTENSITY_MODIFIERS {
        if lower.contains(modifier) {
            intensity += delta;
        }
    }
    intensity += text.matches('!').count() as f64 * 0.1;
    intensity += text.matches('؟').count() as f64 * 0.05;
    intensity += text.matches('?').count() as f64 * 0.05;
    intensity.clamp(0.1, 1.0)
}

/// Keyword emotion plus intensity.
pub fn detect_emotion(text: &str) -> (Emotion, f64) {
    (emotion::detect_emotion(text).0, intensity_of(text))
}

fn valence(emotion: Emotion) -> f64 {
    match emotion {
        Emotion::Happiness => 1.0,
        Emotion::Neutral => 0.0,
        Emotion::Sadness => -1.0,
        Emotion::Anger => -0.8,
        Emotion::Fear => -0.6,
    }
}

/// `1 - changes / (n - 1)`, fully stable below two records.
pub fn emotional_stability(timeline: &[EmotionRecord]) -> f64 {
    if timeline.len() < 2 {
        return 1.0;
    }
    let changes = timeline.windows(2).filter(|w| w[0].emotion != w[1].emotion).count();
    1.0 - changes as f64 / (timeline.len() - 1) as f64
}

pub fn emotional_trend(timeline: &[EmotionRecord]) -> Trend {
    if timeline.len() < 3 {
        return Trend::Stable;
    }

    let mean = |records: &[EmotionRecord]| {
        records.iter().map(|r| valence(r.emotion)).sum::<f64>() / records.len() as f64
    };
    let (first, second) = timeline.split_at(timeline.len() / 2);
    let (first, second) = (mean(first), mean(second));

    if (second - first).abs() < 0.3 {
        let recent: HashSet<Emotion> = timeline.iter().rev().take(5).map(|r| r.emotion).collect();
        if recent.len() >= 3 {
            Trend::Fluctuating
        } else {
            Trend::Stable
        }
    } else if second > first {
        Trend::Improving
    } else {
        Trend::Deteriorating
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionalContext {
    pub current_emotion: Emotion,
    pub intensity: f64,
    pub intensity_level: IntensityLevel,
    pub stability: f64,
    pub trend: Trend,
    /// Session timeline before the current emotion was logged.
    pub timeline: Vec<EmotionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionPlan {
    pub primary_strategy: Strategy,
    pub secondary_strategy: Strategy,
    pub tone: &'static str,
    pub intensity_level: IntensityLevel,
    pub ask_question: bool,
    pub response_length: ResponseLength,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionalResponse {
    pub text: String,
    pub emotion: Emotion,
    pub intensity: f64,
    pub primary_strategy: Strategy,
    pub secondary_strategy: Strategy,
    pub tone: &'static str,
    pub emotional_context: EmotionalContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub emotion: Emotion,
    pub primary_strategy: Strategy,
    pub secondary_strategy: Strategy,
    pub feedback_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseData {
    #[serde(default)]
    strategy_effectiveness: BTreeMap<Strategy, BTreeMap<Emotion, f64>>,
    #[serde(default)]
    emotion_transitions: BTreeMap<Emotion, BTreeMap<Emotion, f64>>,
    #[serde(default)]
    feedback_history: BTreeMap<String, Vec<FeedbackRecord>>,
}

// Columns: sadness, happiness, anger, fear, neutral
const DEFAULT_EFFECTIVENESS: [(Strategy, [f64; 5]); 9] = [
    (Strategy::Empathize, [0.8, 0.4, 0.6, 0.7, 0.5]),
    (Strategy::Encourage, [0.7, 0.6, 0.4, 0.6, 0.5]),
    (Strategy::Celebrate, [0.3, 0.9, 0.2, 0.3, 0.6]),
    (Strategy::Amplify, [0.2, 0.8, 0.2, 0.3, 0.5]),
    (Strategy::Deescalate, [0.5, 0.3, 0.8, 0.6, 0.4]),
    (Strategy::Acknowledge, [0.7, 0.5, 0.7, 0.7, 0.6]),
    (Strategy::Reassure, [0.6, 0.4, 0.5, 0.9, 0.5]),
    (Strategy::Inform, [0.4, 0.5, 0.6, 0.7, 0.8]),
    (Strategy::Engage, [0.5, 0.7, 0.4, 0.5, 0.7]),
];

const DEFAULT_TRANSITIONS: [(Emotion, [f64; 5]); 5] = [
    (Emotion::Sadness, [0.6, 0.1, 0.1, 0.1, 0.1]),
    (Emotion::Happiness, [0.1, 0.6, 0.1, 0.1, 0.1]),
    (Emotion::Anger, [0.2, 0.1, 0.5, 0.1, 0.1]),
    (Emotion::Fear, [0.2, 0.1, 0.1, 0.5, 0.1]),
    (Emotion::Neutral, [0.1, 0.2, 0.1, 0.1, 0.5]),
];

fn row(values: [f64; 5]) -> BTreeMap<Emotion, f64> {
    Emotion::ALL.into_iter().zip(values).collect()
}

impl Default for ResponseData {
    fn default() -> Self {
        Self {
            strategy_effectiveness: DEFAULT_EFFECTIVENESS
                .into_iter()
                .map(|(strategy, values)| (strategy, row(values)))
                .collect(),
            emotion_transitions: DEFAULT_TRANSITIONS
                .into_iter()
                .map(|(emotion, values)| (emotion, row(values)))
                .collect(),
            feedback_history: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionStatistics {
    pub emotion_counts: BTreeMap<Emotion, usize>,
    /// Mean feedback score per emotion.
    pub emotion_feedback: BTreeMap<Emotion, f64>,
    pub strategy_effectiveness: BTreeMap<Strategy, BTreeMap<Emotion, f64>>,
    pub total_interactions: usize,
}

pub struct EmotionDecisionMatrix {
    path: PathBuf,
    data: ResponseData,
}

impl EmotionDecisionMatrix {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(RESPONSE_DATA_FILE);
        let data = persist::load_or(&path, ResponseData::default);
        Self { path, data }
    }

    /// Read stability and trend from the session timeline, then log the
    /// current emotion onto it.
    pub fn analyze_emotional_context(&self, input: &str, session_id: &str, current: Emotion) -> EmotionalContext {
        let intensity = intensity_of(input);
        let history = timeline::emotion_timeline(session_id);
        let stability = emotional_stability(&history);
        let trend = emotional_trend(&history);

        timeline::log_emotion(session_id, current, input);

        EmotionalContext {
            current_emotion: current,
            intensity,
            intensity_level: IntensityLevel::from_intensity(intensity),
            stability,
            trend,
            timeline: history,
        }
    }

    pub fn determine_reaction_strategy(&self, context: &EmotionalContext) -> ReactionPlan {
        let emotion = context.current_emotion;
        let base = base_reaction(emotion);
        let mut primary = base.primary;
        let mut secondary = base.secondary;

        match context.trend {
            Trend::Deteriorating if context.stability < 0.5 && emotion.is_negative() => {
                primary = Strategy::Reassure;
                secondary = Strategy::Acknowledge;
            }
            Trend::Improving if emotion == Emotion::Happiness => primary = Strategy::Amplify,
            Trend::Improving if emotion.is_negative() => primary = Strategy::Encourage,
            _ => {}
        }

        let tone = match emotion {
            Emotion::Anger | Emotion::Fear if context.intensity > 0.7 => "gentle",
            Emotion::Happiness if context.intensity > 0.7 => "enthusiastic",
            _ => base.tone,
        };

        let mut question_likelihood = base.question_likelihood;
        if context.stability < 0.5 {
            question_likelihood *= 0.7;
        }

        ReactionPlan {
            primary_strategy: primary,
            secondary_strategy: secondary,
            tone,
            intensity_level: context.intensity_level,
            ask_question: question_likelihood > 0.5,
            response_length: base.length,
        }
    }

    pub fn generate_emotional_response_with<R: Rng + ?Sized>(
        &self,
        context: EmotionalContext,
        context_text: &str,
        rng: &mut R,
    ) -> EmotionalResponse {
        let plan = self.determine_reaction_strategy(&context);
        logging::log_emotion(
            None,
            &format!(
                "{} -> {:?} ({}), then {:?}",
                context.current_emotion,
                plan.primary_strategy,
                plan.primary_strategy.description(),
                plan.secondary_strategy
            ),
        );
        let intensity_word = plan.intensity_level.words().choose(rng).copied().unwrap_or("");

        let fill = |strategy: Strategy, rng: &mut R| {
            let templates = strategy.templates();
            let template = templates.choose(rng).copied().unwrap_or(templates[0]);
            template
                .replace("{emotion_intensity}", intensity_word)
                .replace("{emotion}", context.current_emotion.arabic())
                .replace("{context}", context_text)
        };

        let primary_text = fill(plan.primary_strategy, rng);
        let secondary_text = fill(plan.secondary_strategy, rng);

        let text = match plan.response_length {
            ResponseLength::Brief => primary_text,
            ResponseLength::Moderate => format!("{} {}", primary_text, secondary_text),
            ResponseLength::Balanced => {
                let mut text = format!("{} {}", primary_text, secondary_text);
                if plan.ask_question {
                    if let Some(question) = FOLLOW_UP_QUESTIONS.choose(rng) {
                        text.push(' ');
                        text.push_str(question);
                    }
                }
                text
            }
        };

        EmotionalResponse {
            text,
            emotion: context.current_emotion,
            intensity: context.intensity,
            primary_strategy: plan.primary_strategy,
            secondary_strategy: plan.secondary_strategy,
            tone: plan.tone,
            emotional_context: context,
        }
    }

    /// Strategy-driven reply for an already analyzed context.
    pub fn generate_emotional_response(&self, context: EmotionalContext, context_text: &str) -> EmotionalResponse {
        self.generate_emotional_response_with(context, context_text, &mut rand::rng())
    }

    /// Move effectiveness toward `0.5 + score / 2`, 10% for the primary
    /// strategy and 5% for the secondary.
    pub fn process_feedback(
        &mut self,
        session_id: &str,
        emotion: Emotion,
        primary: Strategy,
        secondary: Strategy,
        score: f64,
    ) {
        let target = 0.5 + score / 2.0;
        let effectiveness = &mut self.data.strategy_effectiveness;

        let current = effectiveness.entry(primary).or_default().entry(emotion).or_insert(0.5);
        *current = *current * 0.9 + target * 0.1;
        let current = effectiveness.entry(secondary).or_default().entry(emotion).or_insert(0.5);
        *current = *current * 0.95 + target * 0.05;

        let history = self.data.feedback_history.entry(session_id.to_string()).or_default();
        history.push(FeedbackRecord {
            timestamp: Utc::now(),
            emotion,
            primary_strategy: primary,
            secondary_strategy: secondary,
            feedback_score: score,
        });
        if history.len() > MAX_FEEDBACK_PER_SESSION {
            let excess = history.len() - MAX_FEEDBACK_PER_SESSION;
            history.drain(..excess);
        }

        persist::save_logged(&self.path, &self.data);
    }

    pub fn strategy_effectiveness(&self, strategy: Strategy, emotion: Emotion) -> f64 {
        self.data
            .strategy_effectiveness
            .get(&strategy)
            .and_then(|row| row.get(&emotion))
            .copied()
            .unwrap_or(0.5)
    }

    /// Most likely next emotion from the transition priors.
    pub fn predicted_next_emotion(&self, current: Emotion) -> Emotion {
        self.data
            .emotion_transitions
            .get(&current)
            .and_then(|row| {
                row.iter()
                    .fold(None, |best: Option<(Emotion, f64)>, (emotion, p)| match best {
                        Some((_, bp)) if bp >= *p => best,
                        _ => Some((*emotion, *p)),
                    })
            })
            .map(|(emotion, _)| emotion)
            .unwrap_or(current)
    }

    /// Statistics for one session, or all sessions when `None` or unknown.
    pub fn emotion_statistics(&self, session_id: Option<&str>) -> EmotionStatistics {
        let history: Vec<&FeedbackRecord> = match session_id.and_then(|s| self.data.feedback_history.get(s)) {
            Some(records) => records.iter().collect(),
            None => self.data.feedback_history.values().flatten().collect(),
        };

        let mut counts: BTreeMap<Emotion, usize> = BTreeMap::new();
        let mut sums: BTreeMap<Emotion, f64> = BTreeMap::new();
        for record in &history {
            *counts.entry(record.emotion).or_insert(0) += 1;
            *sums.entry(record.emotion).or_insert(0.0) += record.feedback_score;
        }
        let emotion_feedback = sums
            .into_iter()
            .map(|(emotion, sum)| (emotion, sum / counts[&emotion] as f64))
            .collect();

        EmotionStatistics {
            emotion_counts: counts,
            emotion_feedback,
            strategy_effectiveness: self.data.strategy_effectiveness.clone(),
            total_interactions: history.len(),
        }
    }
}
