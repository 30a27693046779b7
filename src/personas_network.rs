//! Parallel personas network: every active persona drafts a reply from its
//! templates, replies are scored, and user feedback slowly evolves weights.

use crate::emotion::Emotion;
use crate::error::{Error, Result};
use crate::logging;
use crate::persist;
use crate::persona::PersonaId;
use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const EVOLUTION_FILE: &str = "persona_evolution.json";

const EVOLUTION_INTERVAL_DAYS: i64 = 7;
const MIN_FEEDBACK_FOR_EVOLUTION: u32 = 5;
const ALWAYS_ACTIVE: usize = 3;

/// Static description of a persona.
#[derive(Debug, Clone, Copy)]
pub struct PersonaProfile {
    pub id: PersonaId,
    pub description: &'static str,
    pub tone: &'static str,
    pub strengths: &'static [&'static str],
    pub weaknesses: &'static [&'static str],
    /// Arabic emotion labels this persona handles best.
    pub best_for_emotions: &'static [&'static str],
    pub response_style: &'static str,
    pub templates: [&'static str; 3],
}

pub fn profile(id: PersonaId) -> PersonaProfile {
    match id {
        PersonaId::Caring => PersonaProfile {
            id,
            description: "شخصية حنونة تهتم بمشاعر المستخدم وتقدم الدعم العاطفي",
            tone: "دافئ ومتعاطف",
            strengths: &["التعاطف", "الاستماع", "الدعم"],
            weaknesses: &["قد تكون مفرطة في العاطفة"],
            best_for_emotions: &["حزن", "قلق", "خوف"],
            response_style: "تبدأ بالتعاطف ثم تقدم الدعم",
            templates: [
                "أفهم شعورك. {input_reflection}. هل تريد أن أساعدك في هذا؟",
                "أنا هنا لأجلك. {input_reflection}. كيف يمكنني دعمك؟",
                "أشعر بما تمر به. {input_reflection}. دعنا نتحدث أكثر عن هذا.",
            ],
        },
        PersonaId::Advisor => PersonaProfile {
            id,
            description: "شخصية حكيمة تقدم النصائح والإرشادات العملية",
            tone: "هادئ وحكيم",
            strengths: &["التحليل", "الحكمة", "الحلول العملية"],
            weaknesses: &["قد تبدو متعالية أحياناً"],
            best_for_emotions: &["حيرة", "قلق", "إحباط"],
            response_style: "تحليل الموقف ثم تقديم النصيحة",
            templates: [
                "بناءً على ما ذكرت، أقترح {advice}. ما رأيك؟",
                "لو نظرنا للموضوع من زاوية أخرى، {perspective}. هل فكرت بهذه الطريقة؟",
                "هناك عدة خيارات يمكنك اتباعها: {options}. أي منها يبدو مناسباً لك؟",
            ],
        },
        PersonaId::FunnyFriend => PersonaProfile {
            id,
            description: "شخصية مرحة تضفي جواً من البهجة والفكاهة",
            tone: "مرح وخفيف",
            strengths: &["الفكاهة", "تخفيف التوتر", "الإيجابية"],
            weaknesses: &["قد لا تناسب المواقف الجدية"],
            best_for_emotions: &["فرح", "ملل", "حماس"],
            response_style: "تبدأ بملاحظة مرحة ثم تنتقل للموضوع",
            templates: [
                "هههه، {humorous_observation}! على فكرة، {response}.",
                "تخيل لو {humorous_scenario}! بالنسبة لسؤالك، {response}.",
                "أنت تذكرني بـ{humorous_comparison}! بخصوص ما سألت عنه، {response}.",
            ],
        },
        PersonaId::Poet => PersonaProfile {
            id,
            description: "شخصية شاعرية تعبر بعمق وجمال عن المشاعر والأفكار",
            tone: "عميق وتأملي",
            strengths: &["التعبير الجميل", "العمق", "الإلهام"],
            weaknesses: &["قد تكون غامضة أحياناً"],
            best_for_emotions: &["حب", "حنين", "تأمل"],
            response_style: "تستخدم لغة شاعرية وصور بلاغية",
            templates: [
                "كأن {poetic_image} يتراقص في كلماتك. {poetic_response}.",
                "في عمق ما تقول، أرى {poetic_image}. {poetic_response}.",
                "كلماتك تشبه {poetic_image}، تحمل {poetic_quality}. {poetic_response}.",
            ],
        },
        PersonaId::Scientist => PersonaProfile {
            id,
            description: "شخصية علمية تقدم المعلومات والحقائق بدقة",
            tone: "موضوعي ودقيق",
            strengths: &["المعرفة", "الدقة", "التحليل المنطقي"],
            weaknesses: &["قد تفتقر للعاطفة"],
            best_for_emotions: &["فضول", "حيرة", "رغبة في التعلم"],
            response_style: "تقديم المعلومات بشكل منظم ومدعم بالأدلة",
            templates: [
                "من الناحية العلمية، {scientific_explanation}. هل هناك جانب معين تود معرفة المزيد عنه؟",
                "الأبحاث تشير إلى أن {scientific_fact}. بالإضافة إلى ذلك، {additional_information}.",
                "لنحلل هذا بشكل منهجي: {structured_analysis}. هل هذا يجيب على تساؤلك؟",
            ],
        },
        PersonaId::Philosopher => PersonaProfile {
            id,
            description: "شخصية فلسفية تطرح الأسئلة العميقة وتتأمل في معنى الحياة",
            tone: "تأملي وعميق",
            strengths: &["التفكير العميق", "طرح الأسئلة", "التأمل"],
            weaknesses: &["قد تكون مجردة أكثر من اللازم"],
            best_for_emotions: &["حيرة وجودية", "تأمل", "بحث عن المعنى"],
            response_style: "طرح أسئلة عميقة ثم تقديم تأملات",
            templates: [
                "هذا يدفعني للتساؤل: {philosophical_question}؟ ربما {philosophical_reflection}.",
                "في جوهر سؤالك يكمن تساؤل أعمق: {philosophical_question}. {philosophical_reflection}.",
                "لو تأملنا في {philosophical_concept}، نجد أن {philosophical_reflection}. ما رأيك؟",
            ],
        },
        PersonaId::Neutral => PersonaProfile {
            id,
            description: "شخصية محايدة تقدم المعلومات والمساعدة بشكل متوازن",
            tone: "متوازن وهادئ",
            strengths: &["التوازن", "الحيادية", "الوضوح"],
            weaknesses: &["قد تفتقر للشخصية المميزة"],
            best_for_emotions: &["حياد", "هدوء", "توازن"],
            response_style: "تقديم معلومات واضحة ومباشرة",
            templates: [
                "{neutral_response}",
                "بشكل موضوعي، {neutral_response}",
                "من وجهة نظر محايدة، {neutral_response}",
            ],
        },
    }
}

// ============ Template filling ============

/// First `n` characters of `s`.
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn placeholders(input: &str) -> Vec<(&'static str, String)> {
    let p10 = prefix_chars(input, 10);
    let p15 = prefix_chars(input, 15);

    let input_reflection = if input.chars().count() > 20 {
        format!("أفهم أنك تتحدث عن {}...", prefix_chars(input, 20))
    } else {
        format!("أفهم ما تقوله عن {}", input)
    };

    vec![
        ("input_reflection", input_reflection),
        ("advice", format!("أن تفكر في {} من زاوية مختلفة", p15)),
        ("perspective", format!("يمكننا النظر إلى {} كفرصة للتعلم", p15)),
        ("options", format!("البحث أكثر عن {}, أو مناقشة الموضوع مع خبير", p10)),
        ("humorous_observation", format!("موضوع {} يذكرني بموقف طريف", p10)),
        ("humorous_scenario", format!("كل الناس تتحدث عن {} في نفس الوقت", p10)),
        ("humorous_comparison", format!("شخص يحاول شرح {} لقطة", p10)),
        // `response` has no source value; it renders as the input itself.
        ("response", input.to_string()),
        ("poetic_image", format!("أمواج الأفكار حول {}", p10)),
        ("poetic_response", "دعنا نتأمل معاً في أعماق هذه الفكرة".to_string()),
        ("poetic_quality", "عمقاً وجمالاً".to_string()),
        ("scientific_explanation", format!("ظاهرة {} تخضع لقوانين محددة", p15)),
        ("scientific_fact", format!("هناك دراسات حديثة حول {}", p15)),
        ("additional_information", "هناك جوانب أخرى مثيرة للاهتمام في هذا الموضوع".to_string()),
        ("structured_analysis", format!("أولاً، لنفهم أساسيات {}، ثم ننتقل إلى التفاصيل", p10)),
        ("philosophical_question", format!("ما علاقة {} بمفهومنا عن الذات", p10)),
        ("philosophical_reflection", format!("تتجلى في {} أسئلة وجودية عميقة", p10)),
        ("philosophical_concept", format!("مفهوم {} في سياق الوجود الإنساني", p10)),
        ("neutral_response", format!("بخصوص {}، هناك عدة جوانب يمكن مناقشتها", p15)),
    ]
}

/// Replace every `{name}` in `template` with its value.
pub fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

/// One of the persona's templates, picked at random and filled from `input`.
pub fn template_reply<R: Rng + ?Sized>(persona: PersonaId, input: &str, rng: &mut R) -> String {
    let templates = profile(persona).templates;
    let template = templates.choose(rng).copied().unwrap_or(templates[0]);
    fill_template(template, &placeholders(input))
}

// ============ Responses ============

/// Who produced a reply: one persona, the ensemble selector, or the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Persona(PersonaId),
    Ensemble,
    Unified,
}

impl Speaker {
    pub fn persona_id(&self) -> Option<PersonaId> {
        match self {
            Speaker::Persona(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaResponse {
    pub persona: Speaker,
    pub text: String,
    pub tone: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    HighestConfidence,
    WeightedRandom,
    Ensemble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

impl FeedbackKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(FeedbackKind::Positive),
            "negative" => Ok(FeedbackKind::Negative),
            other => Err(Error::InvalidFeedback(format!(
                "expected 'positive' or 'negative', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCounts {
    pub positive: u32,
    pub negative: u32,
}

impl FeedbackCounts {
    pub fn total(&self) -> u32 {
        self.positive + self.negative
    }

    /// Share of positive feedback, `None` without any feedback.
    pub fn positive_ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.positive as f64 / total as f64),
        }
    }
}

/// Persisted evolution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionData {
    #[serde(default)]
    pub persona_usage: BTreeMap<PersonaId, u64>,
    #[serde(default)]
    pub user_feedback: BTreeMap<PersonaId, FeedbackCounts>,
    pub last_evolution: DateTime<Utc>,
    #[serde(default)]
    pub weights: BTreeMap<PersonaId, f64>,
    #[serde(default)]
    pub active_personas: Vec<PersonaId>,
}

impl Default for EvolutionData {
    fn default() -> Self {
        let mut data = Self {
            persona_usage: BTreeMap::new(),
            user_feedback: BTreeMap::new(),
            last_evolution: Utc::now(),
            weights: BTreeMap::new(),
            active_personas: Vec::new(),
        };
        data.fill_missing();
        data
    }
}

impl EvolutionData {
    /// Ensure every persona has counters and a weight.
    fn fill_missing(&mut self) {
        for id in PersonaId::ALL {
            self.persona_usage.entry(id).or_insert(0);
            self.user_feedback.entry(id).or_default();
            self.weights.entry(id).or_insert(1.0);
        }
        if self.active_personas.is_empty() {
            self.active_personas = PersonaId::ALL.to_vec();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub active_personas: Vec<PersonaId>,
    pub weights: BTreeMap<PersonaId, f64>,
    pub persona_usage: BTreeMap<PersonaId, u64>,
    pub user_feedback: BTreeMap<PersonaId, FeedbackCounts>,
    pub last_evolution: DateTime<Utc>,
}

pub struct ParallelPersonasNetwork {
    path: PathBuf,
    data: EvolutionData,
}

impl ParallelPersonasNetwork {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(EVOLUTION_FILE);
        let mut data: EvolutionData = persist::load_or(&path, EvolutionData::default);
        data.fill_missing();
        Self { path, data }
    }

    pub fn save(&self) -> Result<()> {
        persist::save(&self.path, &self.data)
    }

    pub fn active_personas(&self) -> &[PersonaId] {
        &self.data.active_personas
    }

    pub fn weight(&self, persona: PersonaId) -> f64 {
        self.data.weights.get(&persona).copied().unwrap_or(1.0)
    }

    pub fn evolution_data(&self) -> &EvolutionData {
        &self.data
    }

    fn draft<R: Rng + ?Sized>(
        &mut self,
        persona: PersonaId,
        input: &str,
        emotion: Option<Emotion>,
        rng: &mut R,
    ) -> PersonaResponse {
        let profile = profile(persona);
        let text = template_reply(persona, input, rng);

        *self.data.persona_usage.entry(persona).or_insert(0) += 1;

        PersonaResponse {
            persona: Speaker::Persona(persona),
            text,
            tone: profile.tone.to_string(),
            confidence: self.confidence(persona, emotion),
        }
    }

    /// Draft one reply from a single persona and persist the usage bump.
    pub fn persona_response(
        &mut self,
        persona: PersonaId,
        input: &str,
        emotion: Option<Emotion>,
    ) -> PersonaResponse {
        let response = self.draft(persona, input, emotion, &mut rand::rng());
        persist::save_logged(&self.path, &self.data);
        response
    }

    /// Confidence in [0.1, 1.0]: emotion fit, feedback history, evolved weight.
    pub fn confidence(&self, persona: PersonaId, emotion: Option<Emotion>) -> f64 {
        let profile = profile(persona);
        let mut confidence = 0.5;

        if let Some(emotion) = emotion {
            if profile.best_for_emotions.contains(&emotion.arabic()) {
                confidence += 0.3;
            }
        }

        if let Some(ratio) = self
            .data
            .user_feedback
            .get(&persona)
            .and_then(FeedbackCounts::positive_ratio)
        {
            confidence += (ratio - 0.5) * 0.2;
        }

        confidence *= self.weight(persona);
        confidence.clamp(0.1, 1.0)
    }

    pub fn responses_with<R: Rng + ?Sized>(
        &mut self,
        input: &str,
        emotion: Option<Emotion>,
        rng: &mut R,
    ) -> Vec<PersonaResponse> {
        let active = self.data.active_personas.clone();
        let mut responses: Vec<PersonaResponse> = active
            .into_iter()
            .map(|persona| self.draft(persona, input, emotion, rng))
            .collect();

        persist::save_logged(&self.path, &self.data);

        // Stable sort keeps declaration order among equal confidences
        responses.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        responses
    }

    /// Replies from every active persona, highest confidence first.
    pub fn responses(&mut self, input: &str, emotion: Option<Emotion>) -> Vec<PersonaResponse> {
        self.responses_with(input, emotion, &mut rand::rng())
    }

    pub fn select_response_with<R: Rng + ?Sized>(
        responses: &[PersonaResponse],
        strategy: SelectionStrategy,
        rng: &mut R,
    ) -> Option<PersonaResponse> {
        if responses.is_empty() {
            return None;
        }

        match strategy {
            // First of equal maxima, so sorted input keeps its leader
            SelectionStrategy::HighestConfidence => responses
                .iter()
                .fold(None, |best: Option<&PersonaResponse>, r| match best {
                    Some(b) if b.confidence >= r.confidence => best,
                    _ => Some(r),
                })
                .cloned(),
            SelectionStrategy::WeightedRandom => responses
                .choose_weighted(rng, |r| r.confidence.max(0.0))
                .or_else(|_| responses.choose(rng).ok_or(()))
                .ok()
                .cloned(),
            SelectionStrategy::Ensemble => Some(ensemble(responses)),
        }
    }

    pub fn select_response(
        responses: &[PersonaResponse],
        strategy: SelectionStrategy,
    ) -> Option<PersonaResponse> {
        Self::select_response_with(responses, strategy, &mut rand::rng())
    }

    /// Record feedback for a persona, then evolve if a week has passed.
    pub fn process_user_feedback(&mut self, persona: PersonaId, feedback: FeedbackKind) {
        let counts = self.data.user_feedback.entry(persona).or_default();
        match feedback {
            FeedbackKind::Positive => counts.positive += 1,
            FeedbackKind::Negative => counts.negative += 1,
        }

        self.check_for_evolution(Utc::now(), &mut rand::rng());
        persist::save_logged(&self.path, &self.data);
    }

    fn check_for_evolution<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> bool {
        if now - self.data.last_evolution < Duration::days(EVOLUTION_INTERVAL_DAYS) {
            return false;
        }
        self.evolve_personas(now, rng);
        true
    }

    /// Adjust weights from feedback ratios and reshuffle the active set.
    pub fn evolve_personas<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) {
        for id in PersonaId::ALL {
            let counts = self.data.user_feedback.get(&id).copied().unwrap_or_default();
            if counts.total() < MIN_FEEDBACK_FOR_EVOLUTION {
                continue;
            }
            let Some(ratio) = counts.positive_ratio() else {
                continue;
            };

            let weight = self.weight(id);
            let evolved = if ratio >= 0.8 {
                (weight + 0.1).min(1.5)
            } else if ratio >= 0.6 {
                (weight + 0.05).min(1.2)
            } else if ratio <= 0.2 {
                (weight - 0.1).max(0.5)
            } else if ratio <= 0.4 {
                (weight - 0.05).max(0.8)
            } else {
                weight
            };
            self.data.weights.insert(id, evolved);
        }

        let mut ranked: Vec<PersonaId> = PersonaId::ALL.to_vec();
        ranked.sort_by(|a, b| self.weight(*b).total_cmp(&self.weight(*a)));

        let mut active: Vec<PersonaId> = ranked.iter().take(ALWAYS_ACTIVE).copied().collect();
        for id in ranked.iter().skip(ALWAYS_ACTIVE) {
            if rng.random::<f64>() < self.weight(*id) * 0.5 {
                active.push(*id);
            }
        }

        self.data.active_personas = active;
        self.data.last_evolution = now;

        logging::log_persona(
            None,
            &format!(
                "Personas evolved: active={:?}",
                self.data
                    .active_personas
                    .iter()
                    .map(|p| p.arabic_name())
                    .collect::<Vec<_>>()
            ),
        );
    }

    pub fn network_status(&self) -> NetworkStatus {
        NetworkStatus {
            active_personas: self.data.active_personas.clone(),
            weights: self.data.weights.clone(),
            persona_usage: self.data.persona_usage.clone(),
            user_feedback: self.data.user_feedback.clone(),
            last_evolution: self.data.last_evolution,
        }
    }
}

/// Split on '.' and drop empty fragments.
pub fn sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Opening of the first reply, middle of the second, closing of the third.
fn ensemble(responses: &[PersonaResponse]) -> PersonaResponse {
    if let [only] = responses {
        return only.clone();
    }

    let mut parts: Vec<String> = Vec::new();

    if let Some(first) = responses.first().and_then(|r| sentences(&r.text).into_iter().next()) {
        parts.push(first);
    }
    if let Some(second) = responses.get(1) {
        let s = sentences(&second.text);
        if s.len() > 2 {
            parts.extend(s[1..s.len() - 1].iter().cloned());
        }
    }
    if let Some(last) = responses.get(2).and_then(|r| sentences(&r.text).pop()) {
        parts.push(last);
    }

    let used = responses.len().min(3);
    let confidence = responses.iter().take(used).map(|r| r.confidence).sum::<f64>() / used as f64;

    let mut text = parts.join(". ");
    if !text.is_empty() && !text.ends_with(['.', '؟', '?', '!']) {
        text.push('.');
    }

    PersonaResponse {
        persona: Speaker::Ensemble,
        text,
        tone: "متنوع".to_string(),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network() -> (tempfile::TempDir, ParallelPersonasNetwork) {
        let dir = tempfile::tempdir().unwrap();
        let net = ParallelPersonasNetwork::load(dir.path());
        (dir, net)
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
    fn test_fill_template_uses_truncated_input() {
        let input = "أشعر بالوحدة في المدينة الكبيرة هذه الأيام";
        let text = fill_template(profile(PersonaId::Caring).templates[0], &placeholders(input));
        assert!(text.starts_with("أفهم شعورك. أفهم أنك تتحدث عن "));
        assert!(text.contains(&prefix_chars(input, 20)));
        assert!(!text.contains('{'));

        let short = fill_template("{input_reflection}", &placeholders("العمل"));
        assert_eq!(short, "أفهم ما تقوله عن العمل");
    }

    #[test]
    fn test_every_template_is_fully_filled() {
        let values = placeholders("سؤال عن الحياة والعمل");
        for id in PersonaId::ALL {
            for template in profile(id).templates {
                let text = fill_template(template, &values);
                assert!(!text.contains('{'), "unfilled placeholder in {}", text);
            }
        }
    }

    #[test]
    fn test_confidence_rules() {
        let (_dir, mut net) = network();
        assert!((net.confidence(PersonaId::Caring, Some(Emotion::Sadness)) - 0.8).abs() < 1e-9);
        assert!((net.confidence(PersonaId::Poet, Some(Emotion::Sadness)) - 0.5).abs() < 1e-9);

        net.data.user_feedback.insert(
            PersonaId::Poet,
            FeedbackCounts {
                positive: 4,
                negative: 0,
            },
        );
        assert!((net.confidence(PersonaId::Poet, None) - 0.6).abs() < 1e-9);

        net.data.weights.insert(PersonaId::Caring, 1.5);
        assert_eq!(net.confidence(PersonaId::Caring, Some(Emotion::Sadness)), 1.0);
    }

    #[test]
    fn test_responses_sorted_and_usage_counted() {
        let (dir, mut net) = network();
        let mut rng = StdRng::seed_from_u64(7);
        let responses = net.responses_with("أنا حزين جداً", Some(Emotion::Sadness), &mut rng);

        assert_eq!(responses.len(), 7);
        assert_eq!(responses[0].persona, Speaker::Persona(PersonaId::Caring));
        assert!(responses.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(net.evolution_data().persona_usage[&PersonaId::Poet], 1);

        let reloaded = ParallelPersonasNetwork::load(dir.path());
        assert_eq!(reloaded.evolution_data().persona_usage[&PersonaId::Poet], 1);
    }

    #[test]
    fn test_select_highest_and_empty() {
        let responses = vec![
            response(PersonaId::Neutral, "a.", 0.4),
            response(PersonaId::Advisor, "b.", 0.9),
        ];
        let best = ParallelPersonasNetwork::select_response(&responses, SelectionStrategy::HighestConfidence).unwrap();
        assert_eq!(best.persona, Speaker::Persona(PersonaId::Advisor));
        assert!(ParallelPersonasNetwork::select_response(&[], SelectionStrategy::Ensemble).is_none());
    }

    #[test]
    fn test_highest_confidence_tie_keeps_first() {
        let responses = vec![
            response(PersonaId::Caring, "a.", 0.8),
            response(PersonaId::Neutral, "b.", 0.8),
            response(PersonaId::Poet, "c.", 0.5),
        ];
        let picked =
            ParallelPersonasNetwork::select_response(&responses, SelectionStrategy::HighestConfidence).unwrap();
        assert_eq!(picked.persona, Speaker::Persona(PersonaId::Caring));
    }

    #[test]
    fn test_ensemble_of_one_is_unchanged() {
        let responses = vec![response(PersonaId::Poet, "أ. ب. ج.", 0.7)];
        let picked = ParallelPersonasNetwork::select_response(&responses, SelectionStrategy::Ensemble).unwrap();
        assert_eq!(picked, responses[0]);
    }

    #[test]
    fn test_weighted_random_follows_confidence() {
        let responses = vec![
            response(PersonaId::Neutral, "a.", 0.0),
            response(PersonaId::Caring, "b.", 0.01),
            response(PersonaId::Poet, "c.", 0.99),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut poet = 0;
        for _ in 0..200 {
            let picked = ParallelPersonasNetwork::select_response_with(
                &responses,
                SelectionStrategy::WeightedRandom,
                &mut rng,
            )
            .unwrap();
            assert_ne!(picked.persona, Speaker::Persona(PersonaId::Neutral));
            if picked.persona == Speaker::Persona(PersonaId::Poet) {
                poet += 1;
            }
        }
        assert!(poet > 180);
    }

    #[test]
    fn test_weighted_random_all_zero_still_picks() {
        let responses = vec![
            response(PersonaId::Neutral, "a.", 0.0),
            response(PersonaId::Poet, "b.", 0.0),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let picked =
            ParallelPersonasNetwork::select_response_with(&responses, SelectionStrategy::WeightedRandom, &mut rng);
        assert!(picked.is_some_and(|p| responses.contains(&p)));
    }

    #[test]
    fn test_weighted_random_returns_member() {
        let responses = vec![
            response(PersonaId::Neutral, "a.", 0.1),
            response(PersonaId::Poet, "b.", 0.9),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let picked = ParallelPersonasNetwork::select_response_with(
                &responses,
                SelectionStrategy::WeightedRandom,
                &mut rng,
            )
            .unwrap();
            assert!(responses.contains(&picked));
        }
    }

    #[test]
    fn test_ensemble_combines_three() {
        let responses = vec![
            response(PersonaId::Caring, "بداية أولى. وسط أول.", 0.9),
            response(PersonaId::Poet, "جملة. وسط ثاني. نهاية ثانية.", 0.6),
            response(PersonaId::Advisor, "شيء. خاتمة ثالثة.", 0.3),
        ];
        let merged = ensemble(&responses);
        assert_eq!(merged.text, "بداية أولى. وسط ثاني. خاتمة ثالثة.");
        assert_eq!(merged.persona, Speaker::Ensemble);
        assert_eq!(merged.tone, "متنوع");
        assert!((merged.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_feedback_parse() {
        assert_eq!(FeedbackKind::parse("Positive").unwrap(), FeedbackKind::Positive);
        assert!(matches!(FeedbackKind::parse("meh"), Err(Error::InvalidFeedback(_))));
    }

    #[test]
    fn test_feedback_does_not_evolve_within_a_week() {
        let (_dir, mut net) = network();
        for _ in 0..6 {
            net.process_user_feedback(PersonaId::Poet, FeedbackKind::Positive);
        }
        assert_eq!(net.weight(PersonaId::Poet), 1.0);
        assert_eq!(net.evolution_data().user_feedback[&PersonaId::Poet].positive, 6);
    }

    #[test]
    fn test_evolution_adjusts_weights_and_keeps_top_three() {
        let (dir, mut net) = network();
        net.data.user_feedback.insert(PersonaId::Poet, FeedbackCounts { positive: 9, negative: 1 });
        net.data.user_feedback.insert(PersonaId::Scientist, FeedbackCounts { positive: 4, negative: 2 });
        net.data.user_feedback.insert(PersonaId::Neutral, FeedbackCounts { positive: 0, negative: 5 });
        net.data.user_feedback.insert(PersonaId::Advisor, FeedbackCounts { positive: 1, negative: 2 });

        let later = Utc::now() + Duration::days(8);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(net.check_for_evolution(later, &mut rng));

        assert!((net.weight(PersonaId::Poet) - 1.1).abs() < 1e-9);
        assert!((net.weight(PersonaId::Scientist) - 1.05).abs() < 1e-9);
        assert!((net.weight(PersonaId::Neutral) - 0.9).abs() < 1e-9);
        // fewer than five feedback entries: untouched
        assert_eq!(net.weight(PersonaId::Advisor), 1.0);

        let active = net.active_personas();
        assert_eq!(&active[..2], &[PersonaId::Poet, PersonaId::Scientist]);
        assert!(active.len() >= 3);

        net.save().unwrap();
        let reloaded = ParallelPersonasNetwork::load(dir.path());
        assert!((reloaded.weight(PersonaId::Poet) - 1.1).abs() < 1e-9);
        assert_eq!(reloaded.evolution_data().last_evolution, later);
    }
}
