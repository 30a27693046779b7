use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TimeFocus,
    Creative,
    Business,
    Movie,
    Book,
    Quote,
    AiNews,
    WorldFacts,
    Music,
    History,
    Default,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TimeFocus => "time_focus",
            Intent::Creative => "creative",
            Intent::Business => "business",
            Intent::Movie => "movie",
            Intent::Book => "book",
            Intent::Quote => "quote",
            Intent::AiNews => "ai_news",
            Intent::WorldFacts => "world_facts",
            Intent::Music => "music",
            Intent::History => "history",
            Intent::Default => "default",
        }
    }
}

// Order matters: "إدارة الوقت" must win over the generic "إدارة" business rule.
const RULES: &[(Intent, &[&str])] = &[
    (Intent::TimeFocus, &["إدارة الوقت", "تنظيم الوقت"]),
    (
        Intent::TimeFocus,
        &["تركيز", "إنتاجية", "إنتاجيتي", "أزيد إنتاجية", "تنظيم", "مماطلة", "تسويف", "عادات"],
    ),
    (Intent::Creative, &["أفكار إبداعية", "فكرة إبداعية", "إلهام", "كتابة إبداعية"]),
    (Intent::Creative, &["إبداع", "ابتكار", "رسم", "تصميم"]),
    (
        Intent::Business,
        &["أعمال", "شركة", "مشروع", "ريادة", "استثمار", "تسويق", "إدارة", "فريق", "قيادة"],
    ),
    (Intent::Movie, &["فيلم", "مخرج", "ممثل", "سينما"]),
    (Intent::Book, &["كتاب", "رواية", "مؤلف", "كاتب"]),
    (Intent::Quote, &["اقتباس", "حكمة", "مقولة", "قول مأثور"]),
    (Intent::AiNews, &["ذكاء اصطناعي", "AI", "تقنية", "تكنولوجيا"]),
    (
        Intent::WorldFacts,
        &[
            "حقيقة", "معلومة", "عالم", "بلد", "دولة", "محيط", "بحر", "جبل", "حيوان", "فضاء", "كوكب",
            "علم", "اكتشاف",
        ],
    ),
    (Intent::Music, &["موسيقى", "أغنية", "مطرب", "فنان"]),
    (Intent::History, &["تاريخ", "حدث", "معركة", "شخصية تاريخية", "حضارة"]),
];

/// Classify which knowledge area a prompt belongs to. First matching rule wins.
pub fn classify_intent(prompt: &str) -> Intent {
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| prompt.contains(k)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Default)
}
