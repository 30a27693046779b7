//! Arabic keyword emotion classifier.

use super::Emotion;

const SAD: &[&str] = &["حزين", "ضايق", "دموع", "تعبان"];
const JOY: &[&str] = &["فرحان", "سعيد", "مبسوط", "نجحت"];
const ANGER: &[&str] = &["زعلان", "عصبت", "قهرت", "غضبان"];
const FEAR: &[&str] = &["خايف", "مرعوب", "قلقان", "توتر"];

/// Lists are checked in order; the first hit wins.
pub fn classify(text: &str) -> Emotion {
    let rules = [
        (SAD, Emotion::Sadness),
        (JOY, Emotion::Happiness),
        (ANGER, Emotion::Anger),
        (FEAR, Emotion::Fear),
    ];

    rules
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, emotion)| *emotion)
        .unwrap_or(Emotion::Neutral)
}

/// Prompt asking a model for a single Arabic emotion word.
pub fn model_prompt(text: &str) -> String {
    format!(
        "تحليل المشاعر في النص التالي:\n\"{}\"\nقم بتحديد المشاعر الأساسية في النص (حزن، فرح، غضب، خوف، حياد).\nأعطني فقط كلمة واحدة من الكلمات التالية كإجابة: حزن، فرح، غضب، خوف، حياد.",
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arabic_keywords() {
        assert_eq!(classify("أنا حزين اليوم"), Emotion::Sadness);
        assert_eq!(classify("نجحت في الامتحان"), Emotion::Happiness);
        assert_eq!(classify("قهرت من الموقف"), Emotion::Anger);
        assert_eq!(classify("أنا خايف من بكرة"), Emotion::Fear);
        assert_eq!(classify("ذهبت إلى السوق"), Emotion::Neutral);
    }

    #[test]
    fn test_sadness_checked_before_joy() {
        assert_eq!(classify("كنت سعيد بس الحين حزين"), Emotion::Sadness);
    }
}
