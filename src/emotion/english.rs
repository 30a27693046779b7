//! English keyword emotion classifier.

use super::Emotion;

const SAD: &[&str] = &["sad", "upset", "unhappy", "depressed", "miserable", "heartbroken"];
const HAPPY: &[&str] = &["happy", "joyful", "excited", "delighted", "pleased", "cheerful"];
const ANGRY: &[&str] = &["angry", "mad", "furious", "annoyed", "irritated", "outraged"];
const FEARFUL: &[&str] = &["afraid", "scared", "terrified", "anxious", "worried", "frightened"];

pub fn classify(text: &str) -> Emotion {
    let lowered = text.to_lowercase();
    let rules = [
        (SAD, Emotion::Sadness),
        (HAPPY, Emotion::Happiness),
        (ANGRY, Emotion::Anger),
        (FEARFUL, Emotion::Fear),
    ];

    rules
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
        .map(|(_, emotion)| *emotion)
        .unwrap_or(Emotion::Neutral)
}

pub fn model_prompt(text: &str) -> String {
    format!(
        "Analyze the emotion in the following text:\n\n\"{}\"\n\nIdentify the primary emotion in the text (sadness, happiness, anger, fear, neutral).\nPlease respond with only one of these words: sadness, happiness, anger, fear, neutral.",
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_keywords_case_insensitive() {
        assert_eq!(classify("I am SO Sad today"), Emotion::Sadness);
        assert_eq!(classify("Feeling cheerful!"), Emotion::Happiness);
        assert_eq!(classify("This is infuriating, I'm furious"), Emotion::Anger);
        assert_eq!(classify("I'm worried about tomorrow"), Emotion::Fear);
        assert_eq!(classify("The weather is mild"), Emotion::Neutral);
    }

    #[test]
    fn test_unhappy_is_sadness_not_happiness() {
        assert_eq!(classify("I feel unhappy"), Emotion::Sadness);
    }
}
