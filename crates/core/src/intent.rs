use crate::models::{Category, Intent, IntentEntities};

const GREETING_CUES: &[&str] = &["xin chào", "chào", "hello", "hi"];
const SEARCH_CUES: &[&str] = &[
    "tìm", "find", "search", "quán", "nhà hàng", "cafe", "phở", "lẩu", "hàn", "việt", "phim",
    "karaoke", "giải trí",
];
const ENTERTAINMENT_CUES: &[&str] = &["phim", "karaoke", "giải trí", "triển lãm", "bảo tàng"];
const KEYWORD_CUES: &[&str] = &[
    "phở", "lẩu", "bún", "cơm", "cafe", "coffee", "buffet", "karaoke", "phim",
];

const GREETING_LABELS: &[&str] = &["greeting", "chao", "hello", "hi"];
const SEARCH_LABELS: &[&str] = &["search", "search_place", "tim", "find"];
const SCHEDULE_LABELS: &[&str] = &["add", "itinerary", "lich", "schedule"];

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Intent {
    /// Maps a classifier label onto an intent. Labels listing alternatives
    /// (`greeting|search_place`) resolve to search whenever search is among them.
    pub fn from_label(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();

        let label = if lower.contains('|') {
            let alternatives = lower.split('|').map(str::trim).collect::<Vec<_>>();
            if alternatives
                .iter()
                .any(|alternative| SEARCH_LABELS.contains(alternative))
            {
                "search_place"
            } else {
                alternatives.first().copied().unwrap_or_default()
            }
        } else {
            lower.as_str()
        };

        if contains_any(label, GREETING_LABELS) {
            Self::Greeting
        } else if contains_any(label, SEARCH_LABELS) {
            Self::Search
        } else if contains_any(label, SCHEDULE_LABELS) {
            Self::ScheduleAdd
        } else {
            Self::Unknown
        }
    }
}

/// Keyword fallback: only distinguishes greeting, search and unknown.
pub fn classify_intent_rules(text: &str) -> (Intent, IntentEntities) {
    let lower = normalize_text(text).to_lowercase();

    if contains_cue(&lower, GREETING_CUES) {
        return (Intent::Greeting, IntentEntities::default());
    }

    if contains_cue(&lower, SEARCH_CUES) {
        let keyword = KEYWORD_CUES
            .iter()
            .find(|cue| has_cue(&lower, cue))
            .map(|cue| cue.to_string());
        let category = if contains_cue(&lower, ENTERTAINMENT_CUES) {
            Category::Entertainment
        } else {
            Category::Food
        };
        return (
            Intent::Search,
            IntentEntities {
                keyword,
                category: Some(category),
            },
        );
    }

    (Intent::Unknown, IntentEntities::default())
}

fn contains_cue(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| has_cue(text, cue))
}

/// Multi-word cues match as substrings, single words only as whole words.
fn has_cue(text: &str, cue: &str) -> bool {
    if cue.contains(' ') {
        return text.contains(cue);
    }
    text.split(|ch: char| !ch.is_alphanumeric())
        .any(|word| word == cue)
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternatives_prefer_search() {
        assert_eq!(Intent::from_label("greeting|search_place"), Intent::Search);
        assert_eq!(
            Intent::from_label("greeting|search_place|add_to_itinerary|unknown"),
            Intent::Search
        );
        assert_eq!(Intent::from_label("greeting|unknown"), Intent::Greeting);
    }

    #[test]
    fn labels_map_to_intents() {
        assert_eq!(Intent::from_label("Greeting"), Intent::Greeting);
        assert_eq!(Intent::from_label("search_place"), Intent::Search);
        assert_eq!(Intent::from_label("add_to_itinerary"), Intent::ScheduleAdd);
        assert_eq!(Intent::from_label("weather"), Intent::Unknown);
    }

    #[test]
    fn greets_in_vietnamese_and_english() {
        assert_eq!(classify_intent_rules("Xin chào bạn").0, Intent::Greeting);
        assert_eq!(classify_intent_rules("hi there").0, Intent::Greeting);
    }

    #[test]
    fn short_english_cues_need_whole_words() {
        assert_eq!(classify_intent_rules("this is nothing").0, Intent::Unknown);
    }

    #[test]
    fn search_extracts_keyword_and_category() {
        let (intent, entities) = classify_intent_rules("Tìm quán phở gần đây");
        assert_eq!(intent, Intent::Search);
        assert_eq!(entities.keyword.as_deref(), Some("phở"));
        assert_eq!(entities.category, Some(Category::Food));

        let (intent, entities) = classify_intent_rules("find karaoke tonight");
        assert_eq!(intent, Intent::Search);
        assert_eq!(entities.category, Some(Category::Entertainment));
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_text("  tìm   quán \n lẩu "), "tìm quán lẩu");
    }
}
