use chill_core::classify_intent_rules;

use crate::{Classification, IntentClassifier};

/// Cue-word heuristic. Always produces an answer, so it terminates fallback chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl IntentClassifier for KeywordIntentClassifier {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn classify(&self, text: &str) -> Classification {
        let (intent, entities) = classify_intent_rules(text);
        Classification::Classified {
            intent,
            entities,
            model: self.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chill_core::{Category, Intent};

    use super::*;

    #[tokio::test]
    async fn never_unclassifiable() {
        for text in ["", "???", "xin chào", "tìm quán lẩu"] {
            assert!(KeywordIntentClassifier.classify(text).await.is_classified());
        }
    }

    #[tokio::test]
    async fn search_defaults_to_food() {
        let Classification::Classified {
            intent, entities, ..
        } = KeywordIntentClassifier.classify("tìm quán lẩu").await
        else {
            panic!("keyword classifier must classify");
        };
        assert_eq!(intent, Intent::Search);
        assert_eq!(entities.keyword.as_deref(), Some("lẩu"));
        assert_eq!(entities.category, Some(Category::Food));
    }
}
