use tracing::warn;

use crate::{Classification, IntentClassifier};

/// Asks `primary` first and falls back to `secondary` when it cannot classify.
#[derive(Debug, Clone)]
pub struct FallbackClassifier<P, F> {
    primary: P,
    secondary: F,
}

impl<P, F> FallbackClassifier<P, F> {
    pub fn new(primary: P, secondary: F) -> Self {
        Self { primary, secondary }
    }
}

impl<P, F> IntentClassifier for FallbackClassifier<P, F>
where
    P: IntentClassifier,
    F: IntentClassifier,
{
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn classify(&self, text: &str) -> Classification {
        match self.primary.classify(text).await {
            Classification::Unclassifiable { reason } => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    reason = %reason,
                    "primary classifier failed, using fallback"
                );
                self.secondary.classify(text).await
            }
            classified => classified,
        }
    }
}

#[cfg(test)]
mod tests {
    use chill_core::{Intent, IntentEntities};

    use super::*;
    use crate::KeywordIntentClassifier;

    struct Broken;

    impl IntentClassifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn classify(&self, _text: &str) -> Classification {
            Classification::Unclassifiable {
                reason: "offline".to_string(),
            }
        }
    }

    struct AlwaysGreets;

    impl IntentClassifier for AlwaysGreets {
        fn name(&self) -> &'static str {
            "greeter"
        }

        async fn classify(&self, _text: &str) -> Classification {
            Classification::Classified {
                intent: Intent::Greeting,
                entities: IntentEntities::default(),
                model: "greeter",
            }
        }
    }

    #[tokio::test]
    async fn uses_secondary_when_primary_is_unclassifiable() {
        let chain = FallbackClassifier::new(Broken, KeywordIntentClassifier);
        let Classification::Classified { intent, model, .. } = chain.classify("tìm quán phở").await
        else {
            panic!("chain should classify");
        };
        assert_eq!(intent, Intent::Search);
        assert_eq!(model, "keywords");
    }

    #[tokio::test]
    async fn keeps_primary_answer_when_available() {
        let chain = FallbackClassifier::new(AlwaysGreets, KeywordIntentClassifier);
        let Classification::Classified { intent, model, .. } = chain.classify("tìm quán phở").await
        else {
            panic!("chain should classify");
        };
        assert_eq!(intent, Intent::Greeting);
        assert_eq!(model, "greeter");
    }
}
