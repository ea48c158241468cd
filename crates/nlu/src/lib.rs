mod fallback;
mod keyword;
mod prompt;
mod remote;

use chill_core::{Intent, IntentEntities};
use reqwest::Client;

pub use fallback::FallbackClassifier;
pub use keyword::KeywordIntentClassifier;
pub use prompt::SYSTEM_PROMPT;
pub use remote::{extract_json_object, parse_classifier_reply, RemoteIntentClassifier};

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Classified {
        intent: Intent,
        entities: IntentEntities,
        model: &'static str,
    },
    Unclassifiable {
        reason: String,
    },
}

impl Classification {
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }
}

pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn classify(&self, text: &str) -> Classification;
}

/// Classifier chosen at startup: keywords alone, or a remote model backed by keywords.
#[derive(Debug, Clone)]
pub enum NluStack {
    Keyword(KeywordIntentClassifier),
    Remote(FallbackClassifier<RemoteIntentClassifier, KeywordIntentClassifier>),
}

impl NluStack {
    pub fn keyword() -> Self {
        Self::Keyword(KeywordIntentClassifier)
    }

    pub fn remote(client: Client, base_url: &str, model: impl Into<String>) -> Self {
        Self::Remote(FallbackClassifier::new(
            RemoteIntentClassifier::new(client, base_url, model),
            KeywordIntentClassifier,
        ))
    }

    pub fn remote_enabled(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl IntentClassifier for NluStack {
    fn name(&self) -> &'static str {
        match self {
            NluStack::Keyword(classifier) => classifier.name(),
            NluStack::Remote(classifier) => classifier.name(),
        }
    }

    async fn classify(&self, text: &str) -> Classification {
        match self {
            NluStack::Keyword(classifier) => classifier.classify(text).await,
            NluStack::Remote(classifier) => classifier.classify(text).await,
        }
    }
}
