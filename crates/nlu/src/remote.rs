use chill_core::{Category, Intent, IntentEntities, PlannerError};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::prompt::SYSTEM_PROMPT;
use crate::{Classification, IntentClassifier};

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid fence regex"));

/// Chat-completion classifier speaking the Ollama `/api/chat` protocol.
#[derive(Debug, Clone)]
pub struct RemoteIntentClassifier {
    client: Client,
    chat_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntentPayload {
    intent: String,
    entities: Option<EntityPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntityPayload {
    keyword: Option<String>,
    category: Option<String>,
}

impl RemoteIntentClassifier {
    pub fn new(client: Client, base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    async fn request_reply(&self, text: &str) -> Result<String, PlannerError> {
        let payload = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text }
            ]
        });

        let response = self
            .client
            .post(&self.chat_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                PlannerError::UpstreamUnavailable(format!("classifier request failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlannerError::UpstreamUnavailable(format!(
                "classifier returned status {}",
                status.as_u16()
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|err| {
            PlannerError::MalformedUpstreamResponse(format!("classifier body: {err}"))
        })?;
        Ok(body.message.content)
    }
}

impl IntentClassifier for RemoteIntentClassifier {
    fn name(&self) -> &'static str {
        "remote-llm"
    }

    async fn classify(&self, text: &str) -> Classification {
        let outcome = match self.request_reply(text).await {
            Ok(content) => {
                debug!(content = %content.chars().take(100).collect::<String>(), "classifier replied");
                parse_classifier_reply(&content)
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok((intent, entities)) => Classification::Classified {
                intent,
                entities,
                model: self.name(),
            },
            Err(err) => {
                warn!(error = %err, model = %self.model, "remote classification failed");
                Classification::Unclassifiable {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Pulls the JSON object out of a model reply that may carry fences or prose.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let inner = FENCED_BLOCK
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|block| block.as_str())
        .unwrap_or(content);

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    (start < end).then(|| &inner[start..=end])
}

pub fn parse_classifier_reply(content: &str) -> Result<(Intent, IntentEntities), PlannerError> {
    let cleaned = content.replace("### ", "");
    let object = extract_json_object(&cleaned).ok_or_else(|| {
        PlannerError::MalformedUpstreamResponse("no JSON object in classifier reply".to_string())
    })?;

    let payload: IntentPayload = serde_json::from_str(object).map_err(|err| {
        PlannerError::MalformedUpstreamResponse(format!("classifier JSON: {err}"))
    })?;

    if payload.intent.trim().is_empty() {
        return Err(PlannerError::MalformedUpstreamResponse(
            "classifier reply has no intent".to_string(),
        ));
    }

    // Models sometimes answer `"entities": null` for greetings.
    let raw = payload.entities.unwrap_or_default();
    let entities = IntentEntities {
        keyword: raw
            .keyword
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty()),
        category: raw.category.as_deref().and_then(Category::parse),
    };

    Ok((Intent::from_label(&payload.intent), entities))
}
