//! Job posting classifier backed by a chat-completions model.
//!
//! [`LlmClassifier::classify`] never fails: a missing or malformed key, a
//! model that keeps erroring, or a reply without JSON all end in the
//! all-`N/A` [`Classification`]. A reply that does parse is still validated
//! field by field against the closed vocabularies.

mod client;
mod prompt;
mod reply;

use async_trait::async_trait;
use joblens_shared::{Classification, ClassifierConfig, Result, api_key_looks_valid};
use tracing::{debug, info, instrument, warn};

pub use client::{CallError, ChatClient, ChatRequest, Message};
pub use prompt::{system_prompt, user_message};
pub use reply::decode_reply;

/// Anything that can turn a posting into a [`Classification`].
#[async_trait]
pub trait JobClassifier: Send + Sync {
    /// Classify one posting. Implementations degrade to the default
    /// classification instead of returning errors.
    async fn classify(&self, title: &str, text: &str) -> Classification;
}

pub struct LlmClassifier {
    config: ClassifierConfig,
    client: Option<ChatClient>,
}

impl LlmClassifier {
    /// Build a classifier. Without a well-formed key every call returns the
    /// default classification and no request is made.
    pub fn new(config: ClassifierConfig, api_key: Option<String>) -> Result<Self> {
        let client = match api_key {
            Some(key) if api_key_looks_valid(&key) => {
                Some(ChatClient::new(key, &config.base_url, config.timeout)?)
            }
            Some(_) => {
                warn!("API key is malformed, classification disabled");
                None
            }
            None => {
                warn!("no API key configured, classification disabled");
                None
            }
        };

        Ok(Self { config, client })
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn request(&self, title: &str, text: &str) -> ChatRequest {
        ChatRequest::new(self.config.model.as_str())
            .temperature(self.config.temperature)
            .message(Message::system(system_prompt()))
            .message(Message::user(user_message(title, text)))
    }
}

#[async_trait]
impl JobClassifier for LlmClassifier {
    #[instrument(skip_all, fields(title = %title, chars = text.chars().count()))]
    async fn classify(&self, title: &str, text: &str) -> Classification {
        let Some(client) = &self.client else {
            debug!("classification disabled, using defaults");
            return Classification::default();
        };

        let request = self.request(title, text);
        let request = &request;

        let outcome = self
            .config
            .retry
            .run(
                "classify",
                move |_| async move {
                    let content = client.chat(request).await?;
                    decode_reply(&content).map_err(CallError::Decode)
                },
                |e: &CallError| {
                    if !e.is_transient() {
                        debug!(error = %e, "non-transient classification error");
                    }
                    true
                },
            )
            .await;

        match outcome {
            Ok(classification) => {
                info!(
                    level = classification.level.as_str(),
                    best_stack = classification.best_stack_label(),
                    "posting classified"
                );
                classification
            }
            Err(e) => {
                warn!(attempts = e.attempts, error = %e.error, "classification failed, using defaults");
                Classification::default()
            }
        }
    }
}
