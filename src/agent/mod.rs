use std::future::Future;

use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::{anthropic, deepseek, openai};
use tracing::{error, warn};

use crate::errors::AppError;
use crate::models::{Message, MessageRole, ModelTarget, ProviderKind};

const PREAMBLE: &str = "You are a helpful AI assistant. Provide clear, accurate, and helpful responses.";
const TEMPERATURE: f64 = 0.7;
const PROBE_PROMPT: &str = "test";
/// Smallest output budget every supported provider accepts.
const PROBE_MAX_TOKENS: u64 = 16;

/// The seam between the chat service and whatever answers prompts.
pub trait LlmBackend: Clone + Send + Sync + 'static {
    /// Makes a minimal call to check that the key and model are usable.
    fn validate(&self, target: &ModelTarget) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Answers `prompt` with `history` replayed as prior turns.
    fn complete(
        &self,
        target: &ModelTarget,
        history: &[Message],
        prompt: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Builds a rig [`RigMessage`] history list from stored [`Message`] records.
fn to_rig_history(messages: &[Message]) -> Vec<RigMessage> {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::User => RigMessage::user(&m.content),
            MessageRole::Assistant => RigMessage::assistant(&m.content),
        })
        .collect()
}

/// [`LlmBackend`] backed by rig provider clients.
/// A fresh client and agent are built per request, so history is replayed from the DB each time.
#[derive(Clone)]
pub struct RigBackend {
    max_tokens: u64,
}

impl RigBackend {
    pub fn new(max_tokens: u64) -> Self {
        Self { max_tokens }
    }

    async fn chat(
        &self,
        target: &ModelTarget,
        prompt: &str,
        history: Vec<RigMessage>,
        max_tokens: u64,
    ) -> Result<String, AppError> {
        let api_key = target.api_key.as_str();
        let model = target.model.as_str();

        let result = match target.provider {
            ProviderKind::OpenAi => {
                let client: openai::Client = openai::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| client_error(target, e))?;
                client
                    .agent(model)
                    .preamble(PREAMBLE)
                    .max_tokens(max_tokens)
                    .temperature(TEMPERATURE)
                    .build()
                    .chat(prompt, history)
                    .await
            }
            ProviderKind::Claude => {
                let client: anthropic::Client = anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| client_error(target, e))?;
                client
                    .agent(model)
                    .preamble(PREAMBLE)
                    .max_tokens(max_tokens)
                    .build()
                    .chat(prompt, history)
                    .await
            }
            ProviderKind::DeepSeek => {
                let client: deepseek::Client = deepseek::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| client_error(target, e))?;
                client
                    .agent(model)
                    .preamble(PREAMBLE)
                    .max_tokens(max_tokens)
                    .temperature(TEMPERATURE)
                    .build()
                    .chat(prompt, history)
                    .await
            }
        };

        result.map_err(|e| AppError::InferenceError { message: e.to_string() })
    }
}

impl LlmBackend for RigBackend {
    async fn validate(&self, target: &ModelTarget) -> Result<(), AppError> {
        self.chat(target, PROBE_PROMPT, Vec::new(), PROBE_MAX_TOKENS)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("Model validation failed for {}: {e}", target.label());
                AppError::ModelNotFound {
                    provider: target.provider.to_string(),
                    model: target.model.clone(),
                }
            })
    }

    async fn complete(
        &self,
        target: &ModelTarget,
        history: &[Message],
        prompt: &str,
    ) -> Result<String, AppError> {
        let rig_history = to_rig_history(history);
        self.chat(target, prompt, rig_history, self.max_tokens)
            .await
            .inspect_err(|e| error!("Inference failed for {}: {e}", target.label()))
    }
}

fn client_error(target: &ModelTarget, e: impl std::fmt::Display) -> AppError {
    error!("Failed to build {} client: {e}", target.provider);
    AppError::InferenceError { message: format!("{} client error: {e}", target.provider) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_roles_and_order() {
        let history = vec![
            Message::user("s".into(), "hi".into()),
            Message::assistant("s".into(), "hello".into(), "openai/gpt-4".into()),
        ];
        let rig = to_rig_history(&history);
        assert_eq!(rig.len(), 2);
        assert!(matches!(rig[0], RigMessage::User { .. }));
        assert!(matches!(rig[1], RigMessage::Assistant { .. }));
    }
}
