use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Title given to every freshly created session.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 50;

// ── Providers ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::OpenAi, ProviderKind::Claude, ProviderKind::DeepSeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::DeepSeek => "deepseek",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::UnsupportedProvider(s.to_string()))
    }
}

/// A stored provider credential together with the models the user enabled.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub provider: String,
    pub api_key: String,
    pub models: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    pub fn new(provider: String, api_key: String, models: Vec<String>) -> Self {
        Self { provider, api_key, models, created_at: Utc::now() }
    }
}

/// Public view of a provider; the key itself is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub configured: bool,
    pub models: Vec<String>,
}

impl From<&ApiKeyRecord> for ProviderInfo {
    fn from(record: &ApiKeyRecord) -> Self {
        Self { configured: true, models: record.models.clone() }
    }
}

/// Everything needed to reach one model of one provider.
#[derive(Debug, Clone)]
pub struct ModelTarget {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
}

impl ModelTarget {
    /// `"<provider>/<model>"`, stored on assistant messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: String) -> Self {
        Self { id, title: DEFAULT_SESSION_TITLE.to_string(), created_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: i64,
}

/// Session title derived from the opening user message.
pub fn title_from_message(message: &str) -> String {
    if message.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", message.chars().take(TITLE_MAX_CHARS).collect::<String>())
    } else {
        message.to_string()
    }
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip)]
    pub id: String,
    #[serde(skip)]
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    pub fn user(session_id: String, content: String) -> Self {
        Self::new(session_id, MessageRole::User, content, None)
    }

    pub fn assistant(session_id: String, content: String, model: String) -> Self {
        Self::new(session_id, MessageRole::Assistant, content, Some(model))
    }

    fn new(session_id: String, role: MessageRole, content: String, model: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id,
            role,
            content,
            timestamp: Utc::now(),
            model,
        }
    }
}

// ── Request / response bodies ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SaveKeyRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteKeyQuery {
    #[serde(default)]
    pub provider: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub model_provider: String,
    #[serde(default)]
    pub model_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

impl StatusResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Events of the `/stream` endpoint, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    UserMessage(Message),
    Start(Message),
    Chunk { content: String, full_content: String },
    Complete(Message),
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip_through_from_str() {
        for provider in ProviderKind::ALL {
            assert_eq!(provider.as_str().parse::<ProviderKind>().unwrap(), provider);
        }
    }

    #[test]
    fn unknown_provider_is_unsupported() {
        let err = "mistral".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported provider: mistral");
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProviderKind::DeepSeek).unwrap(), "\"deepseek\"");
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
    }

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(title_from_message("Hello there"), "Hello there");
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundaries() {
        let message = "é".repeat(60);
        let title = title_from_message(&message);
        assert_eq!(title, format!("{}...", "é".repeat(50)));
    }

    #[test]
    fn user_messages_omit_model_in_json() {
        let msg = Message::user("s".into(), "hi".into());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert!(value.get("model").is_none());
        assert!(value.get("session_id").is_none());
    }

    #[test]
    fn stream_events_are_tagged() {
        let event = StreamEvent::Chunk { content: "a".into(), full_content: "ba".into() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "chunk");
        assert_eq!(value["data"]["full_content"], "ba");

        let event = StreamEvent::Error { error: "boom".into() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["error"], "boom");
    }

    #[test]
    fn model_target_label_joins_provider_and_model() {
        let target = ModelTarget {
            provider: ProviderKind::Claude,
            api_key: "k".into(),
            model: "claude-3-haiku".into(),
        };
        assert_eq!(target.label(), "claude/claude-3-haiku");
    }
}
