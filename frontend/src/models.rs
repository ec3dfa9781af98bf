use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Providers offered in the API key form: value, label, example models.
pub static PROVIDERS: [(&str, &str, &str); 3] = [
    ("openai", "OpenAI", "Examples: gpt-4, gpt-3.5-turbo, gpt-4-turbo"),
    (
        "claude",
        "Claude",
        "Examples: claude-3-5-sonnet-20241022, claude-3-haiku-20240307, claude-3-opus-20240229",
    ),
    ("deepseek", "DeepSeek", "Examples: deepseek-chat, deepseek-coder"),
];

/// Matches the backend `ProviderInfo`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ProviderInfo {
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

/// `GET /api/keys` response, keyed by provider name.
pub type ProviderMap = BTreeMap<String, ProviderInfo>;

/// Request body for `POST /api/keys`.
#[derive(Clone, Debug, Serialize)]
pub struct SaveKeyRequest {
    pub provider: String,
    pub api_key: String,
    pub models: Vec<String>,
}

/// Matches the backend `SessionSummary`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message_count: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewChatResponse {
    pub session_id: String,
}

/// Matches the backend `Message`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Request body for `POST /api/chat/{id}/messages`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SendMessageRequest {
    pub message: String,
    pub model_provider: String,
    pub model_name: String,
}

/// Error body returned by the backend on any failure.
#[derive(Clone, Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// One entry of the model dropdown.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelOption {
    /// `provider:model`
    pub value: String,
    /// `provider/model`
    pub label: String,
}

/// A parsed `provider:model` dropdown value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelChoice {
    pub provider: String,
    pub model: String,
}

impl ModelChoice {
    /// Splits at the first `:` so model names may themselves contain colons.
    pub fn parse(value: &str) -> Option<Self> {
        let (provider, model) = value.split_once(':')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self { provider: provider.to_string(), model: model.to_string() })
    }
}

/// Dropdown options for every configured (provider, model) pair.
pub fn model_options(providers: &ProviderMap) -> Vec<ModelOption> {
    providers
        .iter()
        .flat_map(|(provider, info)| {
            info.models.iter().map(move |model| ModelOption {
                value: format!("{provider}:{model}"),
                label: format!("{provider}/{model}"),
            })
        })
        .collect()
}

/// Parses the comma separated models field.
pub fn parse_models_input(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Example model names shown under the provider select.
pub fn model_examples(provider: &str) -> Option<&'static str> {
    PROVIDERS
        .iter()
        .find(|(value, _, _)| *value == provider)
        .map(|(_, _, examples)| *examples)
}

/// `provider (N models)` line of the configured providers list.
pub fn provider_summary(provider: &str, info: &ProviderInfo) -> String {
    format!("{provider} ({} models)", info.models.len())
}

const TITLE_MAX_CHARS: usize = 50;

/// Chat title derived from the first message of a session.
pub fn title_from_message(message: &str) -> String {
    if message.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", message.chars().take(TITLE_MAX_CHARS).collect::<String>())
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> ProviderMap {
        let mut map = ProviderMap::new();
        map.insert(
            "openai".into(),
            ProviderInfo { configured: true, models: vec!["gpt-4".into(), "gpt-4o".into()] },
        );
        map.insert(
            "claude".into(),
            ProviderInfo { configured: true, models: vec!["claude-3-haiku".into()] },
        );
        map
    }

    #[test]
    fn model_options_list_every_configured_model() {
        let options = model_options(&providers());
        let values: Vec<_> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["claude:claude-3-haiku", "openai:gpt-4", "openai:gpt-4o"]);
        assert_eq!(options[1].label, "openai/gpt-4");
    }

    #[test]
    fn no_providers_means_no_options() {
        assert!(model_options(&ProviderMap::new()).is_empty());
    }

    #[test]
    fn model_choice_splits_at_first_colon() {
        let choice = ModelChoice::parse("deepseek:deepseek-chat").unwrap();
        assert_eq!(choice.provider, "deepseek");
        assert_eq!(choice.model, "deepseek-chat");

        let choice = ModelChoice::parse("openai:ft:gpt-4:acme").unwrap();
        assert_eq!(choice.model, "ft:gpt-4:acme");
    }

    #[test]
    fn incomplete_model_choice_is_rejected() {
        assert_eq!(ModelChoice::parse(""), None);
        assert_eq!(ModelChoice::parse("openai"), None);
        assert_eq!(ModelChoice::parse("openai:"), None);
    }

    #[test]
    fn models_input_is_trimmed_and_filtered() {
        assert_eq!(parse_models_input(" gpt-4 ,, gpt-4o,  "), vec!["gpt-4", "gpt-4o"]);
        assert!(parse_models_input(" , ").is_empty());
    }

    #[test]
    fn examples_exist_only_for_known_providers() {
        assert!(model_examples("claude").unwrap().contains("claude-3-haiku"));
        assert_eq!(model_examples(""), None);
        assert_eq!(model_examples("mistral"), None);
    }

    #[test]
    fn summary_counts_models() {
        let map = providers();
        assert_eq!(provider_summary("openai", &map["openai"]), "openai (2 models)");
    }

    #[test]
    fn titles_truncate_after_fifty_chars() {
        assert_eq!(title_from_message("short"), "short");
        let long = "x".repeat(51);
        assert_eq!(title_from_message(&long), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn messages_parse_without_model() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"user","content":"hi","timestamp":"2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(!msg.is_assistant());
        assert_eq!(msg.model, None);
    }
}
