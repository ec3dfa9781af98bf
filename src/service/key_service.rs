use std::collections::BTreeMap;

use tracing::info;

use crate::agent::LlmBackend;
use crate::db::api_key_repository::ApiKeyRepository;
use crate::errors::AppError;
use crate::models::{ApiKeyRecord, ModelTarget, ProviderInfo, ProviderKind, SaveKeyRequest};

#[derive(Clone)]
pub struct KeyService<B> {
    repo: ApiKeyRepository,
    backend: B,
}

impl<B: LlmBackend> KeyService<B> {
    pub fn new(repo: ApiKeyRepository, backend: B) -> Self {
        Self { repo, backend }
    }

    /// Configured providers keyed by name, without their keys.
    pub async fn list_providers(&self) -> Result<BTreeMap<String, ProviderInfo>, AppError> {
        let records = self.repo.find_all().await?;
        Ok(records
            .iter()
            .map(|r| (r.provider.clone(), ProviderInfo::from(r)))
            .collect())
    }

    /// Validates the key against the first model, then stores it.
    pub async fn save_key(&self, request: SaveKeyRequest) -> Result<String, AppError> {
        if request.provider.is_empty() || request.api_key.is_empty() {
            return Err(AppError::KeyFieldsRequired);
        }
        let models: Vec<String> = request
            .models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        let Some(first_model) = models.first() else {
            return Err(AppError::NoModels);
        };

        let provider = request
            .provider
            .parse::<ProviderKind>()
            .map_err(|e| AppError::KeyValidationFailed { message: e.to_string() })?;

        let probe = ModelTarget {
            provider,
            api_key: request.api_key.clone(),
            model: first_model.clone(),
        };
        self.backend.validate(&probe).await?;

        let record = ApiKeyRecord::new(request.provider, request.api_key, models);
        self.repo.upsert(&record).await?;
        info!("Stored API key for {} with {} models", record.provider, record.models.len());
        Ok(format!("API key for {} saved successfully", record.provider))
    }

    pub async fn delete_key(&self, provider: &str) -> Result<String, AppError> {
        if !self.repo.delete(provider).await? {
            return Err(AppError::ProviderNotFound);
        }
        info!("Deleted API key for {provider}");
        Ok(format!("API key for {provider} deleted"))
    }

    /// Resolves a configured provider/model pair into a callable target.
    pub async fn resolve_target(&self, provider: &str, model: &str) -> Result<ModelTarget, AppError> {
        let record = self
            .repo
            .find_by_provider(provider)
            .await?
            .ok_or_else(|| AppError::ProviderNotConfigured { provider: provider.to_string() })?;

        if !record.models.iter().any(|m| m == model) {
            return Err(AppError::ModelNotConfigured {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }

        Ok(ModelTarget {
            provider: provider.parse()?,
            api_key: record.api_key,
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedBackend;
    use crate::db::test_pool;

    async fn service(backend: ScriptedBackend) -> KeyService<ScriptedBackend> {
        KeyService::new(ApiKeyRepository::new(test_pool().await), backend)
    }

    fn request(provider: &str, key: &str, models: &[&str]) -> SaveKeyRequest {
        SaveKeyRequest {
            provider: provider.to_string(),
            api_key: key.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn saved_keys_are_listed_without_secret() {
        let svc = service(ScriptedBackend::new()).await;
        let msg = svc.save_key(request("openai", "sk-1", &["gpt-4", " gpt-4o "])).await.unwrap();
        assert_eq!(msg, "API key for openai saved successfully");

        let providers = svc.list_providers().await.unwrap();
        let info = &providers["openai"];
        assert!(info.configured);
        assert_eq!(info.models, vec!["gpt-4", "gpt-4o"]);
        let json = serde_json::to_string(&providers).unwrap();
        assert!(!json.contains("sk-1"));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let svc = service(ScriptedBackend::new()).await;
        let err = svc.save_key(request("", "k", &["m"])).await.unwrap_err();
        assert!(matches!(err, AppError::KeyFieldsRequired));
        let err = svc.save_key(request("openai", "k", &[" "])).await.unwrap_err();
        assert!(matches!(err, AppError::NoModels));
    }

    #[tokio::test]
    async fn unsupported_provider_fails_validation() {
        let svc = service(ScriptedBackend::new()).await;
        let err = svc.save_key(request("mistral", "k", &["m"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to validate API key: Unsupported provider: mistral");
    }

    #[tokio::test]
    async fn rejected_model_is_not_stored() {
        let svc = service(ScriptedBackend::new().reject_model("gpt-9")).await;
        let err = svc.save_key(request("openai", "k", &["gpt-9"])).await.unwrap_err();
        assert!(matches!(err, AppError::ModelNotFound { .. }));
        assert!(svc.list_providers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_provider_is_not_found() {
        let svc = service(ScriptedBackend::new()).await;
        assert!(matches!(svc.delete_key("claude").await, Err(AppError::ProviderNotFound)));
    }

    #[tokio::test]
    async fn resolve_target_checks_provider_and_model() {
        let svc = service(ScriptedBackend::new()).await;
        svc.save_key(request("claude", "ck", &["claude-3-haiku"])).await.unwrap();

        let target = svc.resolve_target("claude", "claude-3-haiku").await.unwrap();
        assert_eq!(target.provider, ProviderKind::Claude);
        assert_eq!(target.api_key, "ck");

        let err = svc.resolve_target("claude", "claude-3-opus").await.unwrap_err();
        assert_eq!(err.to_string(), "Model \"claude-3-opus\" not configured for provider \"claude\"");
        let err = svc.resolve_target("openai", "gpt-4").await.unwrap_err();
        assert_eq!(err.to_string(), "No API key configured for openai");
    }
}
