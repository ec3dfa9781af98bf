use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::error;

use crate::errors::AppError;
use crate::models::ApiKeyRecord;

#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: SqlitePool,
}

impl ApiKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<ApiKeyRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT provider, api_key, models, created_at FROM api_keys ORDER BY provider ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch api keys: {e}");
            AppError::db_query("Failed to fetch api keys", e)
        })?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn find_by_provider(&self, provider: &str) -> Result<Option<ApiKeyRecord>, AppError> {
        let row = sqlx::query(
            "SELECT provider, api_key, models, created_at FROM api_keys WHERE provider = $1",
        )
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to find api key for {provider}: {e}");
            AppError::db_query(format!("Failed to find api key for {provider}"), e)
        })?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Inserts the record, replacing any key already stored for the provider.
    pub async fn upsert(&self, record: &ApiKeyRecord) -> Result<(), AppError> {
        let models = serde_json::to_string(&record.models)
            .map_err(|e| AppError::Unexpected(format!("Failed to encode models: {e}")))?;

        sqlx::query(
            "INSERT INTO api_keys (provider, api_key, models, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (provider) DO UPDATE SET
                 api_key = excluded.api_key,
                 models = excluded.models,
                 created_at = excluded.created_at",
        )
        .bind(&record.provider)
        .bind(&record.api_key)
        .bind(models)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save api key for {}: {e}", record.provider);
            AppError::db_query("Failed to save api key", e)
        })?;
        Ok(())
    }

    /// Returns `true` when a row was removed.
    pub async fn delete(&self, provider: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE provider = $1")
            .bind(provider)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete api key for {provider}: {e}");
                AppError::db_query("Failed to delete api key", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ApiKeyRecord, AppError> {
    let models_json: String = row
        .try_get("models")
        .map_err(|e| AppError::db_query("Failed to read models", e))?;
    let models = serde_json::from_str(&models_json)
        .map_err(|e| AppError::Unexpected(format!("Corrupt models list: {e}")))?;

    Ok(ApiKeyRecord {
        provider: row
            .try_get("provider")
            .map_err(|e| AppError::db_query("Failed to read provider", e))?,
        api_key: row
            .try_get("api_key")
            .map_err(|e| AppError::db_query("Failed to read api_key", e))?,
        models,
        created_at: row
            .try_get("created_at")
            .map_err(|e| AppError::db_query("Failed to read created_at", e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn record(provider: &str, key: &str, models: &[&str]) -> ApiKeyRecord {
        ApiKeyRecord::new(
            provider.to_string(),
            key.to_string(),
            models.iter().map(|m| m.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn upsert_then_find_returns_models_in_order() {
        let repo = ApiKeyRepository::new(test_pool().await);
        repo.upsert(&record("openai", "sk-1", &["gpt-4", "gpt-3.5-turbo"])).await.unwrap();

        let found = repo.find_by_provider("openai").await.unwrap().unwrap();
        assert_eq!(found.api_key, "sk-1");
        assert_eq!(found.models, vec!["gpt-4", "gpt-3.5-turbo"]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_provider() {
        let repo = ApiKeyRepository::new(test_pool().await);
        repo.upsert(&record("claude", "old", &["a"])).await.unwrap();
        repo.upsert(&record("claude", "new", &["b", "c"])).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].api_key, "new");
        assert_eq!(all[0].models, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let repo = ApiKeyRepository::new(test_pool().await);
        repo.upsert(&record("deepseek", "k", &["deepseek-chat"])).await.unwrap();

        assert!(repo.delete("deepseek").await.unwrap());
        assert!(!repo.delete("deepseek").await.unwrap());
        assert!(repo.find_by_provider("deepseek").await.unwrap().is_none());
    }
}
