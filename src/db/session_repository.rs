use sqlx::SqlitePool;
use tracing::error;

use crate::errors::AppError;
use crate::models::{ChatSession, SessionSummary};

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All sessions with their message counts, newest first.
    pub async fn find_all_summaries(&self) -> Result<Vec<SessionSummary>, AppError> {
        sqlx::query_as::<_, SessionSummary>(
            "SELECT s.id, s.title, s.created_at, COUNT(m.id) AS message_count
             FROM chat_sessions s
             LEFT JOIN messages m ON m.session_id = s.id
             GROUP BY s.id, s.title, s.created_at
             ORDER BY s.created_at DESC, s.rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch chat sessions: {e}");
            AppError::db_query("Failed to fetch chat sessions", e)
        })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ChatSession>, AppError> {
        sqlx::query_as::<_, ChatSession>(
            "SELECT id, title, created_at FROM chat_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to find chat session {id}: {e}");
            AppError::db_query(format!("Failed to find chat session {id}"), e)
        })
    }

    pub async fn save(&self, session: &ChatSession) -> Result<ChatSession, AppError> {
        sqlx::query("INSERT INTO chat_sessions (id, title, created_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(&session.title)
            .bind(session.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to save chat session {}: {e}", session.id);
                AppError::db_query("Failed to save chat session", e)
            })?;
        Ok(session.clone())
    }

    pub async fn update_title(&self, id: &str, title: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE chat_sessions SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to update title of chat session {id}: {e}");
                AppError::db_query("Failed to update chat session", e)
            })?;
        Ok(())
    }

    /// Removes the session and its messages. Returns `true` when the session existed.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::db_query("Failed to begin transaction", e))?;

        sqlx::query("DELETE FROM messages WHERE session_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to delete messages of chat session {id}: {e}");
                AppError::db_query("Failed to delete messages", e)
            })?;

        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to delete chat session {id}: {e}");
                AppError::db_query("Failed to delete chat session", e)
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::db_query("Failed to commit transaction", e))?;
        Ok(result.rows_affected() > 0)
    }
}
