use tracing::{error, info};
use uuid::Uuid;

use crate::agent::LlmBackend;
use crate::db::message_repository::MessageRepository;
use crate::db::session_repository::SessionRepository;
use crate::errors::AppError;
use crate::models::{
    title_from_message, ChatSession, Message, MessageRole, ModelTarget, SendMessageRequest,
    SessionSummary,
};
use crate::service::key_service::KeyService;

const MAX_MESSAGE_LENGTH: usize = 8000;

/// A validated turn whose user message is already persisted.
pub struct PreparedTurn {
    pub target: ModelTarget,
    /// Answered exchanges only, oldest first.
    pub history: Vec<Message>,
    pub user_message: Message,
}

#[derive(Clone)]
pub struct ChatService<B> {
    session_repo: SessionRepository,
    message_repo: MessageRepository,
    keys: KeyService<B>,
    backend: B,
}

impl<B: LlmBackend> ChatService<B> {
    pub fn new(
        session_repo: SessionRepository,
        message_repo: MessageRepository,
        keys: KeyService<B>,
        backend: B,
    ) -> Self {
        Self { session_repo, message_repo, keys, backend }
    }

    pub fn keys(&self) -> &KeyService<B> {
        &self.keys
    }

    pub async fn new_session(&self) -> Result<String, AppError> {
        let session = ChatSession::new(Uuid::new_v4().to_string());
        self.session_repo.save(&session).await?;
        info!("Created chat session {}", session.id);
        Ok(session.id)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, AppError> {
        self.session_repo.find_all_summaries().await
    }

    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, AppError> {
        self.require_session(session_id).await?;
        self.message_repo.find_by_session_id(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        if !self.session_repo.delete(session_id).await? {
            return Err(AppError::SessionNotFound { id: session_id.to_string() });
        }
        info!("Deleted chat session {session_id}");
        Ok(())
    }

    /// Runs a full turn and returns the stored assistant reply.
    pub async fn send_message(
        &self,
        session_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message, AppError> {
        let turn = self.prepare_turn(session_id, request).await?;
        self.complete_turn(turn).await
    }

    /// Validates the request and persists the user message.
    pub async fn prepare_turn(
        &self,
        session_id: &str,
        request: SendMessageRequest,
    ) -> Result<PreparedTurn, AppError> {
        self.require_session(session_id).await?;

        if request.message.is_empty()
            || request.model_provider.is_empty()
            || request.model_name.is_empty()
        {
            return Err(AppError::MessageFieldsRequired);
        }
        let length = request.message.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: MAX_MESSAGE_LENGTH,
                actual_length: length,
            });
        }

        let target = self
            .keys
            .resolve_target(&request.model_provider, &request.model_name)
            .await?;

        // History is read before the new user message lands.
        let history = answered_exchanges(self.message_repo.find_by_session_id(session_id).await?);
        let user_message = Message::user(session_id.to_string(), request.message);
        self.message_repo.save(&user_message).await?;

        Ok(PreparedTurn { target, history, user_message })
    }

    /// Asks the model, stores the reply and titles the session on its first answered exchange.
    pub async fn complete_turn(&self, turn: PreparedTurn) -> Result<Message, AppError> {
        let session_id = turn.user_message.session_id.clone();
        let first_exchange = !turn.history.iter().any(|m| m.role == MessageRole::Assistant);
        let content = self
            .backend
            .complete(&turn.target, &turn.history, &turn.user_message.content)
            .await?;

        let assistant = Message::assistant(session_id.clone(), content, turn.target.label());
        self.message_repo.save(&assistant).await?;

        if first_exchange {
            let title = title_from_message(&turn.user_message.content);
            if let Err(e) = self.session_repo.update_title(&session_id, &title).await {
                error!("Failed to title chat session {session_id}: {e}");
            }
        }

        Ok(assistant)
    }

    async fn require_session(&self, session_id: &str) -> Result<ChatSession, AppError> {
        self.session_repo
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound { id: session_id.to_string() })
    }
}

/// Drops user messages that never got a reply, so failed turns are not replayed.
fn answered_exchanges(messages: Vec<Message>) -> Vec<Message> {
    let mut kept = Vec::with_capacity(messages.len());
    let mut pending = None;
    for message in messages {
        match message.role {
            MessageRole::User => pending = Some(message),
            MessageRole::Assistant => {
                kept.extend(pending.take());
                kept.push(message);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedBackend;
    use crate::db::api_key_repository::ApiKeyRepository;
    use crate::db::test_pool;
    use crate::models::SaveKeyRequest;

    async fn service(backend: ScriptedBackend) -> ChatService<ScriptedBackend> {
        let pool = test_pool().await;
        let keys = KeyService::new(ApiKeyRepository::new(pool.clone()), backend.clone());
        keys.save_key(SaveKeyRequest {
            provider: "openai".into(),
            api_key: "sk-test".into(),
            models: vec!["gpt-4".into()],
        })
        .await
        .unwrap();
        ChatService::new(
            SessionRepository::new(pool.clone()),
            MessageRepository::new(pool),
            keys,
            backend,
        )
    }

    fn send(message: &str) -> SendMessageRequest {
        SendMessageRequest {
            message: message.to_string(),
            model_provider: "openai".into(),
            model_name: "gpt-4".into(),
        }
    }

    #[tokio::test]
    async fn first_exchange_titles_the_session() {
        let svc = service(ScriptedBackend::new().reply("Hi!")).await;
        let id = svc.new_session().await.unwrap();

        let long = "Explain the borrow checker in Rust with plenty of detail and examples";
        let reply = svc.send_message(&id, send(long)).await.unwrap();
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "Hi!");
        assert_eq!(reply.model.as_deref(), Some("openai/gpt-4"));

        let sessions = svc.list_sessions().await.unwrap();
        assert_eq!(sessions[0].message_count, 2);
        assert_eq!(sessions[0].title, format!("{}...", &long[..50]));
    }

    #[tokio::test]
    async fn later_exchanges_keep_the_title_and_replay_history() {
        let backend = ScriptedBackend::new().reply("one").reply("two");
        let svc = service(backend.clone()).await;
        let id = svc.new_session().await.unwrap();

        svc.send_message(&id, send("first")).await.unwrap();
        svc.send_message(&id, send("second")).await.unwrap();

        let sessions = svc.list_sessions().await.unwrap();
        assert_eq!(sessions[0].title, "first");

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, "openai/gpt-4");
        assert!(calls[0].history.is_empty());
        assert_eq!(
            calls[1].history,
            vec![(MessageRole::User, "first".to_string()), (MessageRole::Assistant, "one".to_string())]
        );
        assert_eq!(calls[1].prompt, "second");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let svc = service(ScriptedBackend::new()).await;
        let err = svc.send_message("missing", send("hi")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(svc.get_messages("missing").await.unwrap_err().is_not_found());
        assert!(svc.delete_session("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let svc = service(ScriptedBackend::new()).await;
        let id = svc.new_session().await.unwrap();
        let mut request = send("hi");
        request.model_name.clear();
        let err = svc.send_message(&id, request).await.unwrap_err();
        assert!(matches!(err, AppError::MessageFieldsRequired));
    }

    #[tokio::test]
    async fn overlong_messages_are_rejected() {
        let svc = service(ScriptedBackend::new()).await;
        let id = svc.new_session().await.unwrap();
        let err = svc.send_message(&id, send(&"a".repeat(8001))).await.unwrap_err();
        assert!(matches!(err, AppError::FieldTooLong { actual_length: 8001, .. }));
    }

    #[tokio::test]
    async fn failed_inference_keeps_the_user_message() {
        let svc = service(ScriptedBackend::new().fail("rate limited")).await;
        let id = svc.new_session().await.unwrap();

        let err = svc.send_message(&id, send("hello")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to generate response: rate limited");

        let messages = svc.get_messages(&id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn first_successful_reply_titles_the_session_after_a_failure() {
        let backend = ScriptedBackend::new().fail("boom").reply("recovered").reply("again");
        let svc = service(backend.clone()).await;
        let id = svc.new_session().await.unwrap();

        svc.send_message(&id, send("lost question")).await.unwrap_err();
        svc.send_message(&id, send("asked again")).await.unwrap();

        let sessions = svc.list_sessions().await.unwrap();
        assert_eq!(sessions[0].message_count, 3);
        assert_eq!(sessions[0].title, "asked again");

        svc.send_message(&id, send("follow up")).await.unwrap();
        let calls = backend.calls();
        assert!(calls[1].history.is_empty());
        assert_eq!(
            calls[2].history,
            vec![
                (MessageRole::User, "asked again".to_string()),
                (MessageRole::Assistant, "recovered".to_string()),
            ]
        );
        assert_eq!(svc.list_sessions().await.unwrap()[0].title, "asked again");
    }

    #[tokio::test]
    async fn deleting_a_session_drops_it_from_the_list() {
        let svc = service(ScriptedBackend::new()).await;
        let keep = svc.new_session().await.unwrap();
        let gone = svc.new_session().await.unwrap();
        svc.send_message(&gone, send("hi")).await.unwrap();

        svc.delete_session(&gone).await.unwrap();
        let ids: Vec<_> = svc.list_sessions().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![keep]);
    }
}
