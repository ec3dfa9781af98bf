use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::error;

use crate::agent::LlmBackend;
use crate::errors::AppError;
use crate::models::{
    DeleteKeyQuery, Message, NewChatResponse, ProviderInfo, SaveKeyRequest, SendMessageRequest,
    SessionSummary, StatusResponse, StreamEvent,
};
use crate::service::chat_service::ChatService;

/// Delay between streamed characters.
const CHUNK_DELAY: Duration = Duration::from_millis(30);

// ── API keys ─────────────────────────────────────────────────────────────────

/// GET `/api/keys`
pub async fn list_keys_handler<B: LlmBackend>(
    State(svc): State<ChatService<B>>,
) -> Result<Json<BTreeMap<String, ProviderInfo>>, AppError> {
    Ok(Json(svc.keys().list_providers().await?))
}

/// POST `/api/keys`
pub async fn save_key_handler<B: LlmBackend>(
    State(svc): State<ChatService<B>>,
    Json(request): Json<SaveKeyRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let message = svc.keys().save_key(request).await?;
    Ok(Json(StatusResponse::new(message)))
}

/// DELETE `/api/keys?provider=`
pub async fn delete_key_handler<B: LlmBackend>(
    State(svc): State<ChatService<B>>,
    Query(query): Query<DeleteKeyQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let message = svc.keys().delete_key(&query.provider).await?;
    Ok(Json(StatusResponse::new(message)))
}

// ── Sessions ─────────────────────────────────────────────────────────────────

/// POST `/api/chat/new`
pub async fn new_chat_handler<B: LlmBackend>(
    State(svc): State<ChatService<B>>,
) -> Result<Json<NewChatResponse>, AppError> {
    let session_id = svc.new_session().await?;
    Ok(Json(NewChatResponse { session_id }))
}

/// GET `/api/chat/sessions`
pub async fn list_sessions_handler<B: LlmBackend>(
    State(svc): State<ChatService<B>>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(svc.list_sessions().await?))
}

/// DELETE `/api/chat/{id}`
pub async fn delete_session_handler<B: LlmBackend>(
    Path(id): Path<String>,
    State(svc): State<ChatService<B>>,
) -> Result<Json<StatusResponse>, AppError> {
    svc.delete_session(&id).await?;
    Ok(Json(StatusResponse::new("Chat session deleted")))
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// GET `/api/chat/{id}/messages`
pub async fn list_messages_handler<B: LlmBackend>(
    Path(id): Path<String>,
    State(svc): State<ChatService<B>>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(svc.get_messages(&id).await?))
}

/// POST `/api/chat/{id}/messages`: one full turn, returns the assistant message.
pub async fn send_message_handler<B: LlmBackend>(
    Path(id): Path<String>,
    State(svc): State<ChatService<B>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    Ok(Json(svc.send_message(&id, request).await?))
}

/// POST `/api/chat/{id}/stream`: same turn, replayed to the client character by character.
///
/// Validation failures are answered with a plain JSON error before the stream opens.
/// Once streaming, failures arrive as an `error` event.
pub async fn stream_message_handler<B: LlmBackend>(
    Path(id): Path<String>,
    State(svc): State<ChatService<B>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let turn = svc.prepare_turn(&id, request).await?;
    let head = stream::iter([StreamEvent::UserMessage(turn.user_message.clone())]);

    let body = stream::once(async move { svc.complete_turn(turn).await }).flat_map(|outcome| {
        let events = match outcome {
            Ok(message) => reply_events(message),
            Err(e) => {
                error!("Streaming turn failed: {e}");
                vec![StreamEvent::Error { error: e.to_string() }]
            }
        };
        stream::iter(events)
    });

    Ok(Sse::new(to_sse(head.chain(body))))
}

/// Expands a finished reply into `start`, one `chunk` per character, then `complete`.
fn reply_events(message: Message) -> Vec<StreamEvent> {
    let mut start = message.clone();
    start.content.clear();

    let mut events = vec![StreamEvent::Start(start)];
    let mut full_content = String::with_capacity(message.content.len());
    for ch in message.content.chars() {
        full_content.push(ch);
        events.push(StreamEvent::Chunk { content: ch.to_string(), full_content: full_content.clone() });
    }
    events.push(StreamEvent::Complete(message));
    events
}

fn to_sse(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.then(|event| async move {
        if matches!(event, StreamEvent::Chunk { .. }) {
            tokio::time::sleep(CHUNK_DELAY).await;
        }
        let data = serde_json::to_string(&event).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","data":{{"error":"Failed to encode event: {e}"}}}}"#)
        });
        Ok(Event::default().data(data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_events_build_up_the_content() {
        let message = Message::assistant("s".into(), "héy".into(), "openai/gpt-4".into());
        let events = reply_events(message);
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], StreamEvent::Start(m) if m.content.is_empty()));
        assert!(matches!(&events[2], StreamEvent::Chunk { content, full_content }
            if content == "é" && full_content == "hé"));
        assert!(matches!(&events[4], StreamEvent::Complete(m) if m.content == "héy"));
    }
}
