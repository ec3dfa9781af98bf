use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;

use crate::models::{
    ErrorBody, Message, NewChatResponse, ProviderMap, SaveKeyRequest, SendMessageRequest,
    SessionSummary,
};

/// Base URL of the backend API server; empty means same origin.
const API_BASE: &str = match option_env!("CHAT_AGENT_API_BASE") {
    Some(base) => base,
    None => "",
};

/// Fetches configured providers and their models.
pub async fn fetch_api_keys() -> Result<ProviderMap, String> {
    let resp = Request::get(&format!("{API_BASE}/api/keys"))
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    parse(resp).await
}

/// Stores an API key; the backend validates it before accepting.
pub async fn save_api_key(request: &SaveKeyRequest) -> Result<(), String> {
    let resp = Request::post(&format!("{API_BASE}/api/keys"))
        .json(request)
        .map_err(|e| format!("Serialize error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    expect_ok(resp).await
}

pub async fn delete_api_key(provider: &str) -> Result<(), String> {
    let resp = Request::delete(&format!("{API_BASE}/api/keys"))
        .query([("provider", provider)])
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    expect_ok(resp).await
}

/// Fetches the list of all chat sessions, newest first.
pub async fn fetch_sessions() -> Result<Vec<SessionSummary>, String> {
    let resp = Request::get(&format!("{API_BASE}/api/chat/sessions"))
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    parse(resp).await
}

/// Creates a session and returns its id.
pub async fn create_session() -> Result<String, String> {
    let resp = Request::post(&format!("{API_BASE}/api/chat/new"))
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    parse::<NewChatResponse>(resp).await.map(|r| r.session_id)
}

/// Fetches all messages for a given session.
pub async fn fetch_messages(session_id: &str) -> Result<Vec<Message>, String> {
    let resp = Request::get(&format!("{API_BASE}/api/chat/{session_id}/messages"))
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    parse(resp).await
}

/// Sends one user turn and returns the assistant reply.
pub async fn send_message(session_id: &str, request: &SendMessageRequest) -> Result<Message, String> {
    let resp = Request::post(&format!("{API_BASE}/api/chat/{session_id}/messages"))
        .json(request)
        .map_err(|e| format!("Serialize error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    parse(resp).await
}

pub async fn delete_session(session_id: &str) -> Result<(), String> {
    let resp = Request::delete(&format!("{API_BASE}/api/chat/{session_id}"))
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;
    expect_ok(resp).await
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    if !resp.ok() {
        return Err(error_message(resp).await);
    }
    resp.json::<T>().await.map_err(|e| format!("Parse error: {e}"))
}

async fn expect_ok(resp: Response) -> Result<(), String> {
    if resp.ok() { Ok(()) } else { Err(error_message(resp).await) }
}

/// The backend's `error` field when present, otherwise the status code.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("Server error: {status}"),
    }
}
