pub mod api_routes;

use std::path::Path;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::agent::LlmBackend;
use crate::service::chat_service::ChatService;
use api_routes::{
    delete_key_handler, delete_session_handler, list_keys_handler, list_messages_handler,
    list_sessions_handler, new_chat_handler, save_key_handler, send_message_handler,
    stream_message_handler,
};

/// JSON API routes.
pub fn api_router<B: LlmBackend>(svc: ChatService<B>) -> Router {
    Router::new()
        .route(
            "/api/keys",
            get(list_keys_handler::<B>)
                .post(save_key_handler::<B>)
                .delete(delete_key_handler::<B>),
        )
        .route("/api/chat/new", post(new_chat_handler::<B>))
        .route("/api/chat/sessions", get(list_sessions_handler::<B>))
        .route(
            "/api/chat/{id}/messages",
            get(list_messages_handler::<B>).post(send_message_handler::<B>),
        )
        .route("/api/chat/{id}/stream", post(stream_message_handler::<B>))
        .route("/api/chat/{id}", delete(delete_session_handler::<B>))
        .with_state(svc)
}

/// API routes plus the built frontend, with tracing and CORS layers.
pub fn app_router<B: LlmBackend>(svc: ChatService<B>, static_dir: Option<&Path>) -> Router {
    let mut app = api_router(svc);
    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }
    app.layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http())
}
