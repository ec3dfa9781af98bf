mod agent;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod service;

use tracing::{info, warn};

use crate::agent::RigBackend;
use crate::config::Config;
use crate::db::api_key_repository::ApiKeyRepository;
use crate::db::message_repository::MessageRepository;
use crate::db::session_repository::SessionRepository;
use crate::service::chat_service::ChatService;
use crate::service::key_service::KeyService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_agent=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();

    // ── Database ──────────────────────────────────────────────────────────────
    let pool = db::connect(&config.database_url, config.max_connections).await?;
    info!("Database ready at {}", config.database_url);

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let backend = RigBackend::new(config.max_tokens);
    let keys = KeyService::new(ApiKeyRepository::new(pool.clone()), backend.clone());
    let chat_service = ChatService::new(
        SessionRepository::new(pool.clone()),
        MessageRepository::new(pool),
        keys,
        backend,
    );

    // ── Router ────────────────────────────────────────────────────────────────
    let static_dir = config.static_dir.is_dir().then_some(config.static_dir.as_path());
    if static_dir.is_none() {
        warn!("Static directory {} not found; serving the API only", config.static_dir.display());
    }
    let app = routes::app_router(chat_service, static_dir);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
