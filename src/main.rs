use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use poppins_bot::agent::tools::ToolRegistry;
use poppins_bot::agent::OllamaModel;
use poppins_bot::auth::JwtSessionVerifier;
use poppins_bot::config::AppConfig;
use poppins_bot::db::{ChatRepository, SavedDataRepository};
use poppins_bot::routes::{router, AppState};
use poppins_bot::service::{ChatService, SavedDataService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poppins_bot=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    // ── Database ──────────────────────────────────────────────────────────────
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database connection established and migrations applied");

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let model = OllamaModel::new(
        &config.ollama_base_url,
        &config.chat_model,
        &config.structured_model,
    )?;
    let tools = ToolRegistry::parenting();
    info!("Model tools available: {}", tools.names().join(", "));

    let state = AppState {
        chat: ChatService::new(
            Arc::new(model),
            Arc::new(tools),
            Arc::new(ChatRepository::new(pool.clone())),
        ),
        saved_data: SavedDataService::new(Arc::new(SavedDataRepository::new(pool))),
        sessions: Arc::new(JwtSessionVerifier::new(&config.session_secret)),
    };

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}
