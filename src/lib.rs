pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod store;
pub mod validation;

use axum::{Json, Router, routing::get};
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use store::TokenStore;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Refresh token record backend
    pub token_store: Arc<dyn TokenStore>,
    /// Header carrying the client IP (requires running behind a proxy)
    pub ip_header: Option<String>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let rate_limit = Arc::new(RateLimitConfig::new(config.ip_header.clone()));

    let api_router = api::create_api_router(
        config.db.clone(),
        jwt,
        config.token_store.clone(),
        config.secure_cookies,
        rate_limit,
    );

    Router::new()
        .route("/", get(health))
        .nest("/api", api_router)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "rallypoint is running" }))
}

/// Run cleanup once and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(tokens: &Arc<dyn TokenStore>) {
    cleanup::run_cleanup(tokens.as_ref()).await;
    cleanup::spawn_cleanup_scheduler(tokens.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.token_store).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
