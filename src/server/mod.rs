//! HTTP facade.
//!
//! Routes keep the paths and parameter names existing callers use.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::atlassian::AtlassianError;
use crate::config::{ConfigError, RelayConfig};
use crate::AppState;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] AtlassianError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/jira-ticket",
            get(handlers::ticket::get_ticket).post(handlers::ticket::post_ticket),
        )
        .route("/jira-oauth-ticket", get(handlers::ticket::get_oauth_ticket))
        .route("/jira-cloud-info", get(handlers::cloud::cloud_info))
        .route("/oauth/start", get(handlers::oauth::start))
        .route("/oauth/callback", get(handlers::oauth::callback))
        .route("/oauth/token", post(handlers::oauth::refresh_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn run(config: RelayConfig) -> Result<(), StartupError> {
    let address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
