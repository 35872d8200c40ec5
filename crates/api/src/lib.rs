//! HTTP API for the Asclepius medical assistant.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /chat` - Multipart `message`, optional `session_id`
//! - `POST /upload` - Multipart `file`, optional `session_id` and `message`
//! - `GET /sessions/{id}` - Session transcript
//! - `DELETE /sessions/{id}` - Forget a session
//!
//! Requests without a `session_id` start a new session; its id is returned
//! in the response.

pub mod config;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::{AppConfig, ServerConfig};
pub use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/chat", post(routes::chat))
        .route("/upload", post(routes::upload))
        .route(
            "/sessions/{id}",
            get(routes::get_session).delete(routes::reset_session),
        )
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
        .with_state(state)
}

/// Start the API server on the configured address.
pub async fn serve(state: Arc<AppState>, server: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.bind, server.port).parse()?;
    if addr.ip().is_unspecified() {
        warn!(%addr, "Binding to all interfaces; put the API behind a firewall or proxy");
    }

    let router = create_router(state, server);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Starting Asclepius API server");
    axum::serve(listener, router).await?;

    Ok(())
}
