//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use wa_core::SessionManager;

use crate::routes::routes;
use crate::Result;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

/// Start the HTTP API server
pub async fn start_server(port: u16, manager: Arc<SessionManager>) -> Result<()> {
    let state = AppState { manager };

    let app = Router::new()
        .merge(routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("WhatsApp gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
