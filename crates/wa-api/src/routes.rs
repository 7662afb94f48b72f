//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{routing::get, Router};

use crate::handlers::{
    auth, contact_messages, health, logout, send_message, senders_today, status, todays_messages,
};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Session lifecycle
        .route("/auth", get(auth))
        .route("/logout", get(logout))
        .route("/status", get(status))
        // Messaging
        .route("/send-message", get(send_message))
        // Day queries
        .route("/get-mess", get(contact_messages))
        .route("/get-senders-today", get(senders_today))
        .route("/get-todays-messages", get(todays_messages))
}
