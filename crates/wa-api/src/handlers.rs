//! HTTP API handlers
//!
//! Request handlers for session lifecycle and messaging. Every
//! response except `/status` and `/health` is a command result
//! envelope; the session layer decides the outcome and handlers only
//! pick status codes: 200 on success, 400 on missing query
//! parameters, 500 when a command fails.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use wa_core::{day_start_timestamp, AuthStatus, CommandResult, QueryPayload, QueryScope};

use crate::server::AppState;

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageParams {
    pub number: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactParams {
    pub number: Option<String>,
}

fn envelope_status<T>(result: &CommandResult<T>) -> StatusCode {
    if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Treat an absent or empty query value the same way
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Start session initialization; pairing completes asynchronously
pub async fn auth(State(state): State<AppState>) -> (StatusCode, Json<CommandResult>) {
    info!("Authentication requested");
    let result = state.manager.initialize().await;
    (envelope_status(&result), Json(result))
}

/// Tear the session down
pub async fn logout(State(state): State<AppState>) -> (StatusCode, Json<CommandResult>) {
    info!("Logout requested");
    let result = state.manager.logout().await;
    (envelope_status(&result), Json(result))
}

/// Current authentication status
pub async fn status(State(state): State<AppState>) -> Json<AuthStatus> {
    Json(state.manager.status())
}

/// Send a text message to a number
pub async fn send_message(
    State(state): State<AppState>,
    Query(params): Query<SendMessageParams>,
) -> (StatusCode, Json<CommandResult>) {
    let (Some(number), Some(message)) = (present(params.number), present(params.message)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CommandResult::fail("Number and message are required")),
        );
    };

    debug!(number = %number, "Send message requested");
    let result = state.manager.send_message(&number, &message).await;
    (envelope_status(&result), Json(result))
}

/// Today's messages exchanged with one contact
pub async fn contact_messages(
    State(state): State<AppState>,
    Query(params): Query<ContactParams>,
) -> (StatusCode, Json<CommandResult<QueryPayload>>) {
    let Some(number) = present(params.number) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CommandResult::fail("Number is required")),
        );
    };

    let result = state
        .manager
        .query_messages(QueryScope::Contact(number), day_start_timestamp())
        .await;
    (envelope_status(&result), Json(result))
}

/// Unique senders seen today across all conversations
pub async fn senders_today(
    State(state): State<AppState>,
) -> (StatusCode, Json<CommandResult<QueryPayload>>) {
    let result = state
        .manager
        .query_messages(QueryScope::Senders, day_start_timestamp())
        .await;
    (envelope_status(&result), Json(result))
}

/// Today's messages grouped per contact
pub async fn todays_messages(
    State(state): State<AppState>,
) -> (StatusCode, Json<CommandResult<QueryPayload>>) {
    let result = state
        .manager
        .query_messages(QueryScope::PerContact, day_start_timestamp())
        .await;
    (envelope_status(&result), Json(result))
}
