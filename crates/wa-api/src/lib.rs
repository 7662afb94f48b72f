//! wa-api: WhatsApp Gateway HTTP API Server
//!
//! REST API サーバー実装

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{start_server, AppState};
