//! Session lifecycle module
//!
//! Owns the single WhatsApp Web session: its on-disk credential
//! storage, its lifecycle state machine, and the command façade the
//! HTTP layer calls.

mod manager;
mod storage;

pub use manager::{day_start_timestamp, QueryScope, SessionManager, SessionState};
pub use storage::SessionStorage;
