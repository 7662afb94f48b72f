//! Bridge wire protocol
//!
//! Defines the JSON-lines message format spoken with the Node.js
//! bridge over stdin/stdout. Every command carries a request id; the
//! bridge answers each with one `result` line and pushes lifecycle
//! events as unsolicited lines in between.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wa_core::RawMessage;

/// Command written to the bridge's stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Launch the WhatsApp client and begin pairing
    Start { id: String },

    /// Gracefully destroy the client
    Destroy { id: String },

    /// Close the browser process without waiting for a clean shutdown
    ForceClose { id: String },

    /// Look up the canonical chat id of a phone number
    ResolveIdentity { id: String, number: String },

    SendMessage {
        id: String,
        chat_id: String,
        body: String,
    },

    ListConversations { id: String },

    FetchHistory {
        id: String,
        chat_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

impl BridgeCommand {
    /// Request id this command carries
    pub fn id(&self) -> &str {
        match self {
            Self::Start { id }
            | Self::Destroy { id }
            | Self::ForceClose { id }
            | Self::ResolveIdentity { id, .. }
            | Self::SendMessage { id, .. }
            | Self::ListConversations { id }
            | Self::FetchHistory { id, .. } => id,
        }
    }

    /// Short name used in logs and timeout errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Destroy { .. } => "destroy",
            Self::ForceClose { .. } => "force_close",
            Self::ResolveIdentity { .. } => "resolve_identity",
            Self::SendMessage { .. } => "send_message",
            Self::ListConversations { .. } => "list_conversations",
            Self::FetchHistory { .. } => "fetch_history",
        }
    }
}

/// Line read from the bridge's stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Reply to a command
    Result {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },

    /// QR code ready to scan
    Qr { payload: String },

    /// Pairing completed
    Authenticated,

    /// Client synced and ready
    Ready,

    /// Pairing rejected
    AuthFailure { reason: String },

    /// Connection to the network dropped
    Disconnected { reason: String },

    /// Inbound message observed
    Message { message: RawMessage },

    /// Unrecoverable client error
    Error { detail: String },

    /// Bridge-side log line forwarded into our logging
    Log { level: String, text: String },
}

/// Reply payload of a successful `resolve_identity`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    /// Canonical chat id, absent when the number is not registered
    #[serde(default)]
    pub chat_id: Option<String>,
}
