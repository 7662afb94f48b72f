//! WhatsApp Web client capability
//!
//! The lifecycle layer drives the browser-automation client through this
//! trait without knowing how it is implemented. The production
//! implementation lives in wa-driver and proxies a Node.js bridge over
//! stdio; tests substitute scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;

/// A message as reported by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Chat-scoped sender id, e.g. `923001234567@c.us`
    pub from: String,
    /// Actual sender inside a group chat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// True when this account sent the message
    #[serde(default)]
    pub from_me: bool,
}

impl RawMessage {
    /// Sender id with the network suffix stripped
    pub fn sender_number(&self) -> String {
        let sender = self.author.as_deref().unwrap_or(&self.from);
        sender.trim_end_matches("@c.us").to_string()
    }
}

/// A conversation summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Chat id, e.g. `923001234567@c.us`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl Conversation {
    /// Bare contact id, without the network suffix. Works for direct
    /// chats (`@c.us`) and group chats (`@g.us`) alike.
    pub fn contact_number(&self) -> String {
        match self.id.split_once('@') {
            Some((user, _)) => user.to_string(),
            None => self.id.clone(),
        }
    }
}

/// Lifecycle events pushed by the client while a session is live.
///
/// Delivery must never block the client's own loop, so events travel over
/// an unbounded channel and the session layer drains them in its own task.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Pairing code ready to scan; payload is the raw QR data
    Qr(String),
    /// Pairing completed
    Authenticated,
    /// Client fully synced and accepting commands
    Ready,
    /// Pairing rejected
    AuthFailure(String),
    /// Connection to the network dropped
    Disconnected(String),
    /// Inbound message observed
    MessageReceived(RawMessage),
    /// Unrecoverable client error
    Error(String),
}

pub type EventSender = mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// Handle to one live WhatsApp Web client
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Launch the client and begin pairing. Resolves once startup is
    /// underway; authentication itself completes later via events.
    async fn start(&self) -> Result<()>;

    /// Gracefully shut the client down
    async fn destroy(&self) -> Result<()>;

    /// Force the underlying browser process closed, releasing any file
    /// locks it holds. Last resort when `destroy` hangs or storage
    /// cleanup hits locked files.
    async fn force_close(&self) -> Result<()>;

    /// Map a raw phone number to its canonical chat id, or `None` when
    /// the number is not registered on the network
    async fn resolve_identity(&self, number: &str) -> Result<Option<String>>;

    async fn send_message(&self, chat_id: &str, body: &str) -> Result<()>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Message history of one chat, oldest first. `limit` caps how far
    /// back the client reaches; `None` uses the client's default window.
    async fn fetch_history(&self, chat_id: &str, limit: Option<usize>) -> Result<Vec<RawMessage>>;
}

/// Builds clients wired to an event channel
#[async_trait]
pub trait WebClientFactory: Send + Sync {
    async fn create(&self, events: EventSender) -> Result<Box<dyn WebClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_number_prefers_author() {
        let message = RawMessage {
            from: "group-123@g.us".to_string(),
            author: Some("923001234567@c.us".to_string()),
            body: "hi".to_string(),
            timestamp: 1_700_000_000,
            from_me: false,
        };
        assert_eq!(message.sender_number(), "923001234567");
    }

    #[test]
    fn test_sender_number_falls_back_to_from() {
        let message = RawMessage {
            from: "923001234567@c.us".to_string(),
            author: None,
            body: "hi".to_string(),
            timestamp: 1_700_000_000,
            from_me: false,
        };
        assert_eq!(message.sender_number(), "923001234567");
    }

    #[test]
    fn test_message_deserializes_camel_case() {
        let json = r#"{"from":"1@c.us","body":"x","timestamp":5,"fromMe":true}"#;
        let message: RawMessage = serde_json::from_str(json).unwrap();
        assert!(message.from_me);
        assert!(message.author.is_none());
    }

    #[test]
    fn test_contact_number_strips_group_suffix_too() {
        let direct = Conversation {
            id: "923001234567@c.us".to_string(),
            name: None,
            is_group: false,
        };
        assert_eq!(direct.contact_number(), "923001234567");

        let group = Conversation {
            id: "1234567890-1612345678@g.us".to_string(),
            name: Some("Team".to_string()),
            is_group: true,
        };
        assert_eq!(group.contact_number(), "1234567890-1612345678");
    }
}
