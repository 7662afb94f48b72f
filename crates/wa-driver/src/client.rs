//! Bridge-backed WhatsApp client
//!
//! Implements the core client capability on top of the Node.js bridge.
//! Commands are written as JSON lines and correlated with replies by
//! request id; unsolicited lines become lifecycle events on the
//! session layer's channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStdout;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wa_core::{ClientEvent, Conversation, EventSender, RawMessage, WebClient};

use crate::config::BridgeConfig;
use crate::error::{DriverError, Result};
use crate::process::BridgeProcess;
use crate::protocol::{BridgeCommand, BridgeMessage, ResolvedIdentity};

/// Reply to one in-flight request
#[derive(Debug)]
struct Reply {
    ok: bool,
    error: Option<String>,
    data: Option<Value>,
}

type PendingMap = Arc<DashMap<String, oneshot::Sender<Reply>>>;

/// One live bridge process driving one WhatsApp Web client
pub struct BridgeClient {
    process: BridgeProcess,
    pending: PendingMap,
    request_timeout: Duration,
}

impl BridgeClient {
    /// Spawn the bridge and wire its stdout into `events`
    pub async fn launch(config: &BridgeConfig, events: EventSender) -> Result<Self> {
        let (process, stdout) = BridgeProcess::spawn(config).await?;
        let pending: PendingMap = Arc::new(DashMap::new());

        tokio::spawn(read_bridge_output(stdout, Arc::clone(&pending), events));

        Ok(Self {
            process,
            pending,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn request(&self, command: BridgeCommand) -> Result<Option<Value>> {
        self.request_bounded(command, self.request_timeout).await
    }

    async fn request_bounded(
        &self,
        command: BridgeCommand,
        timeout: Duration,
    ) -> Result<Option<Value>> {
        let id = command.id().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        if let Err(e) = self.process.write_command(&command).await {
            self.pending.remove(&id);
            return Err(e);
        }

        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                return Err(DriverError::Exited(format!(
                    "closed before replying to {}",
                    command.name()
                )));
            }
            Err(_) => {
                self.pending.remove(&id);
                return Err(DriverError::Timeout(command.name().to_string()));
            }
        };

        if reply.ok {
            Ok(reply.data)
        } else {
            Err(DriverError::Bridge(
                reply
                    .error
                    .unwrap_or_else(|| "Unknown bridge error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl WebClient for BridgeClient {
    async fn start(&self) -> wa_core::Result<()> {
        self.request(BridgeCommand::Start { id: request_id() })
            .await?;
        Ok(())
    }

    async fn destroy(&self) -> wa_core::Result<()> {
        self.request(BridgeCommand::Destroy { id: request_id() })
            .await?;
        // The bridge exits on its own once the client is destroyed.
        self.process.wait_or_kill(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn force_close(&self) -> wa_core::Result<()> {
        // Ask the bridge to close its browser first so Chromium does
        // not outlive the node process, then take the process down.
        let command = BridgeCommand::ForceClose { id: request_id() };
        if let Err(e) = self.request_bounded(command, Duration::from_secs(3)).await {
            warn!(error = %e, "Bridge did not acknowledge force close");
        }
        self.process.shutdown().await;
        Ok(())
    }

    async fn resolve_identity(&self, number: &str) -> wa_core::Result<Option<String>> {
        let data = self
            .request(BridgeCommand::ResolveIdentity {
                id: request_id(),
                number: number.to_string(),
            })
            .await?;
        let resolved: ResolvedIdentity = decode(data)?;
        Ok(resolved.chat_id)
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> wa_core::Result<()> {
        self.request(BridgeCommand::SendMessage {
            id: request_id(),
            chat_id: chat_id.to_string(),
            body: body.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn list_conversations(&self) -> wa_core::Result<Vec<Conversation>> {
        let data = self
            .request(BridgeCommand::ListConversations { id: request_id() })
            .await?;
        Ok(decode(data)?)
    }

    async fn fetch_history(
        &self,
        chat_id: &str,
        limit: Option<usize>,
    ) -> wa_core::Result<Vec<RawMessage>> {
        let data = self
            .request(BridgeCommand::FetchHistory {
                id: request_id(),
                chat_id: chat_id.to_string(),
                limit,
            })
            .await?;
        Ok(decode(data)?)
    }
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

fn decode<T: serde::de::DeserializeOwned>(data: Option<Value>) -> Result<T> {
    let value = data.ok_or_else(|| DriverError::Protocol("Missing reply data".to_string()))?;
    serde_json::from_value(value)
        .map_err(|e| DriverError::Protocol(format!("Bad reply data: {}", e)))
}

/// Consume bridge stdout until EOF, routing replies to their waiters
/// and events to the session layer. On EOF every in-flight request is
/// failed and the session layer is told the client is gone.
async fn read_bridge_output(stdout: ChildStdout, pending: PendingMap, events: EventSender) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BridgeMessage>(&line) {
            Ok(message) => route_message(message, &pending, &events),
            Err(e) => warn!(error = %e, line = %line, "Unparseable bridge line"),
        }
    }

    debug!("Bridge stdout closed");
    pending.clear();
    forward(&events, ClientEvent::Error("Bridge process exited".to_string()));
}

fn route_message(message: BridgeMessage, pending: &PendingMap, events: &EventSender) {
    match message {
        BridgeMessage::Result { id, ok, error, data } => match pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(Reply { ok, error, data });
            }
            None => warn!(id = %id, "Reply for unknown request"),
        },
        BridgeMessage::Qr { payload } => forward(events, ClientEvent::Qr(payload)),
        BridgeMessage::Authenticated => forward(events, ClientEvent::Authenticated),
        BridgeMessage::Ready => forward(events, ClientEvent::Ready),
        BridgeMessage::AuthFailure { reason } => {
            forward(events, ClientEvent::AuthFailure(reason))
        }
        BridgeMessage::Disconnected { reason } => {
            forward(events, ClientEvent::Disconnected(reason))
        }
        BridgeMessage::Message { message } => {
            forward(events, ClientEvent::MessageReceived(message))
        }
        BridgeMessage::Error { detail } => forward(events, ClientEvent::Error(detail)),
        BridgeMessage::Log { level, text } => match level.as_str() {
            "debug" => debug!(target: "wa_bridge", "{}", text),
            "warn" => warn!(target: "wa_bridge", "{}", text),
            "error" => error!(target: "wa_bridge", "{}", text),
            _ => info!(target: "wa_bridge", "{}", text),
        },
    }
}

fn forward(events: &EventSender, event: ClientEvent) {
    if events.send(event).is_err() {
        debug!("Event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn pending_map() -> PendingMap {
        Arc::new(DashMap::new())
    }

    #[tokio::test]
    async fn test_result_resolves_pending_request() {
        let pending = pending_map();
        let (events, _rx) = mpsc::unbounded_channel();
        let (tx, rx) = oneshot::channel();
        pending.insert("req-1".to_string(), tx);

        route_message(
            BridgeMessage::Result {
                id: "req-1".to_string(),
                ok: true,
                error: None,
                data: Some(serde_json::json!({"chatId": "1@c.us"})),
            },
            &pending,
            &events,
        );

        let reply = rx.await.unwrap();
        assert!(reply.ok);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_result_for_unknown_request_is_ignored() {
        let pending = pending_map();
        let (events, _rx) = mpsc::unbounded_channel();

        route_message(
            BridgeMessage::Result {
                id: "ghost".to_string(),
                ok: true,
                error: None,
                data: None,
            },
            &pending,
            &events,
        );

        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_forwarded_in_order() {
        let pending = pending_map();
        let (events, mut rx) = mpsc::unbounded_channel();

        route_message(
            BridgeMessage::Qr {
                payload: "qr-data".to_string(),
            },
            &pending,
            &events,
        );
        route_message(BridgeMessage::Authenticated, &pending, &events);
        route_message(
            BridgeMessage::Disconnected {
                reason: "LOGOUT".to_string(),
            },
            &pending,
            &events,
        );

        assert!(matches!(rx.recv().await, Some(ClientEvent::Qr(payload)) if payload == "qr-data"));
        assert!(matches!(rx.recv().await, Some(ClientEvent::Authenticated)));
        assert!(
            matches!(rx.recv().await, Some(ClientEvent::Disconnected(reason)) if reason == "LOGOUT")
        );
    }

    #[tokio::test]
    async fn test_inbound_message_becomes_event() {
        let pending = pending_map();
        let (events, mut rx) = mpsc::unbounded_channel();
        let json = r#"{"type":"message","message":{"from":"1@c.us","body":"hi","timestamp":7,"fromMe":false}}"#;
        let message: BridgeMessage = serde_json::from_str(json).unwrap();

        route_message(message, &pending, &events);

        match rx.recv().await {
            Some(ClientEvent::MessageReceived(message)) => {
                assert_eq!(message.body, "hi");
                assert_eq!(message.timestamp, 7);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_data_is_a_protocol_error() {
        let result: Result<ResolvedIdentity> = decode(None);
        assert!(matches!(result, Err(DriverError::Protocol(_))));
    }
}
