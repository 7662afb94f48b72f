//! Session lifecycle management
//!
//! A single `SessionManager` owns at most one live client handle at a
//! time. Lifecycle requests (`initialize`, `logout`) are serialized
//! through a single-slot gate and rejected with a busy result when one
//! is already in flight; data commands (`send_message`,
//! `query_messages`) share a read lock so they drain before the next
//! lifecycle operation touches the handle. Asynchronous client events
//! arrive on a channel and are folded into the state machine by a pump
//! task; events from a replaced handle carry a stale generation and are
//! dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{ClientEvent, EventReceiver, WebClient, WebClientFactory};
use crate::config::SessionConfig;
use crate::result::{
    AuthStatus, CommandResult, ContactHistory, ContactsPayload, FormattedMessage, MessagesPayload,
    QueryPayload, SendersPayload,
};
use crate::session::SessionStorage;
use crate::{Error, Result};

/// History window for the per-contact breakdown
const PER_CONTACT_HISTORY_LIMIT: usize = 5000;

/// Lifecycle phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No client handle exists
    Uninitialized,
    /// A client is starting up
    Initializing,
    /// A QR code is waiting to be scanned
    AwaitingScan,
    /// Session paired and usable
    Authenticated,
    /// Client reported a failure or disconnect; handle still held
    Degraded,
    /// Being torn down; resets to `Uninitialized` once cleanup finishes
    Destroyed,
}

/// Shape of a day-message query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Messages exchanged with one number
    Contact(String),
    /// Unique senders across all conversations
    Senders,
    /// Per-contact breakdown across all conversations
    PerContact,
}

/// Everything the lifecycle owns, guarded by one lock
struct SessionSlot {
    client: Option<Box<dyn WebClient>>,
    state: SessionState,
    qr_code: Option<String>,
    /// Id of the live handle; events tagged with an older one are stale
    generation: u64,
    pump: Option<JoinHandle<()>>,
}

impl SessionSlot {
    fn abort_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    /// Client handle, only available while authenticated
    fn authenticated_client(&self) -> Result<&dyn WebClient> {
        if self.state != SessionState::Authenticated {
            return Err(Error::NotAuthenticated);
        }
        self.client.as_deref().ok_or(Error::NotAuthenticated)
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            client: None,
            state: SessionState::Uninitialized,
            qr_code: None,
            generation: 0,
            pump: None,
        }
    }
}

/// State shared with the event pump task
struct Shared {
    storage: SessionStorage,
    session: RwLock<SessionSlot>,
    /// Mirror of "state == Authenticated" so `status()` never locks
    authenticated: std::sync::atomic::AtomicBool,
}

/// Manages the lifecycle of the single WhatsApp Web session
pub struct SessionManager {
    factory: Box<dyn WebClientFactory>,
    shared: Arc<Shared>,
    /// Single-slot gate serializing initialize/logout
    lifecycle: Mutex<()>,
    logout_timeout: Duration,
}

impl SessionManager {
    pub fn new(factory: Box<dyn WebClientFactory>, config: SessionConfig) -> Self {
        Self {
            factory,
            shared: Arc::new(Shared {
                storage: SessionStorage::new(config.storage_path),
                session: RwLock::new(SessionSlot::default()),
                authenticated: std::sync::atomic::AtomicBool::new(false),
            }),
            lifecycle: Mutex::new(()),
            logout_timeout: Duration::from_secs(config.logout_timeout_secs),
        }
    }

    /// Start a fresh session, replacing any existing one.
    ///
    /// Success means the startup sequence launched; pairing completes
    /// later and is observed through `status()`. A concurrent
    /// `initialize` or `logout` yields a busy failure instead of
    /// queueing.
    pub async fn initialize(&self) -> CommandResult {
        let _gate = match self.lifecycle.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                warn!("Rejecting initialize: another lifecycle operation is in flight");
                return CommandResult::from_error(&Error::Busy);
            }
        };

        match self.start_session().await {
            Ok(()) => CommandResult::ok_with_message(
                "WhatsApp client initialized. Check console for QR code.",
            ),
            Err(e) => {
                error!(error = %e, "Initialization failed");
                CommandResult::from_error(&e)
            }
        }
    }

    async fn start_session(&self) -> Result<()> {
        let mut slot = self.shared.session.write().await;

        slot.abort_pump();
        let previous = slot.client.take();
        if let Some(client) = previous.as_deref() {
            if let Err(e) = client.destroy().await {
                warn!(error = %e, "Failed to destroy previous client");
            }
        }

        slot.state = SessionState::Initializing;
        slot.qr_code = None;
        slot.generation += 1;
        self.shared
            .authenticated
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // The previous browser may still hold credential files locked,
        // so it stays the force-close target during this clear.
        if let Err(e) = self.shared.storage.clear(previous.as_deref()).await {
            warn!(error = %e, "Error during session cleanup");
        }
        drop(previous);

        let (events, receiver) = mpsc::unbounded_channel();
        let client = match self.factory.create(events).await {
            Ok(client) => client,
            Err(e) => {
                slot.state = SessionState::Uninitialized;
                return Err(Error::Initialization(e.to_string()));
            }
        };

        let generation = slot.generation;
        slot.pump = Some(spawn_event_pump(
            Arc::clone(&self.shared),
            receiver,
            generation,
        ));

        if let Err(e) = client.start().await {
            slot.abort_pump();
            slot.state = SessionState::Uninitialized;
            if let Err(cleanup_err) = self.shared.storage.clear(Some(client.as_ref())).await {
                warn!(error = %cleanup_err, "Error during session cleanup");
            }
            return Err(Error::Initialization(e.to_string()));
        }

        slot.client = Some(client);
        info!("WhatsApp client starting, waiting for QR scan");
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Graceful sign-out is bounded by the configured timeout; on
    /// timeout or error the browser process is force-closed. Storage is
    /// cleared and the authenticated flag dropped on every path,
    /// including when no session exists (idempotent).
    pub async fn logout(&self) -> CommandResult {
        let _gate = match self.lifecycle.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                warn!("Rejecting logout: another lifecycle operation is in flight");
                return CommandResult::from_error(&Error::Busy);
            }
        };

        let mut slot = self.shared.session.write().await;
        slot.abort_pump();
        let client = slot.client.take();
        let had_session = client.is_some();

        if let Some(client) = client.as_deref() {
            match tokio::time::timeout(self.logout_timeout, client.destroy()).await {
                Ok(Ok(())) => debug!("Client destroyed gracefully"),
                Ok(Err(e)) => {
                    error!(error = %e, "Logout error");
                    if let Err(close_err) = client.force_close().await {
                        warn!(error = %close_err, "Force close failed");
                    }
                }
                Err(_) => {
                    error!(
                        timeout_secs = self.logout_timeout.as_secs(),
                        "Destroy timed out, force-closing browser"
                    );
                    if let Err(close_err) = client.force_close().await {
                        warn!(error = %close_err, "Force close failed");
                    }
                }
            }
        }

        // Nothing below may be skipped, whatever happened above.
        if slot.state != SessionState::Uninitialized {
            slot.state = SessionState::Destroyed;
        }
        slot.qr_code = None;
        slot.generation += 1;
        self.shared
            .authenticated
            .store(false, std::sync::atomic::Ordering::SeqCst);

        if let Err(e) = self.shared.storage.clear(client.as_deref()).await {
            warn!(error = %e, "Error during session cleanup");
        }
        drop(client);
        slot.state = SessionState::Uninitialized;

        if had_session {
            info!("Logged out successfully");
            CommandResult::ok_with_message("Logged out successfully")
        } else {
            debug!("Logout requested with no active session");
            CommandResult::ok_with_message("No active session")
        }
    }

    /// Current authentication status. Never blocks, never fails.
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            authenticated: self
                .shared
                .authenticated
                .load(std::sync::atomic::Ordering::SeqCst),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.shared.session.read().await.state
    }

    /// Latest QR payload while a scan is pending
    pub async fn qr_code(&self) -> Option<String> {
        self.shared.session.read().await.qr_code.clone()
    }

    /// Send a text message to a phone number.
    ///
    /// Fails fast when the session is not authenticated; the client is
    /// never touched in that case.
    pub async fn send_message(&self, number: &str, body: &str) -> CommandResult {
        match self.try_send(number, body).await {
            Ok(()) => {
                info!(number = %number, "Message sent");
                CommandResult::ok_with_message("Message sent successfully")
            }
            Err(e) => {
                error!(error = %e, "Error sending message");
                CommandResult::from_error(&e)
            }
        }
    }

    async fn try_send(&self, number: &str, body: &str) -> Result<()> {
        let slot = self.shared.session.read().await;
        let client = slot.authenticated_client()?;

        let chat_id = client
            .resolve_identity(number)
            .await?
            .ok_or_else(|| Error::RecipientNotFound(number.to_string()))?;

        client.send_message(&chat_id, body).await
    }

    /// Fetch messages with `timestamp >= since`, shaped per `scope`.
    ///
    /// Walks conversations sequentially, so cost is linear in
    /// conversation count times history length.
    pub async fn query_messages(&self, scope: QueryScope, since: i64) -> CommandResult<QueryPayload> {
        match self.try_query(&scope, since).await {
            Ok(payload) => CommandResult::ok(payload),
            Err(e) => {
                error!(error = %e, scope = ?scope, "Error fetching messages");
                CommandResult::from_error(&e)
            }
        }
    }

    async fn try_query(&self, scope: &QueryScope, since: i64) -> Result<QueryPayload> {
        let slot = self.shared.session.read().await;
        let client = slot.authenticated_client()?;

        match scope {
            QueryScope::Contact(number) => {
                let chat_id = client
                    .resolve_identity(number)
                    .await?
                    .ok_or_else(|| Error::RecipientNotFound(number.clone()))?;

                let history = client.fetch_history(&chat_id, None).await?;
                let messages = history
                    .into_iter()
                    .filter(|m| m.timestamp >= since)
                    .enumerate()
                    .map(|(index, m)| FormattedMessage {
                        id: index + 1,
                        timestamp: m.timestamp,
                        from: Some(if m.from_me {
                            "Me".to_string()
                        } else {
                            chat_id.clone()
                        }),
                        body: m.body,
                    })
                    .collect();

                Ok(QueryPayload::Messages(MessagesPayload { messages }))
            }
            QueryScope::Senders => {
                let conversations = client.list_conversations().await?;
                let mut seen = HashSet::new();
                let mut senders = Vec::new();

                for conversation in &conversations {
                    let history = client.fetch_history(&conversation.id, None).await?;
                    for message in history {
                        if message.timestamp < since || message.from_me {
                            continue;
                        }
                        let sender = message.sender_number();
                        if seen.insert(sender.clone()) {
                            senders.push(sender);
                        }
                    }
                }

                Ok(QueryPayload::Senders(SendersPayload { senders }))
            }
            QueryScope::PerContact => {
                let conversations = client.list_conversations().await?;
                let mut contacts = Vec::new();

                for conversation in &conversations {
                    let history = client
                        .fetch_history(&conversation.id, Some(PER_CONTACT_HISTORY_LIMIT))
                        .await?;
                    let messages: Vec<FormattedMessage> = history
                        .into_iter()
                        .filter(|m| m.timestamp >= since)
                        .enumerate()
                        .map(|(index, m)| FormattedMessage {
                            id: index + 1,
                            timestamp: m.timestamp,
                            from: None,
                            body: m.body,
                        })
                        .collect();

                    if !messages.is_empty() {
                        contacts.push(ContactHistory {
                            from: conversation.contact_number(),
                            messages,
                        });
                    }
                }

                Ok(QueryPayload::Contacts(ContactsPayload { contacts }))
            }
        }
    }
}

/// Unix timestamp of the local midnight starting the current day
pub fn day_start_timestamp() -> i64 {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|start| start.timestamp())
        .unwrap_or_else(|| now.timestamp())
}

fn spawn_event_pump(shared: Arc<Shared>, mut events: EventReceiver, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            handle_event(&shared, generation, event).await;
        }
        debug!(generation, "Event channel closed");
    })
}

/// Fold one client event into the state machine. Idempotent; cheap
/// enough to run inline, with storage cleanup dispatched to its own
/// task so event delivery is never stalled.
async fn handle_event(shared: &Arc<Shared>, generation: u64, event: ClientEvent) {
    let mut slot = shared.session.write().await;
    if slot.generation != generation {
        debug!(generation, "Dropping event from a replaced session");
        return;
    }

    match event {
        ClientEvent::Qr(payload) => {
            // The log line is the operator's pairing surface; the raw
            // payload must be in it, not just stored.
            info!(qr = %payload, "QR code received, scan with WhatsApp");
            slot.state = SessionState::AwaitingScan;
            slot.qr_code = Some(payload);
            // A QR while authenticated means the session must be
            // re-paired before it is usable again.
            shared
                .authenticated
                .store(false, std::sync::atomic::Ordering::SeqCst);
        }
        ClientEvent::Authenticated => {
            info!("Authentication successful");
            slot.state = SessionState::Authenticated;
            slot.qr_code = None;
            shared
                .authenticated
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
        ClientEvent::Ready => {
            info!("Client is ready");
        }
        ClientEvent::AuthFailure(reason) => {
            error!(reason = %reason, "Authentication failure");
            slot.state = SessionState::Degraded;
            shared
                .authenticated
                .store(false, std::sync::atomic::Ordering::SeqCst);
            dispatch_cleanup(shared);
        }
        ClientEvent::Disconnected(reason) => {
            warn!(reason = %reason, "Client disconnected");
            slot.state = SessionState::Degraded;
            shared
                .authenticated
                .store(false, std::sync::atomic::Ordering::SeqCst);
            // Storage stays intact so a later initialize can resume
            // the session without a new scan.
        }
        ClientEvent::MessageReceived(message) => {
            debug!(from = %message.from, timestamp = message.timestamp, "Received message");
        }
        ClientEvent::Error(detail) => {
            error!(detail = %detail, "WhatsApp client error");
            slot.state = SessionState::Degraded;
            shared
                .authenticated
                .store(false, std::sync::atomic::Ordering::SeqCst);
            dispatch_cleanup(shared);
        }
    }
}

fn dispatch_cleanup(shared: &Arc<Shared>) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let slot = shared.session.read().await;
        if let Err(e) = shared.storage.clear(slot.client.as_deref()).await {
            warn!(error = %e, "Error during session cleanup");
        }
    });
}
