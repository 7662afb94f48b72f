//! wa-core: WhatsApp Gateway Core Library
//!
//! WhatsApp Webセッションのライフサイクル管理、コマンドファサード、
//! セッションストレージのコア機能を提供します。

pub mod client;
pub mod config;
pub mod error;
pub mod result;
pub mod session;

pub use client::{
    ClientEvent, Conversation, EventReceiver, EventSender, RawMessage, WebClient, WebClientFactory,
};
pub use config::{ApiConfig, Config, SessionConfig};
pub use error::{Error, Result};
pub use result::{
    AuthStatus, CommandResult, ContactHistory, ContactsPayload, FormattedMessage, MessagesPayload,
    QueryPayload, SendersPayload,
};
pub use session::{day_start_timestamp, QueryScope, SessionManager, SessionState, SessionStorage};
