//! wa-driver: WhatsApp Web.jsブリッジドライバ
//!
//! Node.jsブリッジプロセスを起動し、JSON linesプロトコルで
//! whatsapp-web.jsクライアントを操作します。

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod process;
pub mod protocol;

pub use client::BridgeClient;
pub use config::BridgeConfig;
pub use error::{DriverError, Result};
pub use factory::BridgeClientFactory;
pub use process::BridgeProcess;
pub use protocol::{BridgeCommand, BridgeMessage};
