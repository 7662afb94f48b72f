//! Client factory
//!
//! Each `create` call spawns a fresh bridge process, so the session
//! layer gets one process per client handle and a clean event stream
//! after every re-initialize.

use async_trait::async_trait;

use wa_core::{EventSender, WebClient, WebClientFactory};

use crate::client::BridgeClient;
use crate::config::BridgeConfig;

pub struct BridgeClientFactory {
    config: BridgeConfig,
}

impl BridgeClientFactory {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WebClientFactory for BridgeClientFactory {
    async fn create(&self, events: EventSender) -> wa_core::Result<Box<dyn WebClient>> {
        let client = BridgeClient::launch(&self.config, events).await?;
        Ok(Box::new(client))
    }
}
