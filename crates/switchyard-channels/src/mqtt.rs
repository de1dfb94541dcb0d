//! MQTT channel placeholder.
//!
//! Holds its broker settings and satisfies the channel contract without a
//! network binding: it idles until shutdown and refuses outbound delivery.

use crate::error::ChannelError;
use crate::{DeliveryChannel, MessageHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchyard_types::Target;
use tokio_util::sync::CancellationToken;

fn default_broker() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_topic() -> String {
    "switchyard/#".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for MqttChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: default_broker(),
            topic: default_topic(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MqttChannel {
    config: MqttChannelConfig,
}

impl MqttChannel {
    pub fn new(config: MqttChannelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeliveryChannel for MqttChannel {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn listen(
        &self,
        _handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ChannelError> {
        tracing::info!(
            broker = %self.config.broker,
            topic = %self.config.topic,
            "mqtt channel idle: no broker client, waiting for shutdown"
        );
        shutdown.cancelled().await;
        Ok(())
    }

    async fn send(&self, target: &Target, payload: &[u8]) -> Result<(), ChannelError> {
        tracing::debug!(
            target = %target.service_name,
            endpoint = %target.endpoint,
            bytes = payload.len(),
            "mqtt delivery unsupported"
        );
        Err(ChannelError::Unsupported(self.name().to_string()))
    }
}
