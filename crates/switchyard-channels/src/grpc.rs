//! gRPC channel placeholder. Same contract as the MQTT placeholder.

use crate::error::ChannelError;
use crate::{DeliveryChannel, MessageHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchyard_types::Target;
use tokio_util::sync::CancellationToken;

fn default_port() -> u16 {
    50051
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpcChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GrpcChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrpcChannel {
    config: GrpcChannelConfig,
}

impl GrpcChannel {
    pub fn new(config: GrpcChannelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeliveryChannel for GrpcChannel {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn listen(
        &self,
        _handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ChannelError> {
        tracing::info!(
            port = self.config.port,
            "grpc channel idle: no server binding, waiting for shutdown"
        );
        shutdown.cancelled().await;
        Ok(())
    }

    async fn send(&self, target: &Target, _payload: &[u8]) -> Result<(), ChannelError> {
        tracing::debug!(target = %target.service_name, "grpc delivery unsupported");
        Err(ChannelError::Unsupported(self.name().to_string()))
    }
}
