//! Delivery channels: how messages reach Switchyard and how results leave it.
//!
//! A [`DeliveryChannel`] both listens for inbound messages, handing each to
//! a [`MessageHandler`], and delivers outbound payloads to [`Target`]s that
//! name its protocol. The dispatcher implements [`MessageHandler`] and keeps
//! one channel per protocol identifier.

pub mod error;
pub mod grpc;
pub mod http;
pub mod mqtt;

use async_trait::async_trait;
use std::sync::Arc;
use switchyard_types::{DispatchContext, DispatchResult, Message, Target};
use tokio_util::sync::CancellationToken;

pub use error::ChannelError;
pub use grpc::{GrpcChannel, GrpcChannelConfig};
pub use http::{HttpChannel, HttpChannelConfig};
pub use mqtt::{MqttChannel, MqttChannelConfig};

/// Processes one inbound message. Never fails: problems are reported in the
/// returned result.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message, ctx: DispatchContext) -> DispatchResult;
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Protocol identifier matched against [`Target::protocol`].
    fn name(&self) -> &str;

    /// Accepts inbound messages until `shutdown` is cancelled.
    async fn listen(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ChannelError>;

    /// Delivers `payload` (a JSON-encoded result) to `target`.
    async fn send(&self, target: &Target, payload: &[u8]) -> Result<(), ChannelError>;

    async fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
