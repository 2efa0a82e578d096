//! Bus trait definitions

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// An inbound message delivered by the bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Bytes,
}

/// Publish/subscribe bus the engine talks to
///
/// The production implementation is [`MqttBus`](crate::MqttBus); tests run
/// the engine against an in-process mock.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Subscribe to a topic pattern
    async fn subscribe(&self, pattern: &str, qos: u8) -> Result<()>;

    /// Publish a payload
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<()>;

    /// Receive the next inbound message
    ///
    /// Returns `None` once the bus connection is gone for good.
    async fn next_message(&self) -> Option<BusMessage>;

    /// Disconnect from the bus
    async fn disconnect(&self);
}
