//! Broker connection layer
//!
//! This module provides the adapter abstraction the bridge loop talks to and
//! its MQTT implementation.

use bytes::Bytes;

pub mod mqtt;

pub use mqtt::ConnectionState;

/// Broker activity surfaced to the bridge loop by [`BrokerAdapter::pump_events`]
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// Broker accepted the connection
    Connected,
    /// A connection attempt failed; the adapter retries on its own
    ConnectFailed { reason: String },
    /// An established connection was lost unexpectedly; a reconnect is scheduled
    Disconnected { reason: String },
    /// Broker acknowledged a QoS 1 publish
    PublishAcknowledged { packet_id: u16 },
    /// Message arrived on a subscribed topic
    MessageReceived { topic: String, payload: Bytes },
}

/// Connection adapter contract used by the bridge loop
///
/// One adapter owns exactly one logical broker connection. Event delivery is
/// pull-based so the loop's control flow stays linear and the adapter can be
/// replaced with a fake in tests.
#[async_trait::async_trait]
pub trait BrokerAdapter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start connecting to the broker; the outcome arrives as an event
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Tear down the connection
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter, kept across reconnects
    async fn subscribe(&mut self, pattern: &str) -> Result<(), Self::Error>;

    /// Publish one message independently of the long-lived connection
    async fn publish_once(&self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Return the broker events that are already available, without waiting
    async fn pump_events(&mut self) -> Vec<BrokerEvent>;

    /// Current state of the long-lived connection
    fn connection_state(&self) -> ConnectionState;
}
