//! MQTT connection adapter for the gateway bridge
//!
//! This module separates pure functions from I/O operations for better
//! testability.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state management and configuration
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`health_monitor`] - Pure reconnection decisions and state transitions
//! - [`client`] - Impure I/O: the event driver task and single-shot publishes
//!
//! # Usage
//!
//! ```rust,no_run
//! use gateway_bridge::config::BridgeConfig;
//! use gateway_bridge::transport::mqtt::{MqttAdapter, ReconnectConfig};
//! use gateway_bridge::transport::BrokerAdapter;
//!
//! # tokio_test::block_on(async {
//! let config = BridgeConfig::from_toml_str(
//!     "[mqtt]\nbroker_url = \"mqtt://localhost:1883\"\ntopic_prefix = \"home\"\n",
//! )?;
//!
//! let mut adapter = MqttAdapter::new(config.mqtt, ReconnectConfig::default(), 64)?;
//! adapter.connect().await?;
//! adapter.subscribe("home/+/+/W/+").await?;
//! adapter.publish_once("home/lighting/lamp1/R/brightness", b"50").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

// Re-export public types for convenience
pub use client::MqttAdapter;
pub use connection::{BrokerAddress, ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
