//! Gateway bridge
//!
//! Connects a home-automation gateway's internal task queues to an MQTT
//! broker. Tasks the gateway wants published are sent to
//! `<prefix>/<family>/<deviceId>/R/<param>`; messages arriving on
//! `<prefix>/+/+/W/+` are turned into commands for the gateway.
//!
//! # Overview
//!
//! - [`protocol`] - task records and topic encoding/decoding
//! - [`transport`] - broker adapter trait and its rumqttc implementation
//! - [`bridge`] - queues, the bridge loop and its lifecycle
//! - [`host`] - JSON-lines pipe used by the binary
//! - [`config`], [`error`], [`observability`] - configuration, errors, logging
//!
//! # Quick Start
//!
//! ```rust
//! use gateway_bridge::protocol::{OutboundTask, TopicCodec};
//!
//! let codec = TopicCodec::new("home");
//!
//! let task = OutboundTask::publish("lighting", "lamp1", "brightness", "50");
//! assert_eq!(codec.encode(&task), "home/lighting/lamp1/R/brightness");
//!
//! let command = codec.decode("home/lighting/lamp1/W/brightness", b"80").unwrap();
//! assert_eq!(command.device_id, "lamp1");
//! assert_eq!(command.payload, "80");
//! assert_eq!(codec.subscription_pattern(), "home/+/+/W/+");
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use bridge::{BridgeHandle, BridgeService, BridgeStats};
pub use config::*;
pub use error::{BridgeError, BridgeResult};
pub use protocol::*;
pub use transport::mqtt::MqttAdapter;
