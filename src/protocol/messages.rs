//! Task records exchanged between the bridge and the rest of the gateway
//!
//! Outbound tasks are produced by gateway components that want something
//! published to the broker. Inbound commands are produced by the bridge when a
//! broker message arrives on a subscribed topic.

use serde::{Deserialize, Serialize};

/// QoS level stamped on every inbound command
pub const INBOUND_QOS: u8 = 1;

/// Queue operation requested by a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMethod {
    /// Publish to the broker (outbound)
    Publish,
    /// Message received on a subscription (inbound)
    Subscribe,
    /// Any method name the bridge does not act on
    #[serde(other)]
    Unknown,
}

/// A request from the gateway to publish something on the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundTask {
    pub method: TaskMethod,
    pub family: String,
    pub device_id: String,
    pub param: String,
    #[serde(default)]
    pub payload: String,
}

impl OutboundTask {
    /// Build a `publish` task
    pub fn publish<F, D, P, V>(family: F, device_id: D, param: P, payload: V) -> Self
    where
        F: Into<String>,
        D: Into<String>,
        P: Into<String>,
        V: Into<String>,
    {
        Self {
            method: TaskMethod::Publish,
            family: family.into(),
            device_id: device_id.into(),
            param: param.into(),
            payload: payload.into(),
        }
    }

    /// Whether the bridge should forward this task to the broker
    pub fn is_publish(&self) -> bool {
        self.method == TaskMethod::Publish
    }
}

/// A broker message translated into a gateway command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
    pub method: TaskMethod,
    /// Topic exactly as received from the broker
    pub topic: String,
    pub family: String,
    pub device_id: String,
    pub param: String,
    pub payload: String,
    pub qos: u8,
}
