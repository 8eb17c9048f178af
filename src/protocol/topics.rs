//! Topic encoding and decoding for the bridge
//!
//! Broker topics follow `<prefix>/<family>/<deviceId>/<direction>/<param>`.
//! The direction segment is `W` for commands written to the gateway and `R`
//! for values the gateway reports. It never appears in task records.

use crate::protocol::messages::{InboundCommand, OutboundTask, TaskMethod, INBOUND_QOS};
use thiserror::Error;

/// Direction marker for broker -> bridge traffic
pub const WRITE_DIRECTION: &str = "W";
/// Direction marker for bridge -> broker traffic
pub const READ_DIRECTION: &str = "R";

const MIN_SEGMENTS: usize = 4;

/// Topic translation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("Malformed topic '{topic}': {reason}")]
    Malformed { topic: String, reason: String },
    #[error("Payload on topic '{topic}' is not valid UTF-8")]
    InvalidPayload { topic: String },
}

impl TopicError {
    fn malformed(topic: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Maps task records to topic strings and back for a fixed prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCodec {
    prefix: String,
}

impl TopicCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wildcard subscription covering every write-direction topic
    pub fn subscription_pattern(&self) -> String {
        format!("{}/+/+/{WRITE_DIRECTION}/+", self.prefix)
    }

    /// Build the report topic for an outbound task.
    ///
    /// Fields are not validated: whatever the producer put in the task ends
    /// up in the topic.
    pub fn encode(&self, task: &OutboundTask) -> String {
        format!(
            "{}/{}/{}/{READ_DIRECTION}/{}",
            self.prefix, task.family, task.device_id, task.param
        )
    }

    /// Translate a received broker message into an inbound command
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<InboundCommand, TopicError> {
        let remainder = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                TopicError::malformed(topic, format!("missing prefix '{}'", self.prefix))
            })?;

        let segments: Vec<&str> = remainder.split('/').collect();
        if segments.len() < MIN_SEGMENTS {
            return Err(TopicError::malformed(
                topic,
                format!(
                    "expected at least {MIN_SEGMENTS} segments after prefix, found {}",
                    segments.len()
                ),
            ));
        }

        let (family, device_id, param) = (segments[0], segments[1], segments[3]);
        if family.is_empty() || device_id.is_empty() || param.is_empty() {
            return Err(TopicError::malformed(topic, "empty path segment"));
        }

        let payload = std::str::from_utf8(payload).map_err(|_| TopicError::InvalidPayload {
            topic: topic.to_string(),
        })?;

        Ok(InboundCommand {
            method: TaskMethod::Subscribe,
            topic: topic.to_string(),
            family: family.to_string(),
            device_id: device_id.to_string(),
            param: param.to_string(),
            payload: payload.to_string(),
            qos: INBOUND_QOS,
        })
    }
}
