//! Pure message routing for MQTT events
//!
//! This module turns raw rumqttc events into routing decisions and maps those
//! decisions onto the adapter-level [`BrokerEvent`] values the bridge consumes.

use crate::transport::BrokerEvent;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{Packet, SubscribeReasonCode};
use rumqttc::v5::Event;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.clone(),
                    retain: publish.retain,
                },
                Packet::PubAck(puback) => EventRoute::PublishAcknowledged {
                    packet_id: puback.pkid,
                },
                Packet::Disconnect(disconnect) => EventRoute::Disconnected {
                    reason: format!("{:?}", disconnect.reason_code),
                },
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    return_codes: suback
                        .return_codes
                        .iter()
                        .map(Self::subscribe_reason_byte)
                        .collect(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    fn subscribe_reason_byte(code: &SubscribeReasonCode) -> u8 {
        match code {
            SubscribeReasonCode::Success(qos) => *qos as u8,
            _ => 0x80,
        }
    }

    /// Validate subscription success from SubAck (pure function)
    pub fn validate_subscription_success(return_codes: &[u8]) -> Result<(), String> {
        if return_codes.iter().any(|&code| code >= 0x80) {
            Err(format!(
                "Subscription failed with return codes: {return_codes:?}"
            ))
        } else {
            Ok(())
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived {
        topic: String,
        payload: Bytes,
        retain: bool,
    },
    /// Broker acknowledged a QoS 1 publish
    PublishAcknowledged { packet_id: u16 },
    /// MQTT broker sent DISCONNECT
    Disconnected { reason: String },
    /// Subscription confirmed with return codes
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

impl EventRoute {
    /// Adapter-level event for routes the bridge cares about.
    ///
    /// Broker DISCONNECT packets are not mapped here; the connection error
    /// that follows them is reported instead.
    pub fn into_broker_event(self) -> Option<BrokerEvent> {
        match self {
            EventRoute::ConnectionAcknowledged => Some(BrokerEvent::Connected),
            EventRoute::MessageReceived { topic, payload, .. } => {
                Some(BrokerEvent::MessageReceived { topic, payload })
            }
            EventRoute::PublishAcknowledged { packet_id } => {
                Some(BrokerEvent::PublishAcknowledged { packet_id })
            }
            EventRoute::Disconnected { .. }
            | EventRoute::SubscriptionConfirmed { .. }
            | EventRoute::InfrastructureEvent(_)
            | EventRoute::OutgoingEvent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::v5::mqttbytes::v5::{
        ConnAck, ConnectReturnCode, Disconnect, DisconnectReasonCode, PubAck, PubAckReason,
        Publish, SubAck,
    };
    use rumqttc::v5::mqttbytes::QoS;

    fn publish_event(topic: &str, payload: &str) -> Event {
        Event::Incoming(Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: Bytes::from(topic.to_string()),
            pkid: 1,
            payload: Bytes::from(payload.to_string()),
            properties: None,
        }))
    }

    #[test]
    fn test_route_connack() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&connack),
            EventRoute::ConnectionAcknowledged
        );
    }

    #[test]
    fn test_route_publish() {
        let event = publish_event("home/lighting/lamp1/W/brightness", "80");

        match MessageHandler::route_mqtt_event(&event) {
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                assert_eq!(topic, "home/lighting/lamp1/W/brightness");
                assert_eq!(payload, Bytes::from_static(b"80"));
                assert!(!retain);
            }
            other => panic!("Expected MessageReceived route, got {other:?}"),
        }
    }

    #[test]
    fn test_route_puback() {
        let puback = Event::Incoming(Packet::PubAck(PubAck {
            pkid: 7,
            reason: PubAckReason::Success,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&puback),
            EventRoute::PublishAcknowledged { packet_id: 7 }
        );
    }

    #[test]
    fn test_route_disconnect() {
        let disconnect = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: DisconnectReasonCode::ServerShuttingDown,
            properties: None,
        }));

        match MessageHandler::route_mqtt_event(&disconnect) {
            EventRoute::Disconnected { reason } => {
                assert!(reason.contains("ServerShuttingDown"));
            }
            other => panic!("Expected Disconnected route, got {other:?}"),
        }
    }

    #[test]
    fn test_route_suback() {
        let suback = Event::Incoming(Packet::SubAck(SubAck {
            pkid: 3,
            return_codes: vec![
                SubscribeReasonCode::Success(QoS::AtLeastOnce),
                SubscribeReasonCode::NotAuthorized,
            ],
            properties: None,
        }));

        assert_eq!(
            MessageHandler::route_mqtt_event(&suback),
            EventRoute::SubscriptionConfirmed {
                packet_id: 3,
                return_codes: vec![0x01, 0x80],
            }
        );
    }

    #[test]
    fn test_validate_subscription_success() {
        assert!(MessageHandler::validate_subscription_success(&[0x00, 0x01]).is_ok());
        assert!(MessageHandler::validate_subscription_success(&[0x80]).is_err());
        assert!(MessageHandler::validate_subscription_success(&[0x01, 0x80]).is_err());
    }

    #[test]
    fn test_into_broker_event() {
        assert_eq!(
            EventRoute::ConnectionAcknowledged.into_broker_event(),
            Some(BrokerEvent::Connected)
        );
        assert_eq!(
            EventRoute::PublishAcknowledged { packet_id: 9 }.into_broker_event(),
            Some(BrokerEvent::PublishAcknowledged { packet_id: 9 })
        );
        assert_eq!(
            EventRoute::MessageReceived {
                topic: "home/f/d/W/p".to_string(),
                payload: Bytes::from_static(b"on"),
                retain: true,
            }
            .into_broker_event(),
            Some(BrokerEvent::MessageReceived {
                topic: "home/f/d/W/p".to_string(),
                payload: Bytes::from_static(b"on"),
            })
        );
        assert_eq!(EventRoute::OutgoingEvent.into_broker_event(), None);
        assert_eq!(
            EventRoute::InfrastructureEvent("PingResp".to_string()).into_broker_event(),
            None
        );
    }
}
