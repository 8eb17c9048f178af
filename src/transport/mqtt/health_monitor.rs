//! Pure connection monitoring and reconnection logic for MQTT client
//!
//! This module contains pure functions for reconnection decision making and
//! connection state tracking.

use super::connection::{ConnectionState, ReconnectConfig};
use tracing::{debug, info};

/// Pure connection monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted (pure function)
    ///
    /// Retries are unlimited; only a shutdown stops them.
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.calculate_backoff_delay(attempt),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: &ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::DisconnectedByBroker(reason) => {
                ConnectionState::Disconnected(format!("Broker disconnected: {reason}"))
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error.clone()),
            ConnectionEvent::ReconnectionStarted(attempt) => {
                ConnectionState::Reconnecting(*attempt)
            }
            ConnectionEvent::ClientClosed => {
                ConnectionState::Disconnected("Client disconnected".to_string())
            }
        }
    }

    /// Check if connection state allows subscribing (pure function)
    pub fn can_subscribe(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Log connection state transition
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Reconnecting(_), ConnectionState::Connected) => {
                info!("Reconnection successful");
            }
            (_, ConnectionState::Connected) => {
                info!("MQTT connection established");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                debug!("Connection state: Connected -> Disconnected ({})", reason);
            }
            (_, ConnectionState::Disconnected(reason)) => {
                debug!("Connection state: still disconnected ({})", reason);
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!("Starting reconnection attempt {}", attempt);
            }
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// ConnAck received from broker
    ConnAckReceived,
    /// Broker sent a DISCONNECT packet
    DisconnectedByBroker(String),
    /// Network or protocol error
    NetworkError(String),
    /// Reconnection attempt scheduled
    ReconnectionStarted(u32),
    /// Deliberate disconnect by this client
    ClientClosed,
}
