//! Mock implementations for testing
//!
//! Provides a broker adapter that records every call and replays scripted
//! broker events, so the bridge loop can be tested without a broker.

use crate::transport::{BrokerAdapter, BrokerEvent, ConnectionState};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub type PublishedMessage = (String, Vec<u8>);

/// Error returned by [`MockBrokerAdapter`] when a failure is scripted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Mock adapter failure: {0}")]
pub struct MockAdapterError(pub String);

#[derive(Debug, Default)]
struct MockState {
    published: Vec<PublishedMessage>,
    publish_attempts: usize,
    subscriptions: Vec<String>,
    connect_calls: usize,
    disconnect_calls: usize,
    pump_calls: usize,
    pending_events: VecDeque<BrokerEvent>,
    fail_connect: bool,
    fail_subscribe: bool,
    stall_publishes: bool,
    fail_next_publishes: usize,
    failing_topics: HashMap<String, usize>,
    connection_state: ConnectionState,
}

/// Mock broker adapter for testing
///
/// Clones share state, so a test can keep one clone for assertions while the
/// bridge owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBrokerAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockBrokerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_failure() -> Self {
        let adapter = Self::default();
        adapter.lock().fail_connect = true;
        adapter
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` publishes fail regardless of topic
    pub fn fail_next_publishes(&self, count: usize) {
        self.lock().fail_next_publishes = count;
    }

    /// Make the next `times` publishes to `topic` fail
    pub fn fail_topic(&self, topic: impl Into<String>, times: usize) {
        self.lock().failing_topics.insert(topic.into(), times);
    }

    /// Make every publish hang, like a broker that never acknowledges
    pub fn stall_publishes(&self) {
        self.lock().stall_publishes = true;
    }

    pub fn fail_subscribe(&self) {
        self.lock().fail_subscribe = true;
    }

    /// Queue an event for the next `pump_events` call
    pub fn push_event(&self, event: BrokerEvent) {
        self.lock().pending_events.push_back(event);
    }

    /// Queue a received message
    pub fn push_message(&self, topic: &str, payload: &str) {
        self.push_event(BrokerEvent::MessageReceived {
            topic: topic.to_string(),
            payload: Bytes::from(payload.to_string()),
        });
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    pub fn published_topics(&self) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn publish_attempts(&self) -> usize {
        self.lock().publish_attempts
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    pub fn pump_calls(&self) -> usize {
        self.lock().pump_calls
    }
}

#[async_trait]
impl BrokerAdapter for MockBrokerAdapter {
    type Error = MockAdapterError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.connect_calls += 1;
        if state.fail_connect {
            return Err(MockAdapterError("connection refused".to_string()));
        }
        state.connection_state = ConnectionState::Connected;
        state.pending_events.push_back(BrokerEvent::Connected);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.disconnect_calls += 1;
        state.connection_state = ConnectionState::Disconnected("Client disconnected".to_string());
        Ok(())
    }

    async fn subscribe(&mut self, pattern: &str) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if state.fail_subscribe {
            return Err(MockAdapterError(format!("subscribe to {pattern} rejected")));
        }
        state.subscriptions.push(pattern.to_string());
        Ok(())
    }

    async fn publish_once(&self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        let stalled = {
            let mut state = self.lock();
            state.publish_attempts += 1;
            state.stall_publishes
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();

        if state.fail_next_publishes > 0 {
            state.fail_next_publishes -= 1;
            return Err(MockAdapterError(format!("publish to {topic} failed")));
        }
        if let Some(remaining) = state.failing_topics.get_mut(topic) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MockAdapterError(format!("publish to {topic} failed")));
            }
        }

        state.published.push((topic.to_string(), payload.to_vec()));
        let packet_id = u16::try_from(state.published.len()).unwrap_or(u16::MAX);
        state
            .pending_events
            .push_back(BrokerEvent::PublishAcknowledged { packet_id });
        Ok(())
    }

    async fn pump_events(&mut self) -> Vec<BrokerEvent> {
        let mut state = self.lock();
        state.pump_calls += 1;
        state.pending_events.drain(..).collect()
    }

    fn connection_state(&self) -> ConnectionState {
        self.lock().connection_state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_records_publishes_and_acks() {
        let adapter = MockBrokerAdapter::new();
        adapter.publish_once("home/f/d/R/p", b"1").await.unwrap();

        let mut pump = adapter.clone();
        assert_eq!(
            pump.pump_events().await,
            vec![BrokerEvent::PublishAcknowledged { packet_id: 1 }]
        );
        assert_eq!(adapter.published_topics(), vec!["home/f/d/R/p"]);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let adapter = MockBrokerAdapter::new();
        adapter.fail_next_publishes(1);
        adapter.fail_topic("b", 1);

        assert!(adapter.publish_once("a", b"").await.is_err());
        assert!(adapter.publish_once("a", b"").await.is_ok());
        assert!(adapter.publish_once("b", b"").await.is_err());
        assert!(adapter.publish_once("b", b"").await.is_ok());
        assert_eq!(adapter.publish_attempts(), 4);
    }

    #[tokio::test]
    async fn test_mock_stalled_publish_never_completes() {
        let adapter = MockBrokerAdapter::new();
        adapter.stall_publishes();

        let result =
            tokio::time::timeout(Duration::from_millis(50), adapter.publish_once("a", b"")).await;
        assert!(result.is_err());
        assert_eq!(adapter.publish_attempts(), 1);
    }

    #[tokio::test]
    async fn test_mock_connection_state() {
        let mut adapter = MockBrokerAdapter::new();
        assert!(matches!(
            adapter.connection_state(),
            ConnectionState::Disconnected(_)
        ));

        adapter.connect().await.unwrap();
        assert_eq!(adapter.connection_state(), ConnectionState::Connected);

        adapter.disconnect().await.unwrap();
        assert!(matches!(
            adapter.connection_state(),
            ConnectionState::Disconnected(_)
        ));
    }
}
