//! Impure I/O operations for the MQTT adapter
//!
//! This module handles the network side of the bridge: a background driver
//! task that polls the rumqttc event loop for the long-lived subscriber
//! connection, and single-shot connections used for publishing.

use super::connection::{
    configure_mqtt_options, publish_client_id, BrokerAddress, ConnectionState, MqttError,
    ReconnectConfig,
};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{BridgeConfig, MqttSection};
use crate::mqtt_span;
use crate::transport::{BrokerAdapter, BrokerEvent};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, ConnectionError, EventLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Instrument};

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 10;

/// How long each shutdown stage waits for the event driver
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// How long a single-shot connection may take to close after its publish
const SINGLE_SHOT_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// MQTT adapter owning the bridge's broker connection
pub struct MqttAdapter {
    config: MqttSection,
    reconnect_config: ReconnectConfig,
    event_batch_limit: usize,
    client: Option<AsyncClient>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: mpsc::UnboundedSender<BrokerEvent>,
    events_rx: mpsc::UnboundedReceiver<BrokerEvent>,
    shutdown_tx: Option<watch::Sender<bool>>,
    closing: Arc<AtomicBool>,
    event_loop_handle: Option<JoinHandle<()>>,
}

impl MqttAdapter {
    pub fn new(
        config: MqttSection,
        reconnect_config: ReconnectConfig,
        event_batch_limit: usize,
    ) -> Result<Self, MqttError> {
        // Fail on a bad URL now rather than inside the driver task
        BrokerAddress::parse(&config.broker_url)?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            reconnect_config,
            event_batch_limit: event_batch_limit.max(1),
            client: None,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            state_tx,
            state_rx,
            events_tx,
            events_rx,
            shutdown_tx: None,
            closing: Arc::new(AtomicBool::new(false)),
            event_loop_handle: None,
        })
    }

    /// Build an adapter from the full bridge configuration
    pub fn from_config(config: &BridgeConfig) -> Result<Self, MqttError> {
        Self::new(
            config.mqtt.clone(),
            ReconnectConfig::from(&config.reconnect),
            config.bridge.event_batch_limit,
        )
    }

    /// Get current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Topic filters that are re-issued on every connection
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    async fn publish_single_shot(&self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        let client_id = publish_client_id(&self.config.client_id);
        let mqtt_options = configure_mqtt_options(&client_id, &self.config)?;
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        debug!(topic = %topic, bytes = payload.len(), "Sending");

        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        let publish_timeout = self.config.publish_timeout();
        let result =
            match tokio::time::timeout(publish_timeout, Self::await_publish_ack(&mut event_loop))
                .await
            {
                Ok(Ok(packet_id)) => {
                    debug!("Message {} published to {}", packet_id, topic);
                    Ok(())
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(MqttError::PublishTimeout {
                    topic: topic.to_string(),
                    timeout_secs: publish_timeout.as_secs(),
                }),
            };

        Self::close_single_shot(client, event_loop).await;
        result
    }

    /// Poll a single-shot event loop until the broker acknowledges the publish
    async fn await_publish_ack(event_loop: &mut EventLoop) -> Result<u16, MqttError> {
        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

            if let EventRoute::PublishAcknowledged { packet_id } =
                MessageHandler::route_mqtt_event(&event)
            {
                return Ok(packet_id);
            }
        }
    }

    /// Send DISCONNECT on a single-shot connection and let it flush
    async fn close_single_shot(client: AsyncClient, mut event_loop: EventLoop) {
        if client.disconnect().await.is_err() {
            return;
        }

        let _ = tokio::time::timeout(SINGLE_SHOT_CLOSE_GRACE, async {
            while event_loop.poll().await.is_ok() {}
        })
        .await;
    }

    /// Wait for the driver task, escalating from DISCONNECT to shutdown signal to abort
    async fn stop_event_driver(&mut self) {
        let Some(mut handle) = self.event_loop_handle.take() else {
            return;
        };

        if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
            .await
            .is_ok()
        {
            debug!("Event driver stopped after DISCONNECT");
            return;
        }

        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
            info!("Sent shutdown signal to event driver");
        }

        match tokio::time::timeout(DISCONNECT_GRACE, &mut handle).await {
            Ok(Ok(())) => debug!("Event driver shut down gracefully"),
            Ok(Err(e)) if !e.is_cancelled() => warn!("Event driver ended with error: {}", e),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("Event driver didn't shut down gracefully, forcing abort");
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl BrokerAdapter for MqttAdapter {
    type Error = MqttError;

    /// Spawn the event driver; the connection result is reported as an event
    async fn connect(&mut self) -> Result<(), MqttError> {
        if self.event_loop_handle.is_some() {
            return Err(MqttError::ConnectionFailedStr(
                "Event loop already started".to_string(),
            ));
        }

        let mqtt_options = configure_mqtt_options(&self.config.client_id, &self.config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.closing.store(false, Ordering::SeqCst);

        if self.config.credentials().is_some() {
            info!("Connecting with credentials");
        }
        info!(
            broker = %self.config.broker_url,
            client_id = %self.config.client_id,
            keep_alive_secs = self.config.keep_alive_secs,
            "Connecting to MQTT broker"
        );

        let driver = EventDriver {
            client_id: self.config.client_id.clone(),
            client: client.clone(),
            subscriptions: self.subscriptions.clone(),
            state_tx: self.state_tx.clone(),
            events_tx: self.events_tx.clone(),
            closing: self.closing.clone(),
            reconnect_config: self.reconnect_config.clone(),
        };

        self.event_loop_handle = Some(tokio::spawn(driver.run(event_loop, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        info!("Closing connection");
        self.closing.store(true, Ordering::SeqCst);

        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                // Driver already gone; nothing left to flush
                debug!("DISCONNECT not sent: {}", e);
            }
        }

        let _ = self
            .state_tx
            .send(HealthMonitor::determine_next_state(&ConnectionEvent::ClientClosed));

        self.stop_event_driver().await;
        self.shutdown_tx = None;

        info!("MQTT client disconnected");
        Ok(())
    }

    async fn subscribe(&mut self, pattern: &str) -> Result<(), MqttError> {
        {
            let mut subscriptions = self.subscriptions.lock().await;
            if !subscriptions.iter().any(|topic| topic == pattern) {
                subscriptions.push(pattern.to_string());
            }
        }

        let state = self.connection_state();
        match &self.client {
            Some(client) if HealthMonitor::can_subscribe(&state) => {
                info!("Subscribing to: {}", pattern);
                client
                    .subscribe(pattern, QoS::AtLeastOnce)
                    .await
                    .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;
            }
            _ => {
                info!(
                    "Subscription to {} will be issued once connected (state: {:?})",
                    pattern, state
                );
            }
        }

        Ok(())
    }

    /// Publish over a dedicated connection that is closed again afterwards
    async fn publish_once(&self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        let span = mqtt_span!(operation = "publish_once", topic = %topic);
        self.publish_single_shot(topic, payload)
            .instrument(span)
            .await
    }

    async fn pump_events(&mut self) -> Vec<BrokerEvent> {
        let mut events = Vec::new();
        while events.len() < self.event_batch_limit {
            match self.events_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }

    fn connection_state(&self) -> ConnectionState {
        MqttAdapter::connection_state(self)
    }
}

impl Drop for MqttAdapter {
    fn drop(&mut self) {
        // Signal shutdown to the driver if it's still running
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // Async disconnect is not possible here; callers should use disconnect()
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}

/// Background task that polls the subscriber connection
struct EventDriver {
    client_id: String,
    client: AsyncClient,
    subscriptions: Arc<Mutex<Vec<String>>>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<BrokerEvent>,
    closing: Arc<AtomicBool>,
    reconnect_config: ReconnectConfig,
}

impl EventDriver {
    async fn run(self, mut event_loop: EventLoop, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Starting MQTT event driver for client: {}", self.client_id);

        let mut reconnect_attempts = 0u32;
        let mut session_up = false;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event driver");
                        break;
                    }
                }

                polled = event_loop.poll() => {
                    match polled {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            self.process_event_route(route, &mut reconnect_attempts, &mut session_up)
                                .await;
                        }
                        Err(e) => {
                            if !self
                                .handle_connection_error(
                                    e,
                                    &mut reconnect_attempts,
                                    &mut session_up,
                                    &shutdown_rx,
                                )
                                .await
                            {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT event driver stopped for client: {}", self.client_id);
    }

    async fn process_event_route(
        &self,
        route: EventRoute,
        reconnect_attempts: &mut u32,
        session_up: &mut bool,
    ) {
        match &route {
            EventRoute::ConnectionAcknowledged => {
                *reconnect_attempts = 0;
                *session_up = true;
                self.transition(ConnectionEvent::ConnAckReceived);
                self.resubscribe_to_topics().await;
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                debug!(
                    topic = %topic,
                    bytes = payload.len(),
                    retain = *retain,
                    "Message received"
                );
            }
            EventRoute::PublishAcknowledged { packet_id } => {
                debug!("Message {} published", packet_id);
            }
            EventRoute::Disconnected { reason } => {
                // The connection error that follows reports the disconnect
                self.transition(ConnectionEvent::DisconnectedByBroker(reason.clone()));
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                return_codes,
            } => match MessageHandler::validate_subscription_success(return_codes) {
                Ok(()) => debug!("Subscription {} confirmed: {:?}", packet_id, return_codes),
                Err(e) => error!("Subscription {} rejected: {}", packet_id, e),
            },
            EventRoute::InfrastructureEvent(event) => {
                trace!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::OutgoingEvent => {}
        }

        if let Some(event) = route.into_broker_event() {
            self.emit(event);
        }
    }

    /// Report a connection failure and schedule the next attempt.
    /// Returns false when the driver should stop.
    async fn handle_connection_error(
        &self,
        error: ConnectionError,
        reconnect_attempts: &mut u32,
        session_up: &mut bool,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> bool {
        if self.closing.load(Ordering::SeqCst) {
            debug!("Connection closed during shutdown: {}", error);
            return false;
        }

        let reason = error.to_string();
        self.transition(ConnectionEvent::NetworkError(reason.clone()));

        if *session_up {
            *session_up = false;
            error!("Unexpected disconnection: {}", reason);
            self.emit(BrokerEvent::Disconnected { reason });
        } else {
            warn!("An error occurred on connect: {}", reason);
            self.emit(BrokerEvent::ConnectFailed { reason });
        }

        let decision = HealthMonitor::should_attempt_reconnection(
            *reconnect_attempts,
            &self.reconnect_config,
            *shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                *reconnect_attempts = attempt;
                self.transition(ConnectionEvent::ReconnectionStarted(attempt));
                debug!("Reconnection attempt {} in {}ms", attempt, delay_ms);

                if !interruptible_sleep(shutdown_rx.clone(), delay_ms).await {
                    return false;
                }
                // Polling again makes rumqttc open a fresh connection
                !self.closing.load(Ordering::SeqCst)
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
        }
    }

    /// Re-issue every recorded subscription on a fresh session
    async fn resubscribe_to_topics(&self) {
        let topics = self.subscriptions.lock().await.clone();
        for topic in topics {
            // try_subscribe: the request channel is drained by this very task
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => debug!(target: "mqtt_transport", "Subscribed to: {}", topic),
                Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
            }
        }
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(&event);
        let previous = self.state_tx.borrow().clone();
        HealthMonitor::log_state_transition(&previous, &next);
        let _ = self.state_tx.send(next);
    }

    fn emit(&self, event: BrokerEvent) {
        if self.events_tx.send(event).is_err() {
            trace!("Adapter dropped, broker event discarded");
        }
    }
}

/// Perform interruptible sleep with shutdown monitoring
/// Returns true if sleep completed, false if shutdown requested
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
    if *shutdown_rx.borrow() {
        return false;
    }

    tokio::select! {
        changed = shutdown_rx.changed() => {
            if changed.is_err() || *shutdown_rx.borrow() {
                info!("Shutdown signal received during reconnection delay, stopping");
                return false;
            }
            true
        }
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
    }
}
