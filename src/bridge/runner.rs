//! The bridge loop
//!
//! A single task that owns the broker adapter. Each iteration it forwards at
//! most one outbound task, idles when there was nothing to send, and then
//! drains whatever broker events are already buffered.

use crate::bridge::queue::{InboundProducer, OutboundConsumer};
use crate::bridge_span;
use crate::config::BridgeSection;
use crate::protocol::{OutboundTask, TopicCodec};
use crate::transport::{BrokerAdapter, BrokerEvent};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn, Instrument};

/// Tunables for the bridge loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Sleep between iterations when the outbound queue is empty
    pub idle_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&BridgeSection::default())
    }
}

impl From<&BridgeSection> for LoopSettings {
    fn from(section: &BridgeSection) -> Self {
        Self {
            idle_interval: section.idle_interval(),
        }
    }
}

/// Bridge loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Subscription issued, forwarding in both directions
    Subscribed,
    /// Stop signal observed and adapter disconnected; terminal
    Stopped,
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub iterations: u64,
    /// Outbound tasks the broker accepted
    pub published: u64,
    /// Failed publishes put back on the queue
    pub requeued: u64,
    /// Outbound tasks whose method was not `publish`
    pub discarded: u64,
    /// Broker messages handed to the inbound queue
    pub received: u64,
    /// Broker messages dropped because they could not be decoded
    pub malformed: u64,
}

impl fmt::Display for BridgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={} published={} requeued={} discarded={} received={} malformed={}",
            self.iterations,
            self.published,
            self.requeued,
            self.discarded,
            self.received,
            self.malformed
        )
    }
}

/// Bridge loop over a broker adapter
pub struct BridgeLoop<A: BrokerAdapter> {
    adapter: A,
    codec: TopicCodec,
    outbound: OutboundConsumer,
    inbound: InboundProducer,
    settings: LoopSettings,
    stop_rx: watch::Receiver<bool>,
    state: BridgeState,
    stats: BridgeStats,
}

impl<A: BrokerAdapter> BridgeLoop<A> {
    pub fn new(
        adapter: A,
        codec: TopicCodec,
        outbound: OutboundConsumer,
        inbound: InboundProducer,
        settings: LoopSettings,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            adapter,
            codec,
            outbound,
            inbound,
            settings,
            stop_rx,
            state: BridgeState::Subscribed,
            stats: BridgeStats::default(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Subscribe, then iterate until the stop signal is raised
    pub async fn run(self) -> BridgeStats {
        let span = bridge_span!(prefix = %self.codec.prefix());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> BridgeStats {
        self.subscribe().await;
        info!(
            idle_interval_ms = self.settings.idle_interval.as_millis() as u64,
            "Bridge loop started"
        );

        while !self.stop_requested() {
            self.run_iteration().await;
        }

        self.stop().await;
        self.stats
    }

    /// Issue the write-direction subscription.
    ///
    /// Failure is not fatal: the adapter re-subscribes on every connect.
    pub async fn subscribe(&mut self) {
        let pattern = self.codec.subscription_pattern();
        match self.adapter.subscribe(&pattern).await {
            Ok(()) => info!("Subscribed to {}", pattern),
            Err(e) => error!("Failed to subscribe to {}: {}", pattern, e),
        }
        self.state = BridgeState::Subscribed;
    }

    /// One pass: forward at most one task, idle if there was none, drain events
    pub async fn run_iteration(&mut self) {
        self.stats.iterations += 1;

        match self.outbound.try_next() {
            Some(task) => self.forward(task).await,
            None => self.idle().await,
        }

        for event in self.adapter.pump_events().await {
            self.handle_broker_event(event);
        }
    }

    /// Disconnect the adapter and enter the terminal state
    pub async fn stop(&mut self) {
        if self.state == BridgeState::Stopped {
            return;
        }

        info!("Stop requested, shutting down bridge loop");
        if let Err(e) = self.adapter.disconnect().await {
            warn!("Error while disconnecting from broker: {}", e);
        }
        self.state = BridgeState::Stopped;

        info!(stats = %self.stats, "Bridge loop stopped");
    }

    fn stop_requested(&self) -> bool {
        // A dropped sender counts as a stop request
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    async fn idle(&mut self) {
        let interval = self.settings.idle_interval;
        tokio::select! {
            _ = self.stop_rx.changed() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }

    async fn forward(&mut self, task: OutboundTask) {
        if !task.is_publish() {
            debug!(method = ?task.method, device_id = %task.device_id, "Discarding non-publish task");
            self.stats.discarded += 1;
            return;
        }

        let topic = self.codec.encode(&task);
        let result = tokio::select! {
            result = self.adapter.publish_once(&topic, task.payload.as_bytes()) => Some(result),
            _ = stop_signalled(&mut self.stop_rx) => None,
        };

        match result {
            Some(Ok(())) => {
                debug!(topic = %topic, "Published");
                self.stats.published += 1;
            }
            Some(Err(e)) => {
                warn!(topic = %topic, "Publish failed, requeueing task: {}", e);
                self.outbound.requeue(task);
                self.stats.requeued += 1;
            }
            None => {
                info!(topic = %topic, "Stop requested during publish, requeueing task");
                self.outbound.requeue(task);
                self.stats.requeued += 1;
            }
        }
    }

    fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::MessageReceived { topic, payload } => {
                match self.codec.decode(&topic, &payload) {
                    Ok(command) => {
                        debug!(topic = %topic, "Forwarding command to inbound queue");
                        if self.inbound.push(command) {
                            self.stats.received += 1;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping broker message: {}", e);
                        self.stats.malformed += 1;
                    }
                }
            }
            BrokerEvent::Connected => debug!("Broker connection up"),
            BrokerEvent::ConnectFailed { reason } => {
                debug!("Broker connection attempt failed: {}", reason);
            }
            BrokerEvent::Disconnected { reason } => {
                debug!("Broker connection lost: {}", reason);
            }
            BrokerEvent::PublishAcknowledged { packet_id } => {
                trace!("Publish {} acknowledged", packet_id);
            }
        }
    }
}

/// Resolves once the stop flag is raised or its sender is gone
async fn stop_signalled(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}
