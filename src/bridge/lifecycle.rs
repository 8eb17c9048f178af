//! Start and stop the bridge as a background service

use crate::bridge::queue::{InboundProducer, OutboundConsumer, OutboundProducer};
use crate::bridge::runner::{BridgeLoop, BridgeStats, LoopSettings};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::TopicCodec;
use crate::transport::BrokerAdapter;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Entry point for running the bridge loop on its own task
pub struct BridgeService;

impl BridgeService {
    /// Connect the adapter and spawn the bridge loop
    pub async fn start<A>(
        config: &BridgeConfig,
        mut adapter: A,
        outbound: OutboundConsumer,
        inbound: InboundProducer,
    ) -> BridgeResult<BridgeHandle>
    where
        A: BrokerAdapter + 'static,
    {
        info!(
            broker = %config.mqtt.broker_url,
            prefix = %config.mqtt.topic_prefix,
            "Starting gateway bridge"
        );

        adapter.connect().await.map_err(BridgeError::transport)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let producer = outbound.producer();
        let bridge = BridgeLoop::new(
            adapter,
            TopicCodec::new(config.mqtt.topic_prefix.as_str()),
            outbound,
            inbound,
            LoopSettings::from(&config.bridge),
            stop_rx,
        );

        let task = tokio::spawn(bridge.run());
        info!("Gateway bridge started");

        Ok(BridgeHandle {
            stop_tx,
            task: Some(task),
            producer,
            shutdown_timeout: config.bridge.shutdown_timeout(),
        })
    }
}

/// Handle to a running bridge
pub struct BridgeHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<BridgeStats>>,
    producer: OutboundProducer,
    shutdown_timeout: Duration,
}

impl BridgeHandle {
    /// A producer for the bridge's outbound queue
    pub fn outbound(&self) -> OutboundProducer {
        self.producer.clone()
    }

    /// Whether the loop task has ended
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Raise the stop signal and wait for the loop to disconnect
    pub async fn close(mut self) -> BridgeResult<BridgeStats> {
        info!("Closing gateway bridge");
        let _ = self.stop_tx.send(true);

        let Some(mut task) = self.task.take() else {
            return Err(BridgeError::task_failed("bridge already closed"));
        };

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(stats)) => {
                info!(stats = %stats, "Gateway bridge closed");
                Ok(stats)
            }
            Ok(Err(e)) => {
                error!("Bridge loop task failed: {}", e);
                Err(BridgeError::task_failed(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "Bridge loop did not stop within {:?}, aborting",
                    self.shutdown_timeout
                );
                task.abort();
                Err(BridgeError::ShutdownTimeout {
                    timeout_secs: self.shutdown_timeout.as_secs(),
                })
            }
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        // The loop notices the signal and disconnects on its own
        let _ = self.stop_tx.send(true);
    }
}
