//! Test helpers and utilities for integration tests

use gateway_bridge::bridge::{
    inbound_queue, outbound_queue, BridgeLoop, InboundConsumer, LoopSettings, OutboundProducer,
};
use gateway_bridge::config::BridgeConfig;
use gateway_bridge::protocol::TopicCodec;
use gateway_bridge::testing::MockBrokerAdapter;
use std::time::Duration;
use tokio::sync::watch;

/// Create a test configuration for integration tests
#[allow(dead_code)]
pub fn test_config() -> BridgeConfig {
    BridgeConfig::from_toml_str(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
topic_prefix = "home"
client_id = "test-bridge"

[bridge]
idle_interval_ms = 10
shutdown_timeout_secs = 2
"#,
    )
    .expect("test config should parse")
}

/// A bridge loop wired to a mock adapter and fresh queues
#[allow(dead_code)]
pub struct LoopFixture {
    pub bridge: BridgeLoop<MockBrokerAdapter>,
    pub adapter: MockBrokerAdapter,
    pub outbound: OutboundProducer,
    pub inbound: InboundConsumer,
    pub stop_tx: watch::Sender<bool>,
}

#[allow(dead_code)]
pub fn loop_fixture(prefix: &str, idle_interval: Duration) -> LoopFixture {
    let adapter = MockBrokerAdapter::new();
    let (outbound, consumer) = outbound_queue();
    let (inbound_tx, inbound) = inbound_queue();
    let (stop_tx, stop_rx) = watch::channel(false);

    let bridge = BridgeLoop::new(
        adapter.clone(),
        TopicCodec::new(prefix),
        consumer,
        inbound_tx,
        LoopSettings { idle_interval },
        stop_rx,
    );

    LoopFixture {
        bridge,
        adapter,
        outbound,
        inbound,
        stop_tx,
    }
}

/// Poll `condition` until it holds or `timeout` passes
#[allow(dead_code)]
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
