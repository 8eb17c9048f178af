//! The bridge between the gateway's task queues and the broker
//!
//! - [`queue`] - outbound and inbound task queues
//! - [`runner`] - the loop that moves tasks between queues and broker
//! - [`lifecycle`] - starting and stopping the loop as a service

pub mod lifecycle;
pub mod queue;
pub mod runner;

pub use lifecycle::{BridgeHandle, BridgeService};
pub use queue::{
    inbound_queue, outbound_queue, InboundConsumer, InboundProducer, OutboundConsumer,
    OutboundProducer,
};
pub use runner::{BridgeLoop, BridgeState, BridgeStats, LoopSettings};
