//! Task queues connecting the bridge to the rest of the gateway
//!
//! Both queues are unbounded `tokio::sync::mpsc` channels. Producers are
//! cheap to clone and may be used from any task or thread.

use crate::protocol::{InboundCommand, OutboundTask};
use tokio::sync::mpsc;
use tracing::warn;

/// Create the queue gateway components use to ask for publishes
pub fn outbound_queue() -> (OutboundProducer, OutboundConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let producer = OutboundProducer { tx: tx.clone() };
    let consumer = OutboundConsumer { requeue_tx: tx, rx };
    (producer, consumer)
}

/// Create the queue the bridge hands received commands to
pub fn inbound_queue() -> (InboundProducer, InboundConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InboundProducer { tx }, InboundConsumer { rx })
}

/// Producer side of the outbound queue
#[derive(Debug, Clone)]
pub struct OutboundProducer {
    tx: mpsc::UnboundedSender<OutboundTask>,
}

impl OutboundProducer {
    /// Enqueue a task; fails only when the consumer is gone
    pub fn push(&self, task: OutboundTask) -> Result<(), OutboundTask> {
        self.tx.send(task).map_err(|e| e.0)
    }
}

/// Consumer side of the outbound queue, owned by the bridge loop
#[derive(Debug)]
pub struct OutboundConsumer {
    requeue_tx: mpsc::UnboundedSender<OutboundTask>,
    rx: mpsc::UnboundedReceiver<OutboundTask>,
}

impl OutboundConsumer {
    /// Pop the oldest task without waiting
    pub fn try_next(&mut self) -> Option<OutboundTask> {
        self.rx.try_recv().ok()
    }

    /// Put a task back at the tail of the queue
    pub fn requeue(&self, task: OutboundTask) {
        // The receiver lives in self, so the channel cannot be closed here
        let _ = self.requeue_tx.send(task);
    }

    /// A producer attached to this queue
    pub fn producer(&self) -> OutboundProducer {
        OutboundProducer {
            tx: self.requeue_tx.clone(),
        }
    }
}

/// Producer side of the inbound queue, owned by the bridge loop
#[derive(Debug, Clone)]
pub struct InboundProducer {
    tx: mpsc::UnboundedSender<InboundCommand>,
}

impl InboundProducer {
    /// Hand a command to the gateway; dropped with a warning if nobody listens
    pub fn push(&self, command: InboundCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %e.0.topic, "Inbound queue closed, command dropped");
                false
            }
        }
    }
}

/// Consumer side of the inbound queue
#[derive(Debug)]
pub struct InboundConsumer {
    rx: mpsc::UnboundedReceiver<InboundCommand>,
}

impl InboundConsumer {
    /// Wait for the next command; `None` once every producer is gone
    pub async fn next(&mut self) -> Option<InboundCommand> {
        self.rx.recv().await
    }

    /// Pop a command without waiting
    pub fn try_next(&mut self) -> Option<InboundCommand> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{TaskMethod, TopicCodec};

    #[test]
    fn test_outbound_fifo_with_requeue_at_tail() {
        let (producer, mut consumer) = outbound_queue();
        producer.push(OutboundTask::publish("f", "a", "p", "1")).unwrap();
        producer.push(OutboundTask::publish("f", "b", "p", "2")).unwrap();

        let first = consumer.try_next().unwrap();
        assert_eq!(first.device_id, "a");
        consumer.requeue(first);

        assert_eq!(consumer.try_next().unwrap().device_id, "b");
        assert_eq!(consumer.try_next().unwrap().device_id, "a");
        assert!(consumer.try_next().is_none());
    }

    #[test]
    fn test_outbound_push_fails_after_consumer_dropped() {
        let (producer, consumer) = outbound_queue();
        drop(consumer);

        let task = OutboundTask::publish("f", "d", "p", "v");
        assert_eq!(producer.push(task.clone()), Err(task));
    }

    #[test]
    fn test_consumer_hands_out_producers() {
        let (_producer, mut consumer) = outbound_queue();
        consumer
            .producer()
            .push(OutboundTask::publish("f", "d", "p", "v"))
            .unwrap();

        assert!(consumer.try_next().is_some());
    }

    #[tokio::test]
    async fn test_inbound_roundtrip() {
        let (producer, mut consumer) = inbound_queue();
        let command = TopicCodec::new("home")
            .decode("home/lighting/lamp1/W/brightness", b"80")
            .unwrap();

        assert!(producer.push(command.clone()));
        drop(producer);

        let received = consumer.next().await.unwrap();
        assert_eq!(received, command);
        assert_eq!(received.method, TaskMethod::Subscribe);
        assert!(consumer.next().await.is_none());
    }

    #[test]
    fn test_inbound_push_without_consumer_is_dropped() {
        let (producer, consumer) = inbound_queue();
        drop(consumer);

        let command = TopicCodec::new("home")
            .decode("home/f/d/W/p", b"x")
            .unwrap();
        assert!(!producer.push(command));
    }
}
