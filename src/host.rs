//! JSON-lines pipe between the bridge queues and a host process
//!
//! When the bridge runs as a standalone binary its queues are exposed on the
//! process's standard streams: one `OutboundTask` JSON object per line on
//! stdin, one `InboundCommand` JSON object per line on stdout.

use crate::bridge::queue::{InboundConsumer, OutboundProducer};
use crate::error::BridgeResult;
use crate::protocol::OutboundTask;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Feed outbound tasks read from `reader` into the bridge.
///
/// Blank lines are skipped and lines that are not a valid task are logged and
/// skipped. Returns the number of tasks accepted once the reader reaches EOF
/// or the bridge stops accepting tasks.
pub async fn forward_tasks<R>(reader: R, producer: OutboundProducer) -> BridgeResult<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let task: OutboundTask = match serde_json::from_str(line) {
            Ok(task) => task,
            Err(e) => {
                warn!("Skipping invalid task line: {}", e);
                continue;
            }
        };

        debug!(method = ?task.method, device_id = %task.device_id, "Task read from host");
        if producer.push(task).is_err() {
            info!("Bridge no longer accepts tasks, stopping input");
            break;
        }
        accepted += 1;
    }

    Ok(accepted)
}

/// Write inbound commands to `writer` until every producer is gone.
///
/// Returns the number of commands written.
pub async fn write_commands<W>(mut consumer: InboundConsumer, mut writer: W) -> BridgeResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(command) = consumer.next().await {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::queue::{inbound_queue, outbound_queue};
    use crate::protocol::{InboundCommand, TaskMethod, TopicCodec};

    #[tokio::test]
    async fn test_forward_tasks_skips_blank_and_invalid_lines() {
        let input = concat!(
            r#"{"method":"publish","family":"lighting","deviceId":"lamp1","param":"brightness","payload":"50"}"#,
            "\n",
            "\n",
            "not json\n",
            r#"{"method":"noop","family":"f","deviceId":"d","param":"p"}"#,
            "\n",
        );
        let (producer, mut consumer) = outbound_queue();

        let accepted = forward_tasks(input.as_bytes(), producer).await.unwrap();

        assert_eq!(accepted, 2);
        let first = consumer.try_next().unwrap();
        assert_eq!(first.device_id, "lamp1");
        assert!(first.is_publish());
        let second = consumer.try_next().unwrap();
        assert_eq!(second.method, TaskMethod::Unknown);
        assert_eq!(second.payload, "");
        assert!(consumer.try_next().is_none());
    }

    #[tokio::test]
    async fn test_forward_tasks_stops_when_bridge_is_gone() {
        let input = concat!(
            r#"{"method":"publish","family":"f","deviceId":"d","param":"p","payload":"1"}"#,
            "\n",
        );
        let (producer, consumer) = outbound_queue();
        drop(consumer);

        let accepted = forward_tasks(input.as_bytes(), producer).await.unwrap();
        assert_eq!(accepted, 0);
    }

    #[tokio::test]
    async fn test_write_commands_emits_json_lines() {
        let (producer, consumer) = inbound_queue();
        let codec = TopicCodec::new("home");
        producer.push(codec.decode("home/lighting/lamp1/W/brightness", b"80").unwrap());
        producer.push(codec.decode("home/switch/s1/W/state", b"on").unwrap());
        drop(producer);

        let mut output = Vec::new();
        let written = write_commands(consumer, &mut output).await.unwrap();

        assert_eq!(written, 2);
        let text = String::from_utf8(output).unwrap();
        let commands: Vec<InboundCommand> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(commands[0].device_id, "lamp1");
        assert_eq!(commands[0].payload, "80");
        assert_eq!(commands[1].topic, "home/switch/s1/W/state");
        assert!(text.contains(r#""deviceId":"s1""#));
    }
}
