//! Message-bus collaborator interfaces.
//!
//! The PPM does not own a bus client; it consumes and produces through these
//! narrow traits. A concrete deployment wires in its broker client; the
//! built-in [`StdinConsumer`]/[`StdoutProducer`] pair runs the same pipeline
//! over a local pipe, one JSON message per line.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

/// Bus-level failures, as reported by the broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("consume timed out")]
    TimedOut,

    #[error("partition {0} end of file")]
    PartitionEof(i32),

    #[error("unknown topic")]
    UnknownTopic,

    #[error("unknown partition")]
    UnknownPartition,

    #[error("bus error: {0}")]
    Other(String),
}

impl BusError {
    /// Transient conditions keep the consume loop alive.
    pub fn is_transient(&self) -> bool {
        matches!(self, BusError::TimedOut | BusError::PartitionEof(_))
    }
}

/// One message delivered from the upstream topic.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<i64>,
    pub key: Option<String>,
}

/// Consuming side of the bus.
#[async_trait]
pub trait BusConsumer: Send {
    /// Metadata lookup: is the topic visible on the bus yet?
    async fn topic_exists(&mut self, topic: &str) -> Result<bool, BusError>;

    /// Subscribe; returns the number of partitions assigned to this
    /// consumer.
    async fn subscribe(&mut self, topic: &str) -> Result<usize, BusError>;

    /// Wait up to `timeout` for the next message.
    async fn poll(&mut self, timeout: Duration) -> Result<BusMessage, BusError>;

    /// Shut down, waiting boundedly for in-flight deliveries.
    async fn close(&mut self);
}

/// Producing side of the bus.
#[async_trait]
pub trait BusProducer: Send {
    async fn produce(&mut self, topic: &str, partition: i32, payload: &[u8]) -> Result<(), BusError>;
}

/// Reads one message per line from standard input; the whole stream is a
/// single partition 0.
pub struct StdinConsumer {
    lines: Lines<BufReader<Stdin>>,
    offset: i64,
    eof: bool,
}

impl StdinConsumer {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            offset: -1,
            eof: false,
        }
    }
}

impl Default for StdinConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusConsumer for StdinConsumer {
    async fn topic_exists(&mut self, _topic: &str) -> Result<bool, BusError> {
        Ok(true)
    }

    async fn subscribe(&mut self, _topic: &str) -> Result<usize, BusError> {
        Ok(1)
    }

    async fn poll(&mut self, timeout: Duration) -> Result<BusMessage, BusError> {
        if self.eof {
            // Stay polite after the stream ends instead of spinning.
            tokio::time::sleep(timeout).await;
            return Err(BusError::PartitionEof(0));
        }
        match tokio::time::timeout(timeout, self.lines.next_line()).await {
            Err(_) => Err(BusError::TimedOut),
            Ok(Ok(Some(line))) => {
                self.offset += 1;
                Ok(BusMessage {
                    payload: line.into_bytes(),
                    partition: 0,
                    offset: self.offset,
                    timestamp: None,
                    key: None,
                })
            }
            Ok(Ok(None)) => {
                self.eof = true;
                Err(BusError::PartitionEof(0))
            }
            Ok(Err(err)) => Err(BusError::Other(err.to_string())),
        }
    }

    async fn close(&mut self) {}
}

/// Writes one message per line to standard output.
pub struct StdoutProducer {
    out: Stdout,
}

impl StdoutProducer {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusProducer for StdoutProducer {
    async fn produce(
        &mut self,
        _topic: &str,
        _partition: i32,
        payload: &[u8],
    ) -> Result<(), BusError> {
        let write = async {
            self.out.write_all(payload).await?;
            self.out.write_all(b"\n").await?;
            self.out.flush().await
        };
        write.await.map_err(|err| BusError::Other(err.to_string()))
    }
}
