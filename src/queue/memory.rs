//! In-process queue backed by a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::ProcessImageMessage;

use super::{Delivery, QueueConsumer, QueueError, QueueProducer};

const MEMORY_TOPIC: &str = "memory";

/// Create a connected producer/consumer pair.
pub fn memory_queue() -> (MemoryProducer, MemoryConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryProducer { tx },
        MemoryConsumer {
            rx,
            next_offset: 0,
        },
    )
}

#[derive(Clone)]
pub struct MemoryProducer {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MemoryProducer {
    /// Enqueue raw bytes, bypassing envelope encoding.
    pub fn publish_raw(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        self.tx.send(payload).map_err(|_| QueueError::Closed)
    }
}

#[async_trait]
impl QueueProducer for MemoryProducer {
    async fn publish(&self, message: &ProcessImageMessage) -> Result<(), QueueError> {
        self.publish_raw(message.to_bytes()?)
    }
}

pub struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    next_offset: i64,
}

#[async_trait]
impl QueueConsumer for MemoryConsumer {
    async fn recv(&mut self) -> Result<Delivery, QueueError> {
        let payload = self.rx.recv().await.ok_or(QueueError::Closed)?;
        let offset = self.next_offset;
        self.next_offset += 1;

        Ok(Delivery {
            payload,
            topic: MEMORY_TOPIC.to_string(),
            partition: 0,
            offset,
        })
    }
}
