//! Message queue carrying processing envelopes from the API to the worker.
//!
//! Producers and consumers sit behind traits so the worker and handlers run the
//! same way against Kafka or the in-process channel.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{QueueBackend, QueueSettings};
use crate::models::ProcessImageMessage;

pub use memory::{memory_queue, MemoryConsumer, MemoryProducer};

/// Queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Every producer is gone; nothing more will arrive.
    #[error("Queue closed")]
    Closed,

    #[error("Queue backend not available: {0}")]
    Unsupported(&'static str),
}

/// A message pulled from the queue, with its position for logging.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Publishes processing envelopes.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Returns once the broker acknowledged the message.
    async fn publish(&self, message: &ProcessImageMessage) -> Result<(), QueueError>;
}

/// Receives processing envelopes in delivery order.
#[async_trait]
pub trait QueueConsumer: Send {
    async fn recv(&mut self) -> Result<Delivery, QueueError>;
}

/// Open a producer and a consumer for the configured backend.
///
/// For Kafka the brokers are probed first so a bad address fails startup.
pub async fn connect(
    settings: &QueueSettings,
) -> Result<(Arc<dyn QueueProducer>, Box<dyn QueueConsumer>), QueueError> {
    match settings.backend {
        QueueBackend::Memory => {
            let (producer, consumer) = memory_queue();
            Ok((Arc::new(producer), Box::new(consumer)))
        }
        #[cfg(feature = "kafka")]
        QueueBackend::Kafka => {
            let producer = kafka::KafkaProducer::new(settings)?;
            producer.probe().await?;
            let consumer = kafka::KafkaConsumer::new(settings)?;
            Ok((Arc::new(producer), Box::new(consumer)))
        }
        #[cfg(not(feature = "kafka"))]
        QueueBackend::Kafka => Err(QueueError::Unsupported(
            "built without the `kafka` feature",
        )),
    }
}
