//! Kafka backend.
//!
//! Messages are keyed by image id so repeated publishes of one image land on the
//! same partition. Offsets are auto-committed on an interval, so a crash can
//! redeliver recently processed messages.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, Message};
use tracing::info;

use crate::config::QueueSettings;
use crate::models::ProcessImageMessage;

use super::{Delivery, QueueConsumer, QueueError, QueueProducer};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(settings: &QueueSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", settings.brokers.join(","));
    config
}

pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaProducer {
    pub fn new(settings: &QueueSettings) -> Result<Self, QueueError> {
        let producer: FutureProducer = client_config(settings)
            .set("message.timeout.ms", settings.publish_timeout_ms.to_string())
            .set("linger.ms", "5")
            .create()
            .map_err(|e| QueueError::Kafka(format!("Failed to create producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
            timeout: Duration::from_millis(settings.publish_timeout_ms),
        })
    }

    /// Fetch cluster metadata to verify the brokers are reachable.
    pub async fn probe(&self) -> Result<(), QueueError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();

        let brokers = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), METADATA_TIMEOUT)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| QueueError::Kafka(format!("Metadata task failed: {}", e)))?
        .map_err(|e| QueueError::Kafka(format!("Brokers unreachable: {}", e)))?;

        info!(brokers, topic = %self.topic, "Connected to Kafka");
        Ok(())
    }
}

#[async_trait]
impl QueueProducer for KafkaProducer {
    async fn publish(&self, message: &ProcessImageMessage) -> Result<(), QueueError> {
        let payload = message.to_bytes()?;
        let key = message.image_id.to_string();

        self.producer
            .send(
                FutureRecord::to(&self.topic).key(&key).payload(&payload),
                Timeout::After(self.timeout),
            )
            .await
            .map_err(|(e, _)| QueueError::Kafka(format!("Failed to publish: {}", e)))?;

        Ok(())
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(settings: &QueueSettings) -> Result<Self, QueueError> {
        let consumer: StreamConsumer = client_config(settings)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                settings.commit_interval_ms.to_string(),
            )
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| QueueError::Kafka(format!("Failed to create consumer: {}", e)))?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|e| QueueError::Kafka(format!("Failed to subscribe: {}", e)))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl QueueConsumer for KafkaConsumer {
    async fn recv(&mut self) -> Result<Delivery, QueueError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| QueueError::Kafka(format!("Failed to receive: {}", e)))?;

        Ok(Delivery {
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        })
    }
}
