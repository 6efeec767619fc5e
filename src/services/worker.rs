//! Queue consumer that turns `pending` images into `processed` ones.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{ImageStore, UpdateOutcome};
use crate::error::AppError;
use crate::models::{ImageStatus, ProcessImageMessage};
use crate::queue::{QueueConsumer, QueueError};
use crate::transform::Transformer;

use super::artifacts;

/// What happens to a record whose transformation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record `failed` with the error text.
    #[default]
    MarkFailed,
    /// Leave the record in `pending`; the sweep retries it until
    /// `max_requeues` is spent, then marks it `failed`.
    LeavePending,
}

impl FailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mark_failed" => Some(Self::MarkFailed),
            "leave_pending" => Some(Self::LeavePending),
            _ => None,
        }
    }
}

/// How a single delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Processed,
    /// Payload was not a valid envelope; dropped.
    Malformed,
    /// Record was deleted before or during processing.
    RecordMissing,
    /// Duplicate delivery of an image that is already done.
    AlreadyProcessed,
    TransformFailed,
    StoreFailed,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub failure_policy: FailurePolicy,
}

pub struct Worker {
    store: Arc<dyn ImageStore>,
    transformer: Arc<Transformer>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(store: Arc<dyn ImageStore>, transformer: Transformer, config: WorkerConfig) -> Self {
        Self {
            store,
            transformer: Arc::new(transformer),
            config,
        }
    }

    /// Run the worker on its own task until `shutdown` is cancelled.
    pub fn spawn(
        self,
        consumer: Box<dyn QueueConsumer>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(consumer, shutdown).await })
    }

    /// Consume deliveries one at a time.
    ///
    /// Cancellation is only observed between messages, so an in-flight message
    /// always finishes. Ends early if the queue closes.
    pub async fn run(&self, mut consumer: Box<dyn QueueConsumer>, shutdown: CancellationToken) {
        info!(
            "Starting image worker (failure policy: {:?})",
            self.config.failure_policy
        );

        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = consumer.recv() => delivery,
            };

            match delivery {
                Ok(delivery) => {
                    let outcome = self.handle_payload(&delivery.payload).await;
                    debug!(
                        topic = %delivery.topic,
                        partition = delivery.partition,
                        offset = delivery.offset,
                        ?outcome,
                        "Message handled"
                    );
                }
                Err(QueueError::Closed) => {
                    info!("Queue closed");
                    break;
                }
                Err(e) => error!("Failed to receive message: {}", e),
            }
        }

        info!("Image worker stopped");
    }

    /// Process one raw queue payload.
    pub async fn handle_payload(&self, payload: &[u8]) -> MessageOutcome {
        let message = match ProcessImageMessage::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed message: {}", e);
                return MessageOutcome::Malformed;
            }
        };
        let id = message.image_id;

        match self.store.get(id).await {
            Ok(image) if image.status == ImageStatus::Processed => {
                info!(image_id = %id, "Image already processed, skipping");
                return MessageOutcome::AlreadyProcessed;
            }
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                info!(image_id = %id, "Image deleted before processing, dropping message");
                return MessageOutcome::RecordMissing;
            }
            Err(e) => {
                error!(image_id = %id, op = "get", "Failed to load image: {}", e);
                return MessageOutcome::StoreFailed;
            }
        }

        let transformer = Arc::clone(&self.transformer);
        let source = PathBuf::from(&message.original_path);
        let result = tokio::task::spawn_blocking(move || transformer.transform(&source, id)).await;

        let paths = match result {
            Ok(Ok(paths)) => paths,
            Ok(Err(e)) => return self.handle_failure(id, &e.to_string()).await,
            Err(e) => {
                return self
                    .handle_failure(id, &format!("transform task failed: {}", e))
                    .await;
            }
        };

        match self
            .store
            .update_status(id, ImageStatus::Processed, &paths)
            .await
        {
            Ok(UpdateOutcome::Updated) => {
                info!(image_id = %id, "Image processed");
                MessageOutcome::Processed
            }
            Ok(UpdateOutcome::Missing) => {
                let files: Vec<String> = paths.iter().map(|(_, path)| path.to_string()).collect();
                let removed = artifacts::remove_files(files).await;
                warn!(
                    image_id = %id,
                    removed,
                    "Image deleted during processing, artifacts removed"
                );
                MessageOutcome::RecordMissing
            }
            Err(e) => {
                error!(image_id = %id, op = "update_status", "Failed to record result: {}", e);
                MessageOutcome::StoreFailed
            }
        }
    }

    async fn handle_failure(&self, id: Uuid, reason: &str) -> MessageOutcome {
        error!(image_id = %id, op = "transform", "Failed to process image: {}", reason);

        if self.config.failure_policy == FailurePolicy::MarkFailed {
            match self.store.mark_failed(id, reason).await {
                Ok(UpdateOutcome::Updated) => {}
                Ok(UpdateOutcome::Missing) => {
                    info!(image_id = %id, "Image deleted or already processed, failure not recorded");
                }
                Err(e) => {
                    error!(image_id = %id, op = "mark_failed", "Failed to record failure: {}", e);
                }
            }
        }

        MessageOutcome::TransformFailed
    }
}
