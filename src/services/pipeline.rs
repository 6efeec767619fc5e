//! Record-then-publish orchestration shared by the HTTP handlers and the sweep.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::db::{ImageStore, UpdateOutcome};
use crate::error::{AppError, AppResult};
use crate::models::{Image, ProcessImageMessage};
use crate::queue::QueueProducer;

use super::artifacts;

/// Entry point for submitting, requeueing, and deleting images.
#[derive(Clone)]
pub struct ImagePipeline {
    store: Arc<dyn ImageStore>,
    producer: Arc<dyn QueueProducer>,
    delete_files_on_delete: bool,
}

impl ImagePipeline {
    pub fn new(
        store: Arc<dyn ImageStore>,
        producer: Arc<dyn QueueProducer>,
        delete_files_on_delete: bool,
    ) -> Self {
        Self {
            store,
            producer,
            delete_files_on_delete,
        }
    }

    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    /// Record a stored upload as `pending`, then ask the worker to process it.
    ///
    /// The record is committed before publishing. If publishing fails the record
    /// stays `pending` and the sweep picks it up later. If the record cannot be
    /// created the stored upload is removed.
    pub async fn submit(&self, filename: &str, original_path: &str) -> AppResult<Image> {
        let image = match self.store.create(filename, original_path).await {
            Ok(image) => image,
            Err(e) => {
                artifacts::remove_files([original_path]).await;
                return Err(e);
            }
        };

        self.publish(&image).await?;

        info!(image_id = %image.id, filename = %image.filename, "Image queued for processing");
        Ok(image)
    }

    /// Move a record back to `pending` and publish it again.
    pub async fn requeue(&self, id: Uuid) -> AppResult<Image> {
        let image = self.store.mark_requeued(id).await?;
        self.publish(&image).await?;

        info!(
            image_id = %image.id,
            requeue_count = image.requeue_count,
            "Image requeued"
        );
        Ok(image)
    }

    /// Requeue a record the sweep found stale.
    ///
    /// Returns `false` without publishing when the record changed since `seen`
    /// was read, e.g. the worker finished it or it was deleted.
    pub async fn requeue_stale(&self, seen: &Image) -> AppResult<bool> {
        match self
            .store
            .requeue_stale(seen.id, seen.requeue_count)
            .await?
        {
            UpdateOutcome::Updated => {}
            UpdateOutcome::Missing => return Ok(false),
        }

        self.publish(seen).await?;

        info!(
            image_id = %seen.id,
            requeue_count = seen.requeue_count + 1,
            "Stale image requeued"
        );
        Ok(true)
    }

    /// Delete a record, removing its files when configured to.
    pub async fn delete(&self, id: Uuid) -> AppResult<Image> {
        let image = self.store.delete(id).await?;

        if self.delete_files_on_delete {
            let removed = artifacts::remove_files(image.file_paths()).await;
            info!(image_id = %id, removed, "Image deleted");
        } else {
            info!(image_id = %id, "Image deleted, files kept");
        }

        Ok(image)
    }

    async fn publish(&self, image: &Image) -> AppResult<()> {
        self.producer
            .publish(&ProcessImageMessage::for_image(image))
            .await
            .map_err(|e| {
                error!(image_id = %image.id, "Failed to publish processing message: {}", e);
                AppError::from(e)
            })
    }
}
