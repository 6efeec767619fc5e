//! In-process image store.
//!
//! Backs tests and local runs without PostgreSQL. Records are lost on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Image, ImageStatus, ProcessedPaths};

use super::{ImageStore, UpdateOutcome};

#[derive(Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<Uuid, Image>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images().is_empty()
    }

    fn images(&self) -> MutexGuard<'_, HashMap<Uuid, Image>> {
        self.images.lock().expect("Image store mutex poisoned")
    }

    /// Push `updated_at` into the past so sweeps see the record as stale.
    #[cfg(test)]
    pub(crate) fn backdate(&self, id: Uuid, by: chrono::Duration) {
        if let Some(image) = self.images().get_mut(&id) {
            image.updated_at -= by;
        }
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn create(&self, filename: &str, original_path: &str) -> AppResult<Image> {
        let image = Image::new_pending(
            Uuid::now_v7(),
            filename.to_string(),
            original_path.to_string(),
        );
        self.images().insert(image.id, image.clone());
        Ok(image)
    }

    async fn get(&self, id: Uuid) -> AppResult<Image> {
        self.images()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("image".to_string()))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ImageStatus,
        paths: &ProcessedPaths,
    ) -> AppResult<UpdateOutcome> {
        let mut images = self.images();
        let Some(image) = images.get_mut(&id) else {
            return Ok(UpdateOutcome::Missing);
        };

        image.status = status;
        image.set_processed_paths(paths);
        image.last_error = None;
        image.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated)
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<UpdateOutcome> {
        let mut images = self.images();
        let Some(image) = images
            .get_mut(&id)
            .filter(|image| image.status != ImageStatus::Processed)
        else {
            return Ok(UpdateOutcome::Missing);
        };

        image.status = ImageStatus::Failed;
        image.last_error = Some(reason.to_string());
        image.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated)
    }

    async fn mark_requeued(&self, id: Uuid) -> AppResult<Image> {
        let mut images = self.images();
        let image = images
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("image".to_string()))?;

        image.status = ImageStatus::Pending;
        image.requeue_count += 1;
        image.last_error = None;
        image.updated_at = Utc::now();
        Ok(image.clone())
    }

    async fn requeue_stale(&self, id: Uuid, seen_requeues: i32) -> AppResult<UpdateOutcome> {
        let mut images = self.images();
        let Some(image) = images.get_mut(&id).filter(|image| {
            image.status == ImageStatus::Pending && image.requeue_count == seen_requeues
        }) else {
            return Ok(UpdateOutcome::Missing);
        };

        image.requeue_count += 1;
        image.last_error = None;
        image.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated)
    }

    async fn fail_stale(
        &self,
        id: Uuid,
        seen_requeues: i32,
        reason: &str,
    ) -> AppResult<UpdateOutcome> {
        let mut images = self.images();
        let Some(image) = images.get_mut(&id).filter(|image| {
            image.status == ImageStatus::Pending && image.requeue_count == seen_requeues
        }) else {
            return Ok(UpdateOutcome::Missing);
        };

        image.status = ImageStatus::Failed;
        image.last_error = Some(reason.to_string());
        image.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<Image> {
        self.images()
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("image".to_string()))
    }

    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Image>> {
        let mut stale: Vec<Image> = self
            .images()
            .values()
            .filter(|image| image.status == ImageStatus::Pending && image.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|image| image.updated_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
