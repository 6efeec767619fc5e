//! PostgreSQL implementation of the image store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::image::{self, ActiveModel, Entity as ImageEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Image, ImageStatus, ProcessedPaths};

use super::{DbPool, ImageStore, UpdateOutcome};

impl DbPool {
    async fn find_image(&self, id: Uuid) -> AppResult<Option<image::Model>> {
        ImageEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get image: {}", e)))
    }
}

#[async_trait]
impl ImageStore for DbPool {
    async fn create(&self, filename: &str, original_path: &str) -> AppResult<Image> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            filename: Set(filename.to_string()),
            status: Set(ImageStatus::Pending.as_str().to_string()),
            original_path: Set(original_path.to_string()),
            processed_path_resize: Set(None),
            processed_path_thumbnail: Set(None),
            processed_path_watermark: Set(None),
            requeue_count: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert image: {}", e)))?;

        Image::try_from(result)
    }

    async fn get(&self, id: Uuid) -> AppResult<Image> {
        self.find_image(id)
            .await?
            .ok_or_else(|| AppError::NotFound("image".to_string()))
            .and_then(Image::try_from)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ImageStatus,
        paths: &ProcessedPaths,
    ) -> AppResult<UpdateOutcome> {
        let result = ImageEntity::update_many()
            .col_expr(image::Column::Status, Expr::value(status.as_str()))
            .col_expr(
                image::Column::ProcessedPathResize,
                Expr::value(paths.resize.clone()),
            )
            .col_expr(
                image::Column::ProcessedPathThumbnail,
                Expr::value(paths.thumbnail.clone()),
            )
            .col_expr(
                image::Column::ProcessedPathWatermark,
                Expr::value(paths.watermark.clone()),
            )
            .col_expr(image::Column::LastError, Expr::value(Option::<String>::None))
            .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(image::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update image status: {}", e)))?;

        Ok(outcome(result.rows_affected))
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<UpdateOutcome> {
        let result = ImageEntity::update_many()
            .col_expr(
                image::Column::Status,
                Expr::value(ImageStatus::Failed.as_str()),
            )
            .col_expr(image::Column::LastError, Expr::value(Some(reason.to_string())))
            .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(image::Column::Id.eq(id))
            .filter(image::Column::Status.ne(ImageStatus::Processed.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark image failed: {}", e)))?;

        Ok(outcome(result.rows_affected))
    }

    async fn mark_requeued(&self, id: Uuid) -> AppResult<Image> {
        let existing = self
            .find_image(id)
            .await?
            .ok_or_else(|| AppError::NotFound("image".to_string()))?;

        let requeue_count = existing.requeue_count + 1;
        let mut active: ActiveModel = existing.into();
        active.status = Set(ImageStatus::Pending.as_str().to_string());
        active.requeue_count = Set(requeue_count);
        active.last_error = Set(None);
        active.updated_at = Set(Utc::now());

        match active.update(self.connection()).await {
            Ok(updated) => Image::try_from(updated),
            // Deleted between the read and the write
            Err(DbErr::RecordNotUpdated) => Err(AppError::NotFound("image".to_string())),
            Err(e) => Err(AppError::Database(format!(
                "Failed to requeue image: {}",
                e
            ))),
        }
    }

    async fn requeue_stale(&self, id: Uuid, seen_requeues: i32) -> AppResult<UpdateOutcome> {
        let result = ImageEntity::update_many()
            .col_expr(image::Column::RequeueCount, Expr::value(seen_requeues + 1))
            .col_expr(image::Column::LastError, Expr::value(Option::<String>::None))
            .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(image::Column::Id.eq(id))
            .filter(image::Column::Status.eq(ImageStatus::Pending.as_str()))
            .filter(image::Column::RequeueCount.eq(seen_requeues))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to requeue stale image: {}", e)))?;

        Ok(outcome(result.rows_affected))
    }

    async fn fail_stale(
        &self,
        id: Uuid,
        seen_requeues: i32,
        reason: &str,
    ) -> AppResult<UpdateOutcome> {
        let result = ImageEntity::update_many()
            .col_expr(
                image::Column::Status,
                Expr::value(ImageStatus::Failed.as_str()),
            )
            .col_expr(image::Column::LastError, Expr::value(Some(reason.to_string())))
            .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(image::Column::Id.eq(id))
            .filter(image::Column::Status.eq(ImageStatus::Pending.as_str()))
            .filter(image::Column::RequeueCount.eq(seen_requeues))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fail stale image: {}", e)))?;

        Ok(outcome(result.rows_affected))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Image> {
        let deleted = ImageEntity::delete_many()
            .filter(image::Column::Id.eq(id))
            .exec_with_returning(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete image: {}", e)))?;

        deleted
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("image".to_string()))
            .and_then(Image::try_from)
    }

    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Image>> {
        let models = ImageEntity::find()
            .filter(image::Column::Status.eq(ImageStatus::Pending.as_str()))
            .filter(image::Column::UpdatedAt.lt(older_than))
            .order_by_asc(image::Column::UpdatedAt)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find stale images: {}", e)))?;

        models.into_iter().map(Image::try_from).collect()
    }

    async fn ping(&self) -> AppResult<()> {
        self.select_one().await
    }
}

fn outcome(rows_affected: u64) -> UpdateOutcome {
    if rows_affected == 0 {
        UpdateOutcome::Missing
    } else {
        UpdateOutcome::Updated
    }
}
