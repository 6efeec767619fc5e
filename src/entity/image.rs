//! Image entity for SeaORM.
//!
//! One row per uploaded image; the only durable record of pipeline progress.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub filename: String,
    pub status: String,
    pub original_path: String,
    pub processed_path_resize: Option<String>,
    pub processed_path_thumbnail: Option<String>,
    pub processed_path_watermark: Option<String>,
    pub requeue_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
