//! Image record domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::image as image_entity;
use crate::error::AppError;

/// Processing status of an image record.
///
/// `pending` is the only initial state. The worker moves a record to
/// `processed` or `failed`; an explicit requeue moves it back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processed,
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of derived artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Resize,
    Thumbnail,
    Watermark,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Resize, Self::Thumbnail, Self::Watermark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Thumbnail => "thumbnail",
            Self::Watermark => "watermark",
        }
    }

    /// Deterministic output file name for an image, e.g. `<id>_thumbnail.jpg`.
    pub fn file_name(&self, image_id: Uuid) -> String {
        let suffix = match self {
            Self::Resize => "resize",
            Self::Thumbnail => "thumbnail",
            Self::Watermark => "watermarked",
        };
        format!("{}_{}.jpg", image_id, suffix)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locations of the derived artifacts; an entry is set only when that
/// transformation succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessedPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

impl ProcessedPaths {
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Resize => self.resize.as_deref(),
            ArtifactKind::Thumbnail => self.thumbnail.as_deref(),
            ArtifactKind::Watermark => self.watermark.as_deref(),
        }
    }

    pub fn set(&mut self, kind: ArtifactKind, path: String) {
        match kind {
            ArtifactKind::Resize => self.resize = Some(path),
            ArtifactKind::Thumbnail => self.thumbnail = Some(path),
            ArtifactKind::Watermark => self.watermark = Some(path),
        }
    }

    /// Present artifacts in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        ArtifactKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|path| (kind, path)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Persisted image record as exposed to lookup callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Image {
    pub id: Uuid,
    pub filename: String,
    pub status: ImageStatus,
    pub original_path: String,
    pub processed_path_resize: Option<String>,
    pub processed_path_thumbnail: Option<String>,
    pub processed_path_watermark: Option<String>,
    /// Times the record was put back on the queue after creation.
    pub requeue_count: i32,
    /// Reason for the last failure, cleared on requeue.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    /// A fresh `pending` record.
    pub fn new_pending(id: Uuid, filename: String, original_path: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename,
            status: ImageStatus::Pending,
            original_path,
            processed_path_resize: None,
            processed_path_thumbnail: None,
            processed_path_watermark: None,
            requeue_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn processed_paths(&self) -> ProcessedPaths {
        ProcessedPaths {
            resize: self.processed_path_resize.clone(),
            thumbnail: self.processed_path_thumbnail.clone(),
            watermark: self.processed_path_watermark.clone(),
        }
    }

    pub fn set_processed_paths(&mut self, paths: &ProcessedPaths) {
        self.processed_path_resize = paths.resize.clone();
        self.processed_path_thumbnail = paths.thumbnail.clone();
        self.processed_path_watermark = paths.watermark.clone();
    }

    /// Every file on disk that belongs to this record.
    pub fn file_paths(&self) -> Vec<&str> {
        std::iter::once(self.original_path.as_str())
            .chain(self.processed_path_resize.as_deref())
            .chain(self.processed_path_thumbnail.as_deref())
            .chain(self.processed_path_watermark.as_deref())
            .collect()
    }
}

/// Fails on a status string outside the schema's CHECK constraint.
impl TryFrom<image_entity::Model> for Image {
    type Error = AppError;

    fn try_from(m: image_entity::Model) -> Result<Self, Self::Error> {
        let status = ImageStatus::parse(&m.status).ok_or_else(|| {
            AppError::Database(format!(
                "image {} has unknown status '{}'",
                m.id, m.status
            ))
        })?;

        Ok(Self {
            id: m.id,
            filename: m.filename,
            status,
            original_path: m.original_path,
            processed_path_resize: m.processed_path_resize,
            processed_path_thumbnail: m.processed_path_thumbnail,
            processed_path_watermark: m.processed_path_watermark,
            requeue_count: m.requeue_count,
            last_error: m.last_error,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}
