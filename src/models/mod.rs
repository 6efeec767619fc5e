//! Domain models for the image pipeline.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod image;
pub mod message;

// Re-export commonly used types
pub use image::{ArtifactKind, Image, ImageStatus, ProcessedPaths};
pub use message::ProcessImageMessage;

const STATUS_OK: &str = "OK";

/// Bare success body: `{"status":"OK"}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }
}

/// Returned after an upload or a reprocess request was accepted.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub status: String,
    pub image_id: Uuid,
}

impl UploadResponse {
    pub fn ok(image_id: Uuid) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            image_id,
        }
    }
}

/// Image lookup response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub status: String,
    pub image: Image,
}

impl ImageResponse {
    pub fn ok(image: Image) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            image,
        }
    }
}
