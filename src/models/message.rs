//! Queue envelope asking the worker to process one image.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Image;

/// Envelope carried by the queue: `{"image_id": ..., "original_path": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessImageMessage {
    pub image_id: Uuid,
    pub original_path: String,
}

impl ProcessImageMessage {
    pub fn for_image(image: &Image) -> Self {
        Self {
            image_id: image.id,
            original_path: image.original_path.clone(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}
