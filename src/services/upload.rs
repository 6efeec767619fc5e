//! Streams the `image` part of a multipart upload to the uploads directory.

use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

const MISSING_FILE: &str = "failed to get file from request";
const EMPTY_FILE: &str = "received empty file";

/// An upload written to disk.
#[derive(Debug, Clone)]
pub struct SavedUpload {
    /// Client-supplied name after sanitizing
    pub filename: String,
    pub path: PathBuf,
    pub size: usize,
}

/// Save the first `image` part to `uploads_dir` as `<uuid>-<name>`.
///
/// Other parts are skipped. Nothing is left on disk when the upload is
/// rejected.
pub async fn save_image_upload(
    mut payload: Multipart,
    uploads_dir: &Path,
    max_size: usize,
) -> AppResult<SavedUpload> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            debug!("Multipart error: {}", e);
            AppError::InvalidInput(MISSING_FILE.to_string())
        })?;

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(sanitize_filename)
            .ok_or_else(|| AppError::InvalidInput(MISSING_FILE.to_string()))?;

        tokio::fs::create_dir_all(uploads_dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory {}: {}",
                uploads_dir.display(),
                e
            ))
        })?;

        let path = uploads_dir.join(format!("{}-{}", Uuid::new_v4(), filename));

        let size = match write_field(&mut field, &path, max_size).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        if size == 0 {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::InvalidInput(EMPTY_FILE.to_string()));
        }

        info!(filename = %filename, path = %path.display(), size, "Saved upload");
        return Ok(SavedUpload {
            filename,
            path,
            size,
        });
    }

    Err(AppError::InvalidInput(MISSING_FILE.to_string()))
}

async fn write_field(field: &mut Field, path: &Path, max_size: usize) -> AppResult<usize> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create file {}: {}", path.display(), e)))?;

    let mut size: usize = 0;

    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
        size += data.len();

        if size > max_size {
            return Err(AppError::PayloadTooLarge(max_size));
        }

        file.write_all(&data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to flush file: {}", e)))?;

    Ok(size)
}

/// Reduce a client filename to a safe base name.
///
/// Directory components and `..` are dropped; an empty result becomes `upload`.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();

    let cleaned: String = base
        .replace("..", "")
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
