//! Derives the resized, thumbnail, and watermarked artifacts of an upload.
//!
//! Output names depend only on the image id, so running a transform twice
//! overwrites the same files with identical bytes.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ArtifactKind, ProcessedPaths};

/// Transformer settings.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Directory receiving every artifact
    pub output_dir: PathBuf,
    /// Overlay for the watermark artifact; `None` disables it
    pub watermark_path: Option<PathBuf>,
    pub resize_width: u32,
    /// Edge length of the square thumbnail
    pub thumbnail_size: u32,
}

/// Transformation errors.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to save {kind} artifact to {path}: {source}")]
    Save {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub struct Transformer {
    config: TransformConfig,
}

impl Transformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Where the artifact of `kind` for `image_id` is written.
    pub fn artifact_path(&self, kind: ArtifactKind, image_id: Uuid) -> PathBuf {
        self.config.output_dir.join(kind.file_name(image_id))
    }

    /// Produce every artifact for the source image.
    ///
    /// Blocking; call from `spawn_blocking` inside async code. A source that
    /// cannot be decoded yields no artifacts at all. A missing watermark only
    /// skips the watermark artifact.
    pub fn transform(&self, source: &Path, image_id: Uuid) -> Result<ProcessedPaths, TransformError> {
        let img = image::open(source).map_err(|e| TransformError::Open {
            path: source.to_path_buf(),
            source: e,
        })?;

        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| TransformError::OutputDir {
            path: self.config.output_dir.clone(),
            source: e,
        })?;

        let mut paths = ProcessedPaths::default();

        let resized = self.resize(&img);
        paths.set(
            ArtifactKind::Resize,
            self.save(ArtifactKind::Resize, image_id, &resized)?,
        );

        let thumbnail = img.resize_to_fill(
            self.config.thumbnail_size,
            self.config.thumbnail_size,
            FilterType::CatmullRom,
        );
        paths.set(
            ArtifactKind::Thumbnail,
            self.save(ArtifactKind::Thumbnail, image_id, &thumbnail)?,
        );

        if let Some(watermarked) = self.watermark(&img, image_id) {
            paths.set(
                ArtifactKind::Watermark,
                self.save(ArtifactKind::Watermark, image_id, &watermarked)?,
            );
        }

        Ok(paths)
    }

    /// Fixed width, height following the source aspect ratio.
    fn resize(&self, img: &DynamicImage) -> DynamicImage {
        let width = self.config.resize_width;
        let ratio = width as f64 / img.width().max(1) as f64;
        let height = ((img.height() as f64 * ratio).round() as u32).max(1);

        debug!(
            "Resizing image from {}x{} to {}x{}",
            img.width(),
            img.height(),
            width,
            height
        );

        img.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn watermark(&self, img: &DynamicImage, image_id: Uuid) -> Option<DynamicImage> {
        let mark_path = self.config.watermark_path.as_ref()?;

        let mark = match image::open(mark_path) {
            Ok(mark) => mark.to_rgba8(),
            Err(e) => {
                warn!(
                    image_id = %image_id,
                    path = %mark_path.display(),
                    "Watermark unavailable, skipping watermark artifact: {}",
                    e
                );
                return None;
            }
        };

        let mut base = img.to_rgba8();
        let x = (base.width() as i64 - mark.width() as i64) / 2;
        let y = (base.height() as i64 - mark.height() as i64) / 2;
        imageops::overlay(&mut base, &mark, x, y);

        Some(DynamicImage::ImageRgba8(base))
    }

    fn save(
        &self,
        kind: ArtifactKind,
        image_id: Uuid,
        img: &DynamicImage,
    ) -> Result<String, TransformError> {
        let path = self.artifact_path(kind, image_id);

        img.to_rgb8()
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| TransformError::Save {
                kind,
                path: path.clone(),
                source: e,
            })?;

        Ok(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_source(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("source.jpg");
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
            .save(&path)
            .unwrap();
        path
    }

    fn write_watermark(dir: &Path) -> PathBuf {
        let path = dir.join("watermark.png");
        RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn transformer(dir: &Path, watermark: Option<PathBuf>) -> Transformer {
        Transformer::new(TransformConfig {
            output_dir: dir.join("processed"),
            watermark_path: watermark,
            resize_width: 800,
            thumbnail_size: 150,
        })
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_produces_all_artifacts() {
        let temp = TempDir::new().unwrap();
        let source = write_source(temp.path(), 400, 300);
        let watermark = write_watermark(temp.path());
        let t = transformer(temp.path(), Some(watermark));
        let id = Uuid::now_v7();

        let paths = t.transform(&source, id).unwrap();

        let resized = image::open(paths.resize.as_deref().unwrap()).unwrap();
        assert_eq!((resized.width(), resized.height()), (800, 600));

        let thumb = image::open(paths.thumbnail.as_deref().unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (150, 150));

        let marked = image::open(paths.watermark.as_deref().unwrap()).unwrap();
        assert_eq!((marked.width(), marked.height()), (400, 300));

        assert!(paths.resize.unwrap().ends_with(&format!("{}_resize.jpg", id)));
    }

    #[test]
    fn test_missing_watermark_skips_only_watermark() {
        let temp = TempDir::new().unwrap();
        let source = write_source(temp.path(), 64, 64);
        let t = transformer(temp.path(), Some(temp.path().join("absent.png")));

        let paths = t.transform(&source, Uuid::now_v7()).unwrap();

        assert!(paths.resize.is_some());
        assert!(paths.thumbnail.is_some());
        assert!(paths.watermark.is_none());
        assert_eq!(file_count(&temp.path().join("processed")), 2);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = write_source(temp.path(), 120, 90);
        let watermark = write_watermark(temp.path());
        let t = transformer(temp.path(), Some(watermark));
        let id = Uuid::now_v7();

        let first = t.transform(&source, id).unwrap();
        let first_bytes: Vec<Vec<u8>> = first
            .iter()
            .map(|(_, p)| std::fs::read(p).unwrap())
            .collect();

        let second = t.transform(&source, id).unwrap();
        let second_bytes: Vec<Vec<u8>> = second
            .iter()
            .map(|(_, p)| std::fs::read(p).unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(file_count(&temp.path().join("processed")), 3);
    }

    #[test]
    fn test_unreadable_source_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();
        let t = transformer(temp.path(), None);

        let result = t.transform(&source, Uuid::now_v7());

        assert!(matches!(result, Err(TransformError::Open { .. })));
        assert_eq!(file_count(&temp.path().join("processed")), 0);
    }

    #[test]
    fn test_resize_keeps_at_least_one_pixel_high() {
        let temp = TempDir::new().unwrap();
        let source = write_source(temp.path(), 4000, 2);
        let t = Transformer::new(TransformConfig {
            output_dir: temp.path().join("out"),
            watermark_path: None,
            resize_width: 100,
            thumbnail_size: 10,
        });

        let paths = t.transform(&source, Uuid::now_v7()).unwrap();
        let resized = image::open(paths.resize.unwrap()).unwrap();
        assert_eq!((resized.width(), resized.height()), (100, 1));
    }
}
