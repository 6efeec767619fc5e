//! Shared test helpers for the HTTP tests.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header;
use actix_web::{App, dev::ServiceResponse, test, web};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_pipeline::api;
use image_pipeline::config::StorageSettings;
use image_pipeline::db::{ImageStore, MemoryImageStore};
use image_pipeline::middleware::RequestLogger;
use image_pipeline::models::{Image, ImageStatus};
use image_pipeline::queue::{MemoryConsumer, memory_queue};
use image_pipeline::services::{FailurePolicy, ImagePipeline, Worker, WorkerConfig};
use image_pipeline::transform::{TransformConfig, Transformer};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const BOUNDARY: &str = "imgp-test-boundary-7MA4YWxkTrZu0gW";

/// Temp directories, the in-memory backends, and an optional worker.
pub struct TestContext {
    pub temp: TempDir,
    pub store: Arc<MemoryImageStore>,
    pub pipeline: ImagePipeline,
    pub storage: StorageSettings,
    consumer: Option<MemoryConsumer>,
    worker: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl TestContext {
    /// Context whose queue is not consumed until `start_worker` is called.
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_size: usize) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let watermark_path = temp.path().join("watermark.png");
        RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 160]))
            .save(&watermark_path)
            .expect("Failed to write watermark");

        let storage = StorageSettings {
            uploads_dir: temp.path().join("uploads"),
            processed_dir: temp.path().join("processed"),
            watermark_path,
            max_upload_size,
            delete_files_on_delete: true,
        };

        let store = Arc::new(MemoryImageStore::new());
        let (producer, consumer) = memory_queue();
        let pipeline = ImagePipeline::new(store.clone(), Arc::new(producer), true);

        Self {
            temp,
            store,
            pipeline,
            storage,
            consumer: Some(consumer),
            worker: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start consuming the queue with the default failure policy.
    pub fn start_worker(&mut self) {
        let consumer = self.consumer.take().expect("Worker already started");
        let transformer = Transformer::new(TransformConfig {
            output_dir: self.storage.processed_dir.clone(),
            watermark_path: Some(self.storage.watermark_path.clone()),
            resize_width: 120,
            thumbnail_size: 32,
        });
        let worker = Worker::new(
            self.store.clone(),
            transformer,
            WorkerConfig {
                failure_policy: FailurePolicy::MarkFailed,
            },
        );
        self.worker = Some(worker.spawn(Box::new(consumer), self.shutdown.clone()));
    }

    /// Poll the store until the record reaches `status`.
    pub async fn wait_for_status(&self, id: Uuid, status: ImageStatus) -> Image {
        for _ in 0..250 {
            if let Ok(image) = self.store.get(id).await {
                if image.status == status {
                    return image;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("image {} never reached status {}", id, status);
    }

    pub fn files_in(&self, dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Create a test app wired like the server binary.
pub async fn create_test_app(
    ctx: &TestContext,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> + use<> {
    let store: Arc<dyn ImageStore> = ctx.store.clone();
    let storage = ctx.storage.clone();

    test::init_service(
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(ctx.pipeline.clone()))
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(storage.clone()))
            .configure(api::configure_health_routes)
            .configure(api::configure_image_routes)
            .configure(|cfg| api::configure_file_routes(cfg, &storage)),
    )
    .await
}

/// A small JPEG encoded in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .expect("Failed to encode jpeg");
    buffer.into_inner()
}

/// Multipart POST with a single file part.
pub fn multipart_request(uri: &str, field: &str, filename: &str, content: &[u8]) -> test::TestRequest {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    test::TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}
