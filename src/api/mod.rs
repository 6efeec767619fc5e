//! API endpoint modules.

pub mod health;
pub mod images;
pub mod openapi;

use actix_files::Files;
use actix_web::web;

use crate::config::StorageSettings;

pub use health::configure_health_routes;
pub use images::configure_routes as configure_image_routes;
pub use openapi::ApiDoc;

/// Serve stored originals under `/uploads` and artifacts under `/processed`.
pub fn configure_file_routes(cfg: &mut web::ServiceConfig, storage: &StorageSettings) {
    cfg.service(Files::new("/uploads", &storage.uploads_dir))
        .service(Files::new("/processed", &storage.processed_dir));
}
