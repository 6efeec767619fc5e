//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Image Pipeline Server",
        version = "0.1.0",
        description = "Accepts image uploads and derives resized, thumbnail, and watermarked versions asynchronously"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        api::health::health,
        api::health::ready,
        api::images::upload_image,
        api::images::get_image,
        api::images::delete_image,
        api::images::reprocess_image,
    ),
    components(
        schemas(
            error::ErrorResponse,
            api::health::HealthResponse,
            api::health::ReadyResponse,
            models::Image,
            models::ImageStatus,
            models::StatusResponse,
            models::UploadResponse,
            models::ImageResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Images", description = "Image upload and processing status")
    )
)]
pub struct ApiDoc;
