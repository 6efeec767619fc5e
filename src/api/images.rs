//! Image upload, lookup, deletion, and reprocessing endpoints.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, delete, get, post, web};
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{ImageResponse, StatusResponse, UploadResponse};
use crate::services::{ImagePipeline, upload};

/// Parse a path segment as an image id without touching the store.
fn parse_image_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(AppError::from)
}

/// Upload an image for asynchronous processing.
///
/// The image is stored and recorded as `pending`; the processed artifacts
/// appear once the worker has handled it.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Images",
    request_body(content_type = "multipart/form-data", description = "Form with an `image` file part"),
    responses(
        (status = 200, description = "Image accepted", body = UploadResponse),
        (status = 400, description = "Missing or empty file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage or queue failure", body = ErrorResponse)
    )
)]
#[post("/upload")]
pub async fn upload_image(
    pipeline: web::Data<ImagePipeline>,
    storage: web::Data<StorageSettings>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let saved =
        upload::save_image_upload(payload, &storage.uploads_dir, storage.max_upload_size).await?;

    let image = pipeline
        .submit(&saved.filename, &saved.path.to_string_lossy())
        .await?;

    Ok(HttpResponse::Ok().json(UploadResponse::ok(image.id)))
}

/// Get an image record.
#[utoipa::path(
    get,
    path = "/image/{id}",
    tag = "Images",
    params(("id" = String, Path, description = "Image ID (UUID)")),
    responses(
        (status = 200, description = "Image record", body = ImageResponse),
        (status = 400, description = "Invalid image ID", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    )
)]
#[get("/image/{id}")]
pub async fn get_image(
    pipeline: web::Data<ImagePipeline>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_image_id(&path)?;
    let image = pipeline.store().get(id).await?;

    Ok(HttpResponse::Ok().json(ImageResponse::ok(image)))
}

/// Delete an image record and, unless disabled, its files.
#[utoipa::path(
    delete,
    path = "/image/{id}",
    tag = "Images",
    params(("id" = String, Path, description = "Image ID (UUID)")),
    responses(
        (status = 200, description = "Image deleted", body = StatusResponse),
        (status = 400, description = "Invalid image ID", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    )
)]
#[delete("/image/{id}")]
pub async fn delete_image(
    pipeline: web::Data<ImagePipeline>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_image_id(&path)?;
    pipeline.delete(id).await?;

    Ok(HttpResponse::Ok().json(StatusResponse::ok()))
}

/// Put an image back on the queue, whatever its current status.
#[utoipa::path(
    post,
    path = "/image/{id}/reprocess",
    tag = "Images",
    params(("id" = String, Path, description = "Image ID (UUID)")),
    responses(
        (status = 200, description = "Image requeued", body = UploadResponse),
        (status = 400, description = "Invalid image ID", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 500, description = "Queue failure", body = ErrorResponse)
    )
)]
#[post("/image/{id}/reprocess")]
pub async fn reprocess_image(
    pipeline: web::Data<ImagePipeline>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_image_id(&path)?;
    let image = pipeline.requeue(id).await?;

    Ok(HttpResponse::Ok().json(UploadResponse::ok(image.id)))
}

/// Configure image routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_image)
        .service(get_image)
        .service(delete_image)
        .service(reprocess_image);
}
