//! Upload, lookup, delete, and reprocess flows.

use std::path::Path;

use actix_web::{http::StatusCode, test};
use image_pipeline::db::ImageStore;
use image_pipeline::error::ErrorResponse;
use image_pipeline::models::{ImageResponse, ImageStatus, StatusResponse, UploadResponse};
use uuid::Uuid;

use super::test_helpers::{TestContext, create_test_app, jpeg_bytes, multipart_request};

fn served_path(prefix: &str, stored: &str) -> String {
    let name = Path::new(stored)
        .file_name()
        .and_then(|n| n.to_str())
        .expect("stored path has a file name");
    format!("{}/{}", prefix, name)
}

#[actix_rt::test]
async fn test_upload_is_pending_then_processed() {
    let mut ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = multipart_request("/upload", "image", "test.jpg", &jpeg_bytes(240, 160)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded: UploadResponse = test::read_body_json(resp).await;
    assert_eq!(uploaded.status, "OK");

    let req = test::TestRequest::get()
        .uri(&format!("/image/{}", uploaded.image_id))
        .to_request();
    let fetched: ImageResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched.status, "OK");
    assert_eq!(fetched.image.status, ImageStatus::Pending);
    assert_eq!(fetched.image.filename, "test.jpg");
    assert!(fetched.image.processed_paths().is_empty());
    assert!(fetched.image.original_path.ends_with("-test.jpg"));

    ctx.start_worker();
    ctx.wait_for_status(uploaded.image_id, ImageStatus::Processed)
        .await;

    let req = test::TestRequest::get()
        .uri(&format!("/image/{}", uploaded.image_id))
        .to_request();
    let fetched: ImageResponse = test::call_and_read_body_json(&app, req).await;
    let paths = fetched.image.processed_paths();
    assert_eq!(paths.iter().count(), 3);

    for (_, stored) in paths.iter() {
        let req = test::TestRequest::get()
            .uri(&served_path("/processed", stored))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "artifact {} not served", stored);
    }

    let req = test::TestRequest::get()
        .uri(&served_path("/uploads", &fetched.image.original_path))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_same_filename_never_collides() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let mut originals = Vec::new();
    for _ in 0..2 {
        let req = multipart_request("/upload", "image", "same.jpg", &jpeg_bytes(8, 8)).to_request();
        let uploaded: UploadResponse = test::call_and_read_body_json(&app, req).await;
        originals.push(ctx.store.get(uploaded.image_id).await.unwrap().original_path);
    }

    assert_ne!(originals[0], originals[1]);
    assert_eq!(ctx.files_in(&ctx.storage.uploads_dir), 2);
}

#[actix_rt::test]
async fn test_delete_then_get_is_not_found() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = multipart_request("/upload", "image", "gone.jpg", &jpeg_bytes(16, 16)).to_request();
    let uploaded: UploadResponse = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/image/{}", uploaded.image_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: StatusResponse = test::read_body_json(resp).await;
    assert_eq!(body.status, "OK");

    let req = test::TestRequest::get()
        .uri(&format!("/image/{}", uploaded.image_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.status, "Error");
    assert_eq!(body.error, "image not found");

    assert_eq!(ctx.files_in(&ctx.storage.uploads_dir), 0);
}

#[actix_rt::test]
async fn test_delete_unknown_image_is_not_found() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/image/{}", Uuid::now_v7()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_upload_without_image_part_is_rejected() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = multipart_request("/upload", "document", "test.jpg", &jpeg_bytes(8, 8)).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.error.contains("file from request"));
    assert!(ctx.store.is_empty());
}

#[actix_rt::test]
async fn test_non_multipart_upload_is_rejected() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = test::TestRequest::post()
        .uri("/upload")
        .set_json(serde_json::json!({ "image": "nope" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(ctx.store.is_empty());
}

#[actix_rt::test]
async fn test_empty_file_is_rejected() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = multipart_request("/upload", "image", "empty.jpg", b"").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "received empty file");
    assert!(ctx.store.is_empty());
    assert_eq!(ctx.files_in(&ctx.storage.uploads_dir), 0);
}

#[actix_rt::test]
async fn test_oversized_file_is_rejected() {
    let ctx = TestContext::with_upload_limit(64);
    let app = create_test_app(&ctx).await;

    let req = multipart_request("/upload", "image", "big.jpg", &[7u8; 1024]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(ctx.store.is_empty());
    assert_eq!(ctx.files_in(&ctx.storage.uploads_dir), 0);
}

#[actix_rt::test]
async fn test_invalid_id_is_bad_request() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    for req in [
        test::TestRequest::get().uri("/image/not-a-uuid").to_request(),
        test::TestRequest::delete().uri("/image/not-a-uuid").to_request(),
        test::TestRequest::post()
            .uri("/image/not-a-uuid/reprocess")
            .to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid image ID");
    }
}

#[actix_rt::test]
async fn test_undecodable_upload_is_marked_failed() {
    let mut ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    ctx.start_worker();

    let req = multipart_request("/upload", "image", "bad.jpg", b"this is not an image").to_request();
    let uploaded: UploadResponse = test::call_and_read_body_json(&app, req).await;

    let image = ctx
        .wait_for_status(uploaded.image_id, ImageStatus::Failed)
        .await;
    assert!(image.last_error.is_some());
    assert!(image.processed_paths().is_empty());
    assert_eq!(ctx.files_in(&ctx.storage.processed_dir), 0);
}

#[actix_rt::test]
async fn test_reprocess_requeues_processed_image() {
    let mut ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    ctx.start_worker();

    let req = multipart_request("/upload", "image", "again.jpg", &jpeg_bytes(64, 48)).to_request();
    let uploaded: UploadResponse = test::call_and_read_body_json(&app, req).await;
    let first = ctx
        .wait_for_status(uploaded.image_id, ImageStatus::Processed)
        .await;

    let req = test::TestRequest::post()
        .uri(&format!("/image/{}/reprocess", uploaded.image_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = test::read_body_json(resp).await;
    assert_eq!(body.image_id, uploaded.image_id);

    let second = ctx
        .wait_for_status(uploaded.image_id, ImageStatus::Processed)
        .await;
    assert_eq!(second.requeue_count, 1);
    assert_eq!(second.processed_paths(), first.processed_paths());
    assert_eq!(ctx.files_in(&ctx.storage.processed_dir), 3);
}

#[actix_rt::test]
async fn test_reprocess_unknown_image_is_not_found() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let req = test::TestRequest::post()
        .uri(&format!("/image/{}/reprocess", Uuid::now_v7()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
