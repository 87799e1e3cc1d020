#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for images, renditions and documents.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{TestApp, body_json, id_of, multipart_body, png_bytes};
use http_body_util::BodyExt;
use serde_json::{Value, json};

use arquitectos_kernel::content::ContentError;
use arquitectos_kernel::models::{CustomRendition, ImageMeta};
use arquitectos_test_utils::{assert, test_page};

const BOUNDARY: &str = "arquitectos-test-boundary";

async fn upload(
    app: &TestApp,
    token: &str,
    path: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, Value) {
    let request = Request::post(app.admin(path))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(BOUNDARY, fields, file)))
        .unwrap();
    let response = app.request(request).await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_image_upload_and_rendition() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let png = png_bytes(400, 300);

    let (status, image) = upload(
        &app,
        &token,
        "/images/",
        &[("title", "Fachada"), ("alt", "Fachada norte")],
        Some(("fachada.png", &png)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{image}");
    assert_eq!(image["width"], 400);
    assert_eq!(image["height"], 300);
    assert_eq!(image["alt"], "Fachada norte");
    let image_id = id_of(&image);

    let url = app.admin(&format!("/images/{image_id}/rendition/?spec=max-200x200"));
    let (status, rendition) = app.get(&url, Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{rendition}");
    assert_eq!(rendition["width"], 200);
    assert_eq!(rendition["height"], 150);
    assert_eq!(rendition["filter_spec"], "max-200x200");

    // Same spec again: the stored rendition is returned.
    let (_, again) = app.get(&url, Some(&token)).await;
    assert_eq!(again["id"], rendition["id"]);

    // The rendition file is served under the media URL.
    let request = Request::get(rendition["url"].as_str().unwrap())
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn test_invalid_upload_rejected() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;

    let (status, body) = upload(&app, &token, "/images/", &[("title", "Nada")], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::field_error(&body, "file", "required");

    let (status, body) = upload(
        &app,
        &token,
        "/images/",
        &[("title", "Texto")],
        Some(("notes.txt", b"plain text, not an image")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::field_error(&body, "file", "invalid");
}

#[tokio::test]
async fn test_bad_filter_spec_rejected() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let png = png_bytes(50, 50);
    let (_, image) = upload(
        &app,
        &token,
        "/images/",
        &[("title", "Icono")],
        Some(("icono.png", &png)),
    )
    .await;

    let url = app.admin(&format!("/images/{}/rendition/?spec=rotate-90", id_of(&image)));
    let (status, body) = app.get(&url, Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::field_error(&body, "filter_spec", "invalid");
}

#[tokio::test]
async fn test_concurrent_renditions_share_one_row() {
    let app = TestApp::new().await;
    let meta = ImageMeta {
        title: "Planta".into(),
        ..Default::default()
    };
    let image = app
        .state
        .images()
        .upload(meta, "planta.png", png_bytes(320, 240))
        .await
        .unwrap();

    let images = app.state.images();
    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let images = images.clone();
            let id = image.id;
            tokio::spawn(async move { images.rendition(id, "fill-100x100").await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        let rendition: CustomRendition = task.await.unwrap().unwrap();
        ids.push(rendition.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller sees the winning rendition");

    let stored = app.state.images().renditions(image.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!((stored[0].width, stored[0].height), (100, 100));
}

#[tokio::test]
async fn test_duplicate_rendition_insert_is_unique_violation() {
    let app = TestApp::new().await;
    let image = app
        .state
        .images()
        .upload(
            ImageMeta {
                title: "Alzado".into(),
                ..Default::default()
            },
            "alzado.png",
            png_bytes(64, 64),
        )
        .await
        .unwrap();
    let first = app.state.images().rendition(image.id, "width-32").await.unwrap();

    let duplicate = CustomRendition {
        id: uuid::Uuid::now_v7(),
        file: "memory://images/other.png".into(),
        ..first.clone()
    };
    let err = app.state.store().insert_rendition(duplicate).await.unwrap_err();
    assert!(matches!(err, ContentError::UniqueViolation { .. }));
}

#[tokio::test]
async fn test_image_delete_keeps_gallery_entry() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let png = png_bytes(120, 80);
    let (_, image) = upload(
        &app,
        &token,
        "/images/",
        &[("title", "Patio")],
        Some(("patio.png", &png)),
    )
    .await;
    let image_id = id_of(&image);

    let root = app.root_id().await;
    let home = app
        .create_page(&token, root, test_page("home_page", "Home").to_json())
        .await;
    let gallery = app
        .create_page(&token, id_of(&home), test_page("gallery_page", "Gallery").to_json())
        .await;
    let entry = app
        .create_page(
            &token,
            id_of(&gallery),
            test_page("details_gallery_page", "Patio")
                .with_caption("Patio")
                .with_image(image_id)
                .to_json(),
        )
        .await;

    let (_, body) = app.get("/gallery/", None).await;
    assert_eq!(body["context"]["items"][0]["image"]["alt"], "");
    assert_eq!(body["context"]["items"][0]["image"]["width"], 120);

    let (status, _) = app
        .delete(&app.admin(&format!("/images/{image_id}/")), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, page) = app
        .get(&app.admin(&format!("/pages/{}/", id_of(&entry))), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["image"].is_null());
    assert_eq!(page["caption"], "Patio");

    let (_, body) = app.get("/gallery/", None).await;
    assert_eq!(body["context"]["items"].as_array().unwrap().len(), 1);
    assert!(body["context"]["items"][0]["image"].is_null());
}

#[tokio::test]
async fn test_gallery_entry_with_unknown_image_rejected() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let root = app.root_id().await;
    let home = app
        .create_page(&token, root, test_page("home_page", "Home").to_json())
        .await;
    let gallery = app
        .create_page(&token, id_of(&home), test_page("gallery_page", "Gallery").to_json())
        .await;

    let (status, body) = app
        .post(
            &app.admin(&format!("/pages/{}/children/", id_of(&gallery))),
            &token,
            test_page("details_gallery_page", "Ghost")
                .with_image(uuid::Uuid::now_v7())
                .to_json(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::field_error(&body, "image", "reference");
}

#[tokio::test]
async fn test_document_upload_serve_delete() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;

    let (status, doc) = upload(
        &app,
        &token,
        "/documents/",
        &[("title", "Memoria"), ("tags", "Obra, obra ,planos")],
        Some(("memoria.pdf", b"%PDF-1.4 memoria")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    assert_eq!(doc["collection"], "Root");
    assert::json_eq(&doc["tags"], &json!(["obra", "planos"]));
    let url = doc["url"].as_str().unwrap().to_string();
    assert_eq!(url, format!("/back/documents/{}/memoria.pdf", doc["id"].as_str().unwrap()));

    let response = app
        .request(Request::get(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.4 memoria");

    let wrong = format!("/back/documents/{}/other.pdf", doc["id"].as_str().unwrap());
    let response = app
        .request(Request::get(&wrong).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = app
        .delete(&app.admin(&format!("/documents/{}/", id_of(&doc))), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let response = app
        .request(Request::get(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
