#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the REST API, authentication and admin access.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

use arquitectos_kernel::models::Permission;
use arquitectos_test_utils::{assert, test_page};

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/back/api/me/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/back/api/me/", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::has_key(&body, "error");
}

#[tokio::test]
async fn test_me_returns_profile() {
    let app = TestApp::new().await;
    let token = app.user_token("ana").await;

    let (status, body) = app.get("/back/api/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ana");
    assert_eq!(body["email"], "ana@example.com");
    assert_eq!(body["is_staff"], false);
    assert!(body.get("token_hash").is_none());
}

#[tokio::test]
async fn test_superuser_profile_lists_all_permissions() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;

    let (_, body) = app.get("/back/api/me/", Some(&token)).await;
    let permissions = body["permissions"].as_array().unwrap();
    assert_eq!(permissions.len(), Permission::ALL.len());
    assert!(permissions.contains(&json!("choose_image")));
    assert!(permissions.contains(&json!("choose_document")));
}

#[tokio::test]
async fn test_schema_endpoints_only_in_debug() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/back/api/schema/", None).await;
    assert_eq!(status, StatusCode::OK);
    let subcategories = body["blocks"]["category"]["children"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "subcategories")
        .unwrap();
    assert::json_eq(
        &subcategories["block"]["block_counts"],
        &json!({"subcategory": {"min_num": 1, "max_num": 4}}),
    );
    let (status, _) = app.get("/back/api/", None).await;
    assert_eq!(status, StatusCode::OK);

    let app = TestApp::production().await;
    let (status, _) = app.get("/back/api/schema/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/back/api/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_requires_staff() {
    let app = TestApp::new().await;
    let url = app.admin("/pages/");

    let (status, _) = app.get(&url, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.user_token("luis").await;
    let (status, _) = app.get(&url, Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = app.staff_token(&[]).await;
    let (status, body) = app.get(&url, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_media_permissions_checked() {
    let app = TestApp::new().await;
    let token = app.staff_token(&[]).await;
    let (status, _) = app.get(&app.admin("/images/"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = app.staff_token(&[Permission::ChooseImage]).await;
    let (status, body) = app.get(&app.admin("/images/"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert::json_eq(&body, &json!([]));
}

#[tokio::test]
async fn test_validation_errors_reported_per_field() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let root = app.root_id().await;

    let (status, body) = app
        .post(
            &app.admin(&format!("/pages/{root}/children/")),
            &token,
            test_page("home_page", "   ").to_json(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::field_error(&body, "title", "required");
}

#[tokio::test]
async fn test_unknown_page_is_not_found() {
    let app = TestApp::new().await;
    let token = app.superuser_token().await;
    let (status, _) = app
        .get(
            &app.admin(&format!("/pages/{}/", uuid::Uuid::now_v7())),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
