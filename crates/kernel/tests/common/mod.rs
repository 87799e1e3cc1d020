#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the REAL kernel router over a fresh in-memory
//! store and in-memory file storage, so tests need no database and never
//! share state.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use arquitectos_kernel::config::Config;
use arquitectos_kernel::models::{CreateUser, Permission};
use arquitectos_kernel::state::AppState;

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Debug-mode app.
    pub async fn new() -> Self {
        Self::with_config(Config::for_tests().expect("Failed to build test config"))
    }

    /// Production-mode app (no API index or schema).
    pub async fn production() -> Self {
        let mut config = Config::for_tests().expect("Failed to build test config");
        config.debug = false;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let state = AppState::in_memory(config).expect("Failed to initialize AppState");
        let router = arquitectos_kernel::build_router(state.clone());
        Self { router, state }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request with an optional bearer token and JSON body, and
    /// return the status and parsed body (`Null` when empty or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.request(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Admin URL for `path` (which starts with `/`).
    pub fn admin(&self, path: &str) -> String {
        format!("{}{path}", self.state.config().admin_prefix)
    }

    /// Create a superuser and return its API token.
    pub async fn superuser_token(&self) -> String {
        self.create_user(CreateUser {
            username: format!("admin-{}", Uuid::now_v7().simple()),
            is_staff: true,
            is_superuser: true,
            ..Default::default()
        })
        .await
    }

    /// Create a staff user holding `permissions` and return its API token.
    pub async fn staff_token(&self, permissions: &[Permission]) -> String {
        self.create_user(CreateUser {
            username: format!("staff-{}", Uuid::now_v7().simple()),
            is_staff: true,
            permissions: permissions.to_vec(),
            ..Default::default()
        })
        .await
    }

    /// Create a non-staff user and return its API token.
    pub async fn user_token(&self, username: &str) -> String {
        self.create_user(CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            ..Default::default()
        })
        .await
    }

    async fn create_user(&self, input: CreateUser) -> String {
        let (_, token) = self
            .state
            .create_user(input, "test")
            .await
            .expect("Failed to create user");
        token
    }

    /// Id of the tree root.
    pub async fn root_id(&self) -> Uuid {
        self.state.pages().root().await.unwrap().id
    }

    /// Create a page through the admin API and return its JSON.
    pub async fn create_page(&self, token: &str, parent: Uuid, body: Value) -> Value {
        let (status, page) = self
            .post(&self.admin(&format!("/pages/{parent}/children/")), token, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {page}");
        page
    }
}

/// Read a response body as JSON (`Null` when empty or not JSON).
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Parse the `id` of a JSON entity.
pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

/// Encode a PNG of the given size with the `image` crate.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Build a multipart/form-data request body with one file part.
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
