//! Public page serving and media files.
//!
//! Pages are resolved by URL path against the site home and answered with
//! their render context as JSON. Only live, public pages are served.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tracing::warn;

use crate::content::RenderedPage;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create the page serving router. Registered last; `/{*path}` catches
/// everything the other routers do not.
pub fn router(media_url: &str) -> Router<AppState> {
    let media_route = format!("/{}/{{*path}}", media_url.trim_matches('/'));
    Router::new()
        .route(&media_route, get(serve_media))
        .route("/", get(serve_home))
        .route("/{*path}", get(serve_page))
}

/// GET /
async fn serve_home(State(state): State<AppState>) -> AppResult<Json<RenderedPage>> {
    render_path(&state, "/").await
}

/// GET /{*path}
async fn serve_page(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Json<RenderedPage>> {
    render_path(&state, &path).await
}

async fn render_path(state: &AppState, path: &str) -> AppResult<Json<RenderedPage>> {
    let page = state
        .pages()
        .serve_path(path)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(state.pages().render(page).await?))
}

/// Serve an uploaded file from storage.
async fn serve_media(State(state): State<AppState>, Path(path): Path<String>) -> Response<Body> {
    let path = path.trim_start_matches('/');
    if path.contains("..") || path.contains('\0') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let storage = state.storage();
    let uri = format!("{}://{path}", storage.scheme());
    let data = match storage.read(&uri).await {
        Ok(data) => data,
        Err(e) => {
            warn!(uri = %uri, error = %e, "failed to read media file");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = infer::get(&data)
        .map(|t| t.mime_type())
        .unwrap_or("application/octet-stream");
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response()
}
