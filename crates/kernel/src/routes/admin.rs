//! Admin JSON surface for the page tree.
//!
//! Mounted under the configured admin prefix. Every handler requires a
//! staff user.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::page_type::allowed_subpage_types;
use crate::content::{PageType, RenderedPage};
use crate::error::{AppError, AppResult};
use crate::middleware::RequireStaff;
use crate::models::{NewPage, Page, UpdatePage};
use crate::routes::admin_media;
use crate::state::AppState;
use crate::store::PageFilter;

/// Create the admin router. Paths are relative to the admin prefix.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pages/", get(list_pages))
        .route(
            "/pages/{id}/",
            get(get_page).patch(update_page).delete(delete_page),
        )
        .route("/pages/{id}/children/", get(list_children).post(create_child))
        .route("/pages/{id}/move/", post(move_page))
        .route("/pages/{id}/publish/", post(publish_page))
        .route("/pages/{id}/unpublish/", post(unpublish_page))
        .route("/pages/{id}/public/", post(set_public))
        .route("/pages/{id}/preview/", get(preview_page))
        .merge(admin_media::router())
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    page_type: Option<String>,
}

/// List pages in tree order.
///
/// GET /pages/?type=details_gallery_page
async fn list_pages(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Page>>> {
    let filter = match query.page_type.as_deref() {
        Some(name) => {
            let page_type: PageType = name
                .parse()
                .map_err(|e: crate::content::page_type::UnknownPageType| {
                    AppError::BadRequest(e.to_string())
                })?;
            PageFilter::of_type(page_type)
        }
        None => PageFilter::default(),
    };
    Ok(Json(state.pages().list(filter).await?))
}

/// GET /pages/{id}/
async fn get_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().require(id).await?))
}

/// Children of a page plus the page types that may be added under it.
#[derive(Debug, Serialize)]
struct ChildrenResponse {
    parent: Page,
    children: Vec<Page>,
    allowed_subpage_types: Vec<PageType>,
}

/// GET /pages/{id}/children/
async fn list_children(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ChildrenResponse>> {
    let parent = state.pages().require(id).await?;
    let children = state.pages().children(id).await?;
    let allowed_subpage_types = allowed_subpage_types(parent.page_type());
    Ok(Json(ChildrenResponse {
        parent,
        children,
        allowed_subpage_types,
    }))
}

/// Create a page under `{id}`.
///
/// POST /pages/{id}/children/
/// Body: `{"type": "gallery_page", "title": "...", ...type fields}`
async fn create_child(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(parent_id): Path<Uuid>,
    Json(input): Json<NewPage>,
) -> AppResult<(StatusCode, Json<Page>)> {
    let page = state.pages().create_page(parent_id, input).await?;
    tracing::debug!(user_id = %user.id, page_id = %page.id, "page created via admin");
    Ok((StatusCode::CREATED, Json(page)))
}

/// PATCH /pages/{id}/
async fn update_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePage>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().update_page(id, input).await?))
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: Vec<Uuid>,
}

/// Delete a page and its subtree.
///
/// DELETE /pages/{id}/
async fn delete_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = state.pages().delete_page(id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    parent_id: Uuid,
}

/// POST /pages/{id}/move/
/// Body: `{"parent_id": "..."}`
async fn move_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(input): Json<MoveRequest>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().move_page(id, input.parent_id).await?))
}

/// POST /pages/{id}/publish/
async fn publish_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().publish(id).await?))
}

/// POST /pages/{id}/unpublish/
async fn unpublish_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().unpublish(id).await?))
}

#[derive(Debug, Deserialize)]
struct PublicRequest {
    public: bool,
}

/// POST /pages/{id}/public/
/// Body: `{"public": false}`
async fn set_public(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(input): Json<PublicRequest>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().set_public(id, input.public).await?))
}

/// Render context of any page, visible or not.
///
/// GET /pages/{id}/preview/
async fn preview_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RenderedPage>> {
    let page = state.pages().require(id).await?;
    Ok(Json(state.pages().render(page).await?))
}
