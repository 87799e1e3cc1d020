//! Admin JSON surface for images, documents and CTA buttons.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{ContentError, ErrorCode, ValidationErrors};
use crate::error::{AppError, AppResult};
use crate::media::documents::MAX_DOCUMENT_SIZE;
use crate::middleware::RequireStaff;
use crate::models::{
    CtaButton, CustomDocument, CustomImage, CustomRendition, DocumentMeta, FocalPoint, ImageMeta,
    NewCtaButton, Permission, User,
};
use crate::state::AppState;

/// Image, document and CTA button routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/", get(list_images).post(upload_image))
        .route(
            "/images/{id}/",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/images/{id}/rendition/", get(get_rendition))
        .route("/documents/", get(list_documents).post(upload_document))
        .route("/documents/{id}/", get(get_document).delete(delete_document))
        .route("/cta-buttons/", get(list_cta_buttons).post(create_cta_button))
        .route("/cta-buttons/{id}/", delete(delete_cta_button))
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_SIZE))
}

fn require_permission(user: &User, permission: Permission) -> AppResult<()> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, permission = %permission, "permission denied");
        Err(AppError::Forbidden)
    }
}

/// A multipart form: text fields plus at most one file.
#[derive(Debug, Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<(String, Vec<u8>)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.file = Some((filename, data.to_vec()));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn field(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn take_file(&mut self) -> AppResult<(String, Vec<u8>)> {
        self.file.take().ok_or_else(|| {
            AppError::Validation(ValidationErrors::single(
                "file",
                ErrorCode::Required,
                "No file was submitted.",
            ))
        })
    }
}

/// Image with its public URL.
#[derive(Debug, Serialize)]
struct ImageResponse {
    #[serde(flatten)]
    image: CustomImage,
    url: String,
}

fn image_response(state: &AppState, image: CustomImage) -> ImageResponse {
    let url = state.images().url(&image.file);
    ImageResponse { image, url }
}

/// GET /images/
async fn list_images(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> AppResult<Json<Vec<ImageResponse>>> {
    require_permission(&user, Permission::ChooseImage)?;
    let images = state.images().list().await?;
    Ok(Json(
        images
            .into_iter()
            .map(|image| image_response(&state, image))
            .collect(),
    ))
}

/// Upload an image.
///
/// POST /images/
/// Content-Type: multipart/form-data
///
/// Form fields:
/// - file: the image
/// - title, alt: metadata
/// - focal_point: optional `x,y,width,height`
async fn upload_image(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ImageResponse>)> {
    require_permission(&user, Permission::AddImage)?;
    let mut form = UploadForm::read(multipart).await?;
    let (filename, data) = form.take_file()?;
    let meta = ImageMeta {
        title: form.field("title"),
        alt: form.field("alt"),
        focal_point: parse_focal_point(&form.field("focal_point"))?,
    };
    let image = state.images().upload(meta, &filename, data).await?;
    Ok((StatusCode::CREATED, Json(image_response(&state, image))))
}

fn parse_focal_point(raw: &str) -> AppResult<Option<FocalPoint>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let parts: Vec<i32> = raw
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|_| focal_point_error())?;
    match parts.as_slice() {
        [x, y, width, height] => Ok(Some(FocalPoint {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        })),
        _ => Err(focal_point_error()),
    }
}

fn focal_point_error() -> AppError {
    AppError::from(ContentError::field(
        "focal_point",
        ErrorCode::Invalid,
        "Expected x,y,width,height.",
    ))
}

/// GET /images/{id}/
async fn get_image(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ImageResponse>> {
    require_permission(&user, Permission::ChooseImage)?;
    let image = state.images().require(id).await?;
    Ok(Json(image_response(&state, image)))
}

/// PATCH /images/{id}/
/// Body: `{"title": "...", "alt": "...", "focal_point": {...}}`
async fn update_image(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
    Json(meta): Json<ImageMeta>,
) -> AppResult<Json<ImageResponse>> {
    require_permission(&user, Permission::ChangeImage)?;
    let image = state.images().update_meta(id, meta).await?;
    Ok(Json(image_response(&state, image)))
}

/// Delete an image. Gallery entries using it keep existing with no image.
///
/// DELETE /images/{id}/
async fn delete_image(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&user, Permission::DeleteImage)?;
    if state.images().delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[derive(Debug, Deserialize)]
struct RenditionQuery {
    spec: String,
}

#[derive(Debug, Serialize)]
struct RenditionResponse {
    #[serde(flatten)]
    rendition: CustomRendition,
    url: String,
}

/// Rendition of an image, created on first request.
///
/// GET /images/{id}/rendition/?spec=fill-300x200
async fn get_rendition(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
    Query(query): Query<RenditionQuery>,
) -> AppResult<Json<RenditionResponse>> {
    require_permission(&user, Permission::ChooseImage)?;
    let rendition = state.images().rendition(id, &query.spec).await?;
    let url = state.images().url(&rendition.file);
    Ok(Json(RenditionResponse { rendition, url }))
}

/// Document with its serving URL.
#[derive(Debug, Serialize)]
struct DocumentResponse {
    #[serde(flatten)]
    document: CustomDocument,
    url: String,
}

fn document_response(state: &AppState, document: CustomDocument) -> DocumentResponse {
    let url = state.documents().url(&document);
    DocumentResponse { document, url }
}

/// GET /documents/
async fn list_documents(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    require_permission(&user, Permission::ChooseDocument)?;
    let documents = state.documents().list().await?;
    Ok(Json(
        documents
            .into_iter()
            .map(|d| document_response(&state, d))
            .collect(),
    ))
}

/// Upload a document.
///
/// POST /documents/
/// Content-Type: multipart/form-data
///
/// Form fields:
/// - file: the document
/// - title, collection: metadata
/// - tags: comma-separated
async fn upload_document(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    require_permission(&user, Permission::AddDocument)?;
    let mut form = UploadForm::read(multipart).await?;
    let (filename, data) = form.take_file()?;
    let collection = form.field("collection");
    let meta = DocumentMeta {
        title: form.field("title"),
        collection: (!collection.trim().is_empty()).then_some(collection),
        tags: form
            .field("tags")
            .split(',')
            .map(str::to_string)
            .collect(),
    };
    let document = state.documents().upload(meta, &filename, data).await?;
    Ok((StatusCode::CREATED, Json(document_response(&state, document))))
}

/// GET /documents/{id}/
async fn get_document(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
    require_permission(&user, Permission::ChooseDocument)?;
    let document = state.documents().get(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(document_response(&state, document)))
}

/// DELETE /documents/{id}/
async fn delete_document(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&user, Permission::DeleteDocument)?;
    if state.documents().delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// GET /cta-buttons/
async fn list_cta_buttons(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> AppResult<Json<Vec<CtaButton>>> {
    Ok(Json(state.store().list_cta_buttons().await?))
}

/// POST /cta-buttons/
/// Body: `{"label": "...", "link": "...", "page_id": null}`
async fn create_cta_button(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(input): Json<NewCtaButton>,
) -> AppResult<(StatusCode, Json<CtaButton>)> {
    let input = input.clean().map_err(ContentError::from)?;
    if let Some(page_id) = input.page_id
        && state.pages().get(page_id).await?.is_none()
    {
        return Err(ContentError::field(
            "page_id",
            ErrorCode::Reference,
            format!("Page {page_id} does not exist."),
        )
        .into());
    }
    let button = state.store().insert_cta_button(input.into_button()).await?;
    Ok((StatusCode::CREATED, Json(button)))
}

/// DELETE /cta-buttons/{id}/
async fn delete_cta_button(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.store().delete_cta_button(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn focal_point_parsing() {
        assert!(parse_focal_point("").unwrap().is_none());
        let point = parse_focal_point("10, 20, 30, 40").unwrap().unwrap();
        assert_eq!((point.x, point.y, point.width, point.height), (10, 20, 30, 40));
        assert!(parse_focal_point("1,2,3").is_err());
        assert!(parse_focal_point("a,b,c,d").is_err());
    }
}
