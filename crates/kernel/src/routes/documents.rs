//! Document serving.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create the document serving router.
pub fn router() -> Router<AppState> {
    Router::new().route("/back/documents/{id}/{filename}", get(serve_document))
}

/// Serve a stored document.
///
/// GET /back/documents/{id}/{filename}
///
/// The filename must match the stored one.
async fn serve_document(
    State(state): State<AppState>,
    Path((id, filename)): Path<(Uuid, String)>,
) -> AppResult<Response> {
    let document = state.documents().get(id).await?.ok_or(AppError::NotFound)?;
    if document.filename != filename {
        return Err(AppError::NotFound);
    }
    let (document, data) = state.documents().open(document.id).await?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, document.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
