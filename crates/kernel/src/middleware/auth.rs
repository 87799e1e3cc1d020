//! Bearer token authentication.
//!
//! Checks for `Authorization: Bearer <token>` headers and, if valid, stores
//! the token's user in the request extensions. Handlers opt in to
//! authentication through the [`RequireUser`] and [`RequireStaff`]
//! extractors.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AppError;
use crate::models::User;
use crate::models::api_token::hash_token;
use crate::state::AppState;

/// The authenticated caller, set by [`authenticate`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Middleware that authenticates via Bearer token.
///
/// - Valid token for an active user -> injects [`CurrentUser`]
/// - Unknown token or inactive user -> 401 JSON error
/// - No header -> passes through anonymously
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => return next.run(request).await,
    };

    match state
        .store()
        .find_user_by_token_hash(&hash_token(&raw_token))
        .await
    {
        Ok(Some(user)) if user.is_active => {
            tracing::debug!(user_id = %user.id, "authenticated API token");
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(_) => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": "Invalid API token"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to look up API token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"error": "internal server error"})),
            )
                .into_response()
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extractor for any authenticated user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| RequireUser(current.0.clone()))
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor for staff users. Rejects with 401 when anonymous and 403 when
/// the user may not use the admin surface.
#[derive(Debug, Clone)]
pub struct RequireStaff(pub User);

impl<S: Send + Sync> FromRequestParts<S> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.can_access_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(RequireStaff(user))
    }
}
