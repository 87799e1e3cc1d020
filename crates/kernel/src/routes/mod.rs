//! HTTP route handlers.

pub mod admin;
pub mod admin_media;
pub mod api;
pub mod documents;
pub mod health;
pub mod pages;

use axum::Router;

use crate::state::AppState;

/// Assemble every router with authentication applied.
///
/// CORS and request tracing are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let config = state.config();
    let admin = admin::router();
    let admin = if config.admin_prefix == "/" {
        admin
    } else {
        Router::new().nest(&config.admin_prefix, admin)
    };

    Router::new()
        .merge(health::router())
        .merge(api::router(config.debug))
        .merge(documents::router())
        .merge(admin)
        .merge(pages::router(&config.media_url))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::authenticate,
        ))
        .with_state(state)
}
