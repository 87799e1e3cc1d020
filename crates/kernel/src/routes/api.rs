//! REST API under `/back/api/`.
//!
//! `me/` is always mounted. The endpoint index and the schema document are
//! only mounted in debug mode.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::content::BlockLibrary;
use crate::content::page_type::{PageType, allowed_subpage_types};
use crate::middleware::RequireUser;
use crate::models::{Permission, UserProfile};
use crate::state::AppState;

/// Describe page types, their placement rules and the block schemas.
pub fn schema_document(blocks: &BlockLibrary) -> Value {
    let page_types: Vec<Value> = PageType::ALL
        .into_iter()
        .map(|t| {
            json!({
                "type": t.machine_name(),
                "label": t.label(),
                "label_plural": t.label_plural(),
                "parent_page_types": t.parent_page_types(),
                "subpage_types": allowed_subpage_types(t),
            })
        })
        .collect();
    let permissions: Vec<Value> = Permission::ALL
        .iter()
        .map(|p| json!({"codename": p.codename(), "label": p.label()}))
        .collect();

    json!({
        "page_types": page_types,
        "blocks": blocks.describe(),
        "permissions": permissions,
    })
}

/// The authenticated caller.
async fn me(RequireUser(user): RequireUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    let admin = &state.config().admin_prefix;
    Json(json!({
        "me": "/back/api/me/",
        "schema": "/back/api/schema/",
        "admin": format!("{admin}/"),
        "documents": "/back/documents/{id}/{filename}",
        "health": "/health",
    }))
}

async fn schema(State(state): State<AppState>) -> Json<Value> {
    Json(schema_document(state.blocks()))
}

/// Create the API router.
pub fn router(debug: bool) -> Router<AppState> {
    let router = Router::new().route("/back/api/me/", get(me));
    if debug {
        router
            .route("/back/api/", get(index))
            .route("/back/api/schema/", get(schema))
    } else {
        router
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::Enumeration;

    #[test]
    fn schema_lists_placement_and_block_counts() {
        let authors = Enumeration::from_pairs(&[("ana", "Ana")]).unwrap();
        let blocks = BlockLibrary::with_standard_blocks(&authors).unwrap();
        let doc = schema_document(&blocks);

        let gallery = doc["page_types"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["type"] == "gallery_page")
            .unwrap();
        assert_eq!(gallery["parent_page_types"], json!(["home_page"]));
        assert_eq!(gallery["subpage_types"], json!(["page", "details_gallery_page"]));
        assert!(doc["blocks"]["category"].is_object());
        assert_eq!(doc["permissions"].as_array().unwrap().len(), Permission::ALL.len());
    }
}
