//! Content storage abstraction layer.
//!
//! All reads and writes of pages, media, CTA buttons and users go through
//! [`ContentStore`]. Two backends exist:
//!
//! - [`MemoryContentStore`]: an explicit in-memory tree, used when no
//!   database is configured and by the test suite
//! - [`PgContentStore`]: PostgreSQL via sqlx, one transaction per write
//!
//! Every mutating call is atomic: it either applies completely or leaves the
//! store untouched. Tree placement rules are enforced here, so no caller can
//! attach or move a page under a parent type it does not allow.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryContentStore;
pub use postgres::PgContentStore;

use crate::content::error::ContentResult;
use crate::content::page_type::PageType;
use crate::models::{
    ApiToken, CtaButton, CustomDocument, CustomImage, CustomRendition, Page, User,
};

/// Filter for page listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFilter {
    /// Only pages of this type.
    pub page_type: Option<PageType>,
    /// Only live pages without view restrictions.
    pub visible_only: bool,
}

impl PageFilter {
    pub fn of_type(page_type: PageType) -> Self {
        Self {
            page_type: Some(page_type),
            visible_only: false,
        }
    }

    pub fn visible(mut self) -> Self {
        self.visible_only = true;
        self
    }

    /// `restricted` holds the paths of every page with view restrictions;
    /// a restriction covers the page and its whole subtree.
    pub fn matches(&self, page: &Page, restricted: &[&str]) -> bool {
        self.page_type.is_none_or(|t| page.page_type() == t)
            && (!self.visible_only || (page.live && !is_restricted(&page.path, restricted)))
    }
}

/// Whether the page at `path` sits at or below any of the `restricted` paths.
pub fn is_restricted(path: &str, restricted: &[&str]) -> bool {
    restricted.iter().any(|r| path.starts_with(r))
}

/// An image removed from the store together with its renditions.
#[derive(Debug, Clone)]
pub struct DeletedImage {
    pub image: CustomImage,
    pub renditions: Vec<CustomRendition>,
}

/// Content storage backend.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // ---- Pages ----

    /// The tree root.
    async fn root_page(&self) -> ContentResult<Page>;

    async fn get_page(&self, id: Uuid) -> ContentResult<Option<Page>>;

    async fn find_page_by_url(&self, url_path: &str) -> ContentResult<Option<Page>>;

    /// Direct children in tree order.
    async fn children(&self, id: Uuid) -> ContentResult<Vec<Page>>;

    /// Pages above `id`, root first.
    async fn ancestors(&self, id: Uuid) -> ContentResult<Vec<Page>>;

    /// Every page matching `filter`, in tree order.
    async fn list_pages(&self, filter: PageFilter) -> ContentResult<Vec<Page>>;

    /// Attach a validated page as the last child of `parent_id`.
    async fn insert_page(&self, parent_id: Uuid, page: Page) -> ContentResult<Page>;

    /// Replace the fields of an existing page. Position fields are ignored.
    async fn update_page(&self, page: Page) -> ContentResult<Page>;

    /// Move a page and its subtree under `new_parent_id`.
    async fn move_page(&self, id: Uuid, new_parent_id: Uuid) -> ContentResult<Page>;

    /// Delete a page and its subtree; CTA buttons pointing into it lose their page.
    /// Returns the ids of every removed page.
    async fn delete_page(&self, id: Uuid) -> ContentResult<Vec<Uuid>>;

    // ---- Images ----

    async fn insert_image(&self, image: CustomImage) -> ContentResult<CustomImage>;

    async fn get_image(&self, id: Uuid) -> ContentResult<Option<CustomImage>>;

    async fn list_images(&self) -> ContentResult<Vec<CustomImage>>;

    async fn update_image(&self, image: CustomImage) -> ContentResult<CustomImage>;

    /// Delete an image. Gallery entries using it lose their image and its
    /// renditions are deleted with it.
    async fn delete_image(&self, id: Uuid) -> ContentResult<Option<DeletedImage>>;

    // ---- Renditions ----

    async fn find_rendition(
        &self,
        image_id: Uuid,
        filter_spec: &str,
        focal_point_key: &str,
    ) -> ContentResult<Option<CustomRendition>>;

    /// Insert a rendition; a duplicate triple is `ContentError::UniqueViolation`.
    async fn insert_rendition(&self, rendition: CustomRendition) -> ContentResult<CustomRendition>;

    async fn list_renditions(&self, image_id: Uuid) -> ContentResult<Vec<CustomRendition>>;

    // ---- Documents ----

    async fn insert_document(&self, document: CustomDocument) -> ContentResult<CustomDocument>;

    async fn get_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>>;

    async fn list_documents(&self) -> ContentResult<Vec<CustomDocument>>;

    async fn delete_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>>;

    // ---- CTA buttons ----

    async fn insert_cta_button(&self, button: CtaButton) -> ContentResult<CtaButton>;

    async fn get_cta_button(&self, id: Uuid) -> ContentResult<Option<CtaButton>>;

    async fn list_cta_buttons(&self) -> ContentResult<Vec<CtaButton>>;

    async fn delete_cta_button(&self, id: Uuid) -> ContentResult<bool>;

    // ---- Users ----

    async fn insert_user(&self, user: User) -> ContentResult<User>;

    async fn get_user(&self, id: Uuid) -> ContentResult<Option<User>>;

    async fn insert_api_token(&self, token: ApiToken) -> ContentResult<ApiToken>;

    /// The active owner of the token with this hash.
    async fn find_user_by_token_hash(&self, token_hash: &str) -> ContentResult<Option<User>>;

    /// Whether the backend is reachable.
    async fn healthy(&self) -> bool;
}
