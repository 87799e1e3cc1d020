//! Page lifecycle and render contexts.
//!
//! Validates page input (title, slug, type-specific fields, block page
//! references) before handing it to the store. Placement rules are enforced
//! by the store itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::blocks::BlockLibrary;
use super::context::{
    GalleryContext, GalleryImage, GalleryItem, HomeContext, PageContext, PageSummary,
    PlainContext, RenderedPage, header_categories, template_for,
};
use super::error::{ContentError, ContentResult};
use super::page_type::PageType;
use super::schema::Enumeration;
use super::validation::{ErrorCode, ValidationErrors, join_path};
use crate::media::storage::FileStorage;
use crate::models::page::clean_title_and_slug;
use crate::models::{NewPage, Page, PageContent, UpdatePage};
use crate::store::{ContentStore, PageFilter};

/// Service for page operations.
#[derive(Clone)]
pub struct PageService {
    inner: Arc<PageServiceInner>,
}

struct PageServiceInner {
    store: Arc<dyn ContentStore>,
    blocks: Arc<BlockLibrary>,
    authors: Enumeration,
    storage: Arc<dyn FileStorage>,
}

impl PageService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        blocks: Arc<BlockLibrary>,
        authors: Enumeration,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(PageServiceInner {
                store,
                blocks,
                authors,
                storage,
            }),
        }
    }

    pub fn blocks(&self) -> &BlockLibrary {
        &self.inner.blocks
    }

    pub async fn root(&self) -> ContentResult<Page> {
        self.inner.store.root_page().await
    }

    pub async fn get(&self, id: Uuid) -> ContentResult<Option<Page>> {
        self.inner.store.get_page(id).await
    }

    /// Load a page or fail with `NotFound`.
    pub async fn require(&self, id: Uuid) -> ContentResult<Page> {
        self.get(id)
            .await?
            .ok_or_else(|| ContentError::not_found("page", id))
    }

    pub async fn children(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        self.inner.store.children(id).await
    }

    pub async fn ancestors(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        self.inner.store.ancestors(id).await
    }

    pub async fn list(&self, filter: PageFilter) -> ContentResult<Vec<Page>> {
        self.inner.store.list_pages(filter).await
    }

    /// Create a page as the last child of `parent_id`.
    pub async fn create_page(&self, parent_id: Uuid, input: NewPage) -> ContentResult<Page> {
        let mut errors = ValidationErrors::new();
        let names = clean_title_and_slug(&input.title, input.slug.as_deref())
            .map_err(|e| errors.merge(e))
            .ok();
        let content = self.clean_content(input.content, &mut errors).await?;

        let (Some((title, slug)), Some(content)) = (names, content) else {
            return Err(errors.into());
        };
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let mut page = Page::unattached(title, slug, content);
        page.live = input.live.unwrap_or(true);
        page.public = input.public.unwrap_or(true);

        let page = self.inner.store.insert_page(parent_id, page).await?;
        info!(
            page_id = %page.id,
            page_type = %page.page_type(),
            url_path = %page.url_path,
            "page created"
        );
        Ok(page)
    }

    /// Update title, slug and type-specific fields.
    pub async fn update_page(&self, id: Uuid, input: UpdatePage) -> ContentResult<Page> {
        let stored = self.require(id).await?;
        let mut errors = ValidationErrors::new();

        let title = input.title.unwrap_or_else(|| stored.title.clone());
        let slug = input.slug.unwrap_or_else(|| stored.slug.clone());
        let names = clean_title_and_slug(&title, Some(&slug))
            .map_err(|e| errors.merge(e))
            .ok();

        let content = input.content.unwrap_or_else(|| stored.content.clone());
        if content.page_type() != stored.page_type() {
            errors.add(
                "type",
                ErrorCode::Invalid,
                "The type of an existing page cannot be changed.",
            );
        }
        let content = self.clean_content(content, &mut errors).await?;

        let (Some((title, slug)), Some(content)) = (names, content) else {
            return Err(errors.into());
        };
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let page = Page {
            title,
            slug,
            content,
            changed: chrono::Utc::now().timestamp(),
            ..stored
        };
        let page = self.inner.store.update_page(page).await?;
        debug!(page_id = %page.id, "page updated");
        Ok(page)
    }

    pub async fn move_page(&self, id: Uuid, new_parent_id: Uuid) -> ContentResult<Page> {
        let page = self.inner.store.move_page(id, new_parent_id).await?;
        info!(page_id = %id, new_parent = %new_parent_id, url_path = %page.url_path, "page moved");
        Ok(page)
    }

    /// Delete a page and its subtree. Returns the removed ids.
    pub async fn delete_page(&self, id: Uuid) -> ContentResult<Vec<Uuid>> {
        let removed = self.inner.store.delete_page(id).await?;
        info!(page_id = %id, removed = removed.len(), "page deleted");
        Ok(removed)
    }

    pub async fn publish(&self, id: Uuid) -> ContentResult<Page> {
        self.set_flags(id, Some(true), None).await
    }

    pub async fn unpublish(&self, id: Uuid) -> ContentResult<Page> {
        self.set_flags(id, Some(false), None).await
    }

    /// Lift or apply view restrictions.
    pub async fn set_public(&self, id: Uuid, public: bool) -> ContentResult<Page> {
        self.set_flags(id, None, Some(public)).await
    }

    async fn set_flags(&self, id: Uuid, live: Option<bool>, public: Option<bool>) -> ContentResult<Page> {
        let mut page = self.require(id).await?;
        if page.is_root() {
            return Err(ContentError::RootImmutable("published or restricted"));
        }
        page.live = live.unwrap_or(page.live);
        page.public = public.unwrap_or(page.public);
        page.changed = chrono::Utc::now().timestamp();
        let page = self.inner.store.update_page(page).await?;
        info!(page_id = %id, live = page.live, public = page.public, "page visibility changed");
        Ok(page)
    }

    /// The site home: the first home page under the root.
    pub async fn site_home(&self) -> ContentResult<Option<Page>> {
        let root = self.root().await?;
        Ok(self
            .children(root.id)
            .await?
            .into_iter()
            .find(|p| p.page_type() == PageType::Home))
    }

    /// Resolve a request path against the site home. Only live, public pages
    /// are returned.
    pub async fn serve_path(&self, path: &str) -> ContentResult<Option<Page>> {
        let trimmed = path.trim_matches('/');
        let base = match self.site_home().await? {
            Some(home) => home.url_path,
            None => "/".to_string(),
        };
        let url_path = if trimmed.is_empty() {
            base
        } else {
            format!("{}/{trimmed}/", base.trim_end_matches('/'))
        };
        let Some(page) = self.inner.store.find_page_by_url(&url_path).await? else {
            return Ok(None);
        };
        Ok(self.is_visible(&page).await?.then_some(page))
    }

    /// Live, and neither the page nor any ancestor carries view restrictions.
    pub async fn is_visible(&self, page: &Page) -> ContentResult<bool> {
        if !page.is_visible() {
            return Ok(false);
        }
        let ancestors = self.inner.store.ancestors(page.id).await?;
        Ok(ancestors.iter().all(|a| a.public))
    }

    /// Gallery context: every live gallery entry in the site that is not
    /// under a view restriction.
    pub async fn gallery_context(&self, page: Page) -> ContentResult<GalleryContext> {
        let entries = self
            .list(PageFilter::of_type(PageType::DetailsGallery).visible())
            .await?;

        let mut images: HashMap<Uuid, Option<GalleryImage>> = HashMap::new();
        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(fields) = entry.content.as_details_gallery() else {
                continue;
            };
            let image = match fields.image {
                Some(image_id) => {
                    if !images.contains_key(&image_id) {
                        let resolved = self.inner.store.get_image(image_id).await?.map(|img| {
                            let url = self.inner.storage.public_url(&img.file);
                            GalleryImage::new(&img, url)
                        });
                        images.insert(image_id, resolved);
                    }
                    images.get(&image_id).cloned().flatten()
                }
                None => None,
            };
            items.push(GalleryItem {
                page: PageSummary::from(entry),
                caption: fields.caption.clone(),
                description: fields.description.clone(),
                image,
            });
        }

        Ok(GalleryContext { page, items })
    }

    /// Home context: the header with resolved category pages.
    pub async fn home_context(&self, page: Page) -> ContentResult<HomeContext> {
        let mut header = page
            .content
            .header()
            .map(|h| header_categories(h, &self.inner.authors))
            .unwrap_or_default();
        for category in &mut header {
            if let Some(target) = category.category_page_id {
                category.category_page = if let Some(p) = self.get(target).await?
                    && self.is_visible(&p).await?
                {
                    Some(PageSummary::from(&p))
                } else {
                    None
                };
            }
        }
        let children = self.visible_children(page.id).await?;
        Ok(HomeContext {
            page,
            header,
            children,
        })
    }

    /// Build the template context for a served page.
    pub async fn render(&self, page: Page) -> ContentResult<RenderedPage> {
        let template = template_for(page.page_type());
        let context = match page.page_type() {
            PageType::Home => PageContext::Home(self.home_context(page).await?),
            PageType::Gallery => PageContext::Gallery(self.gallery_context(page).await?),
            PageType::Root | PageType::DetailsGallery => {
                let children = self.visible_children(page.id).await?;
                PageContext::Plain(PlainContext { page, children })
            }
        };
        Ok(RenderedPage { template, context })
    }

    async fn visible_children(&self, id: Uuid) -> ContentResult<Vec<PageSummary>> {
        Ok(self
            .children(id)
            .await?
            .iter()
            .filter(|p| p.is_visible())
            .map(PageSummary::from)
            .collect())
    }

    /// Clean type-specific fields and check that referenced pages and images
    /// exist. Failures are added to `errors`.
    async fn clean_content(
        &self,
        content: PageContent,
        errors: &mut ValidationErrors,
    ) -> ContentResult<Option<PageContent>> {
        let content = match content.clean(&self.inner.blocks) {
            Ok(content) => content,
            Err(e) => {
                errors.merge(e);
                return Ok(None);
            }
        };

        match &content {
            PageContent::Home { header } => {
                if let Some(block) = self.inner.blocks.header_stream() {
                    for (path, page_id) in block.page_refs(header) {
                        if self.get(page_id).await?.is_none() {
                            errors.add(
                                join_path("header", &path),
                                ErrorCode::Reference,
                                format!("Page {page_id} does not exist."),
                            );
                        }
                    }
                }
            }
            PageContent::DetailsGallery(fields) => {
                if let Some(image_id) = fields.image
                    && self.inner.store.get_image(image_id).await?.is_none()
                {
                    errors.add(
                        "image",
                        ErrorCode::Reference,
                        format!("Image {image_id} does not exist."),
                    );
                }
            }
            PageContent::Root | PageContent::Gallery => {}
        }
        Ok(Some(content))
    }
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService")
            .field("blocks", &self.inner.blocks.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::media::storage::MemoryFileStorage;
    use crate::models::DetailsGallery;
    use crate::store::MemoryContentStore;

    fn service() -> PageService {
        let authors = Enumeration::from_pairs(&[("ana", "Ana"), ("luis", "Luis")]).unwrap();
        let blocks = BlockLibrary::with_standard_blocks(&authors).unwrap();
        PageService::new(
            Arc::new(MemoryContentStore::new()),
            Arc::new(blocks),
            authors,
            Arc::new(MemoryFileStorage::new("/media")),
        )
    }

    async fn site(service: &PageService) -> (Page, Page) {
        let root = service.root().await.unwrap();
        let home = service
            .create_page(root.id, NewPage::new("Home", PageContent::empty(PageType::Home)))
            .await
            .unwrap();
        let gallery = service
            .create_page(home.id, NewPage::new("Gallery", PageContent::Gallery))
            .await
            .unwrap();
        (home, gallery)
    }

    fn entry(title: &str) -> NewPage {
        NewPage::new(
            title,
            PageContent::DetailsGallery(DetailsGallery {
                caption: title.to_string(),
                ..Default::default()
            }),
        )
    }

    #[tokio::test]
    async fn title_and_content_errors_reported_together() {
        let service = service();
        let (_, gallery) = site(&service).await;
        let input = NewPage::new(
            "",
            PageContent::DetailsGallery(DetailsGallery {
                caption: "c".repeat(300),
                ..Default::default()
            }),
        );
        let err = service.create_page(gallery.id, input).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("title", ErrorCode::Required));
        assert!(errors.has("caption", ErrorCode::MaxLength));
    }

    #[tokio::test]
    async fn header_page_reference_must_exist() {
        let service = service();
        let (home, _) = site(&service).await;
        let header = json!([{"type": "category", "value": {
            "title": "Obras",
            "category_page": Uuid::now_v7().to_string(),
            "subcategories": [{"type": "subcategory", "value": {"title": "Casas"}}]
        }}]);
        let err = service
            .update_page(
                home.id,
                UpdatePage {
                    content: Some(PageContent::Home { header }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(
            err.validation_errors()
                .unwrap()
                .has("header.0.category_page", ErrorCode::Reference)
        );
    }

    #[tokio::test]
    async fn update_cannot_change_type() {
        let service = service();
        let (_, gallery) = site(&service).await;
        let err = service
            .update_page(
                gallery.id,
                UpdatePage {
                    content: Some(PageContent::Root),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("type", ErrorCode::Invalid));
    }

    #[tokio::test]
    async fn serve_path_resolves_against_home() {
        let service = service();
        let (home, gallery) = site(&service).await;
        let facade = service.create_page(gallery.id, entry("Facade")).await.unwrap();

        assert_eq!(service.serve_path("/").await.unwrap().unwrap().id, home.id);
        assert_eq!(service.serve_path("/gallery").await.unwrap().unwrap().id, gallery.id);
        assert_eq!(
            service.serve_path("/gallery/facade/").await.unwrap().unwrap().id,
            facade.id
        );

        service.unpublish(facade.id).await.unwrap();
        assert!(service.serve_path("/gallery/facade/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gallery_lists_only_visible_entries() {
        let service = service();
        let (_, gallery) = site(&service).await;
        service.create_page(gallery.id, entry("A")).await.unwrap();
        let b = service.create_page(gallery.id, entry("B")).await.unwrap();
        service
            .create_page(gallery.id, entry("C").draft())
            .await
            .unwrap();
        service.set_public(b.id, false).await.unwrap();

        let context = service.gallery_context(gallery).await.unwrap();
        let titles: Vec<&str> = context.items.iter().map(|i| i.page.title.as_str()).collect();
        assert_eq!(titles, vec!["A"]);
    }

    #[tokio::test]
    async fn restricted_gallery_hides_its_entries() {
        let service = service();
        let (home, gallery) = site(&service).await;
        let other = service
            .create_page(home.id, NewPage::new("Otra", PageContent::Gallery))
            .await
            .unwrap();
        service.create_page(gallery.id, entry("A")).await.unwrap();
        service.create_page(other.id, entry("B")).await.unwrap();
        assert!(service.serve_path("/gallery/a/").await.unwrap().is_some());

        service.set_public(gallery.id, false).await.unwrap();

        let context = service.gallery_context(other).await.unwrap();
        let titles: Vec<&str> = context.items.iter().map(|i| i.page.title.as_str()).collect();
        assert_eq!(titles, vec!["B"]);
        assert!(service.serve_path("/gallery/").await.unwrap().is_none());
        assert!(service.serve_path("/gallery/a/").await.unwrap().is_none());
        assert!(service.serve_path("/otra/b/").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_gallery_serializes_items_array() {
        let service = service();
        let (_, gallery) = site(&service).await;
        let context = service.gallery_context(gallery).await.unwrap();
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["items"], json!([]));
    }

    #[tokio::test]
    async fn root_visibility_is_fixed() {
        let service = service();
        let root = service.root().await.unwrap();
        assert!(matches!(
            service.unpublish(root.id).await,
            Err(ContentError::RootImmutable(_))
        ));
    }
}
