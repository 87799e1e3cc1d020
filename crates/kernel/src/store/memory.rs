//! In-memory content store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ContentStore, DeletedImage, PageFilter};
use crate::content::error::{ContentError, ContentResult};
use crate::content::tree::PageTree;
use crate::models::{
    ApiToken, CtaButton, CustomDocument, CustomImage, CustomRendition, Page, PageContent, User,
};

#[derive(Debug, Default)]
struct State {
    tree: PageTree,
    images: HashMap<Uuid, CustomImage>,
    renditions: HashMap<Uuid, CustomRendition>,
    documents: HashMap<Uuid, CustomDocument>,
    cta_buttons: HashMap<Uuid, CtaButton>,
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, ApiToken>,
}

/// Content store holding everything in process memory.
///
/// Each call takes the lock once and checks every precondition before the
/// first change, so a failed call leaves no partial state behind.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    state: RwLock<State>,
}

impl MemoryContentStore {
    /// Create a store holding only a fresh root page.
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_created<T: Clone>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> i64) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|i| key(i));
    items
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn root_page(&self) -> ContentResult<Page> {
        Ok(self.state.read().tree.root().clone())
    }

    async fn get_page(&self, id: Uuid) -> ContentResult<Option<Page>> {
        Ok(self.state.read().tree.get(id).cloned())
    }

    async fn find_page_by_url(&self, url_path: &str) -> ContentResult<Option<Page>> {
        Ok(self.state.read().tree.find_by_url_path(url_path).cloned())
    }

    async fn children(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        Ok(self
            .state
            .read()
            .tree
            .children(id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn ancestors(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        Ok(self
            .state
            .read()
            .tree
            .ancestors(id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn list_pages(&self, filter: PageFilter) -> ContentResult<Vec<Page>> {
        let state = self.state.read();
        let restricted: Vec<&str> = state
            .tree
            .pages()
            .filter(|p| !p.public)
            .map(|p| p.path.as_str())
            .collect();
        let mut pages: Vec<Page> = state
            .tree
            .pages()
            .filter(|p| filter.matches(p, &restricted))
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(pages)
    }

    async fn insert_page(&self, parent_id: Uuid, page: Page) -> ContentResult<Page> {
        let mut state = self.state.write();
        if let Some(image_id) = page.content.as_details_gallery().and_then(|d| d.image)
            && !state.images.contains_key(&image_id)
        {
            return Err(ContentError::not_found("image", image_id));
        }
        let page = state.tree.attach(parent_id, page)?.clone();
        debug!(page_id = %page.id, path = %page.path, "page attached");
        Ok(page)
    }

    async fn update_page(&self, page: Page) -> ContentResult<Page> {
        let mut state = self.state.write();
        if let Some(image_id) = page.content.as_details_gallery().and_then(|d| d.image)
            && !state.images.contains_key(&image_id)
        {
            return Err(ContentError::not_found("image", image_id));
        }
        Ok(state.tree.replace(page)?.clone())
    }

    async fn move_page(&self, id: Uuid, new_parent_id: Uuid) -> ContentResult<Page> {
        Ok(self
            .state
            .write()
            .tree
            .move_subtree(id, new_parent_id)?
            .clone())
    }

    async fn delete_page(&self, id: Uuid) -> ContentResult<Vec<Uuid>> {
        let mut state = self.state.write();
        let removed: Vec<Uuid> = state
            .tree
            .remove_subtree(id)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        for button in state.cta_buttons.values_mut() {
            if button.page_id.is_some_and(|pid| removed.contains(&pid)) {
                button.page_id = None;
            }
        }
        Ok(removed)
    }

    async fn insert_image(&self, image: CustomImage) -> ContentResult<CustomImage> {
        self.state.write().images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn get_image(&self, id: Uuid) -> ContentResult<Option<CustomImage>> {
        Ok(self.state.read().images.get(&id).cloned())
    }

    async fn list_images(&self) -> ContentResult<Vec<CustomImage>> {
        let state = self.state.read();
        Ok(sorted_by_created(state.images.values().cloned(), |i| i.created))
    }

    async fn update_image(&self, image: CustomImage) -> ContentResult<CustomImage> {
        let mut state = self.state.write();
        match state.images.get_mut(&image.id) {
            Some(stored) => {
                *stored = image.clone();
                Ok(image)
            }
            None => Err(ContentError::not_found("image", image.id)),
        }
    }

    async fn delete_image(&self, id: Uuid) -> ContentResult<Option<DeletedImage>> {
        let mut state = self.state.write();
        let Some(image) = state.images.remove(&id) else {
            return Ok(None);
        };

        let rendition_ids: Vec<Uuid> = state
            .renditions
            .values()
            .filter(|r| r.image_id == id)
            .map(|r| r.id)
            .collect();
        let renditions = rendition_ids
            .iter()
            .filter_map(|rid| state.renditions.remove(rid))
            .collect();

        let using: Vec<Uuid> = state
            .tree
            .pages()
            .filter(|p| p.content.as_details_gallery().and_then(|d| d.image) == Some(id))
            .map(|p| p.id)
            .collect();
        for page_id in using {
            if let Some(page) = state.tree.get_mut(page_id)
                && let PageContent::DetailsGallery(fields) = &mut page.content
            {
                fields.image = None;
            }
        }

        Ok(Some(DeletedImage { image, renditions }))
    }

    async fn find_rendition(
        &self,
        image_id: Uuid,
        filter_spec: &str,
        focal_point_key: &str,
    ) -> ContentResult<Option<CustomRendition>> {
        Ok(self
            .state
            .read()
            .renditions
            .values()
            .find(|r| r.identity() == (image_id, filter_spec, focal_point_key))
            .cloned())
    }

    async fn insert_rendition(&self, rendition: CustomRendition) -> ContentResult<CustomRendition> {
        let mut state = self.state.write();
        if !state.images.contains_key(&rendition.image_id) {
            return Err(ContentError::not_found("image", rendition.image_id));
        }
        if state
            .renditions
            .values()
            .any(|r| r.identity() == rendition.identity())
        {
            return Err(ContentError::UniqueViolation {
                constraint: "custom_rendition_image_filter_focal_key".to_string(),
            });
        }
        state.renditions.insert(rendition.id, rendition.clone());
        Ok(rendition)
    }

    async fn list_renditions(&self, image_id: Uuid) -> ContentResult<Vec<CustomRendition>> {
        let state = self.state.read();
        Ok(sorted_by_created(
            state
                .renditions
                .values()
                .filter(|r| r.image_id == image_id)
                .cloned(),
            |r| r.created,
        ))
    }

    async fn insert_document(&self, document: CustomDocument) -> ContentResult<CustomDocument> {
        self.state
            .write()
            .documents
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>> {
        Ok(self.state.read().documents.get(&id).cloned())
    }

    async fn list_documents(&self) -> ContentResult<Vec<CustomDocument>> {
        let state = self.state.read();
        Ok(sorted_by_created(state.documents.values().cloned(), |d| d.created))
    }

    async fn delete_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>> {
        Ok(self.state.write().documents.remove(&id))
    }

    async fn insert_cta_button(&self, button: CtaButton) -> ContentResult<CtaButton> {
        let mut state = self.state.write();
        if let Some(page_id) = button.page_id
            && state.tree.get(page_id).is_none()
        {
            return Err(ContentError::not_found("page", page_id));
        }
        state.cta_buttons.insert(button.id, button.clone());
        Ok(button)
    }

    async fn get_cta_button(&self, id: Uuid) -> ContentResult<Option<CtaButton>> {
        Ok(self.state.read().cta_buttons.get(&id).cloned())
    }

    async fn list_cta_buttons(&self) -> ContentResult<Vec<CtaButton>> {
        let mut buttons: Vec<CtaButton> =
            self.state.read().cta_buttons.values().cloned().collect();
        buttons.sort_by_key(|b| b.id);
        Ok(buttons)
    }

    async fn delete_cta_button(&self, id: Uuid) -> ContentResult<bool> {
        Ok(self.state.write().cta_buttons.remove(&id).is_some())
    }

    async fn insert_user(&self, user: User) -> ContentResult<User> {
        let mut state = self.state.write();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(ContentError::UniqueViolation {
                constraint: "users_username_key".to_string(),
            });
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> ContentResult<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn insert_api_token(&self, token: ApiToken) -> ContentResult<ApiToken> {
        let mut state = self.state.write();
        if !state.users.contains_key(&token.user_id) {
            return Err(ContentError::not_found("user", token.user_id));
        }
        state.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> ContentResult<Option<User>> {
        let state = self.state.read();
        Ok(state
            .tokens
            .get(token_hash)
            .and_then(|t| state.users.get(&t.user_id))
            .filter(|u| u.is_active)
            .cloned())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::page_type::PageType;
    use crate::content::validation::ErrorCode;
    use crate::models::DetailsGallery;

    fn image() -> CustomImage {
        CustomImage {
            id: Uuid::now_v7(),
            title: "Facade".into(),
            file: "memory://original_images/facade.png".into(),
            width: 10,
            height: 10,
            file_size: 1,
            file_hash: String::new(),
            focal_point_x: None,
            focal_point_y: None,
            focal_point_width: None,
            focal_point_height: None,
            alt: String::new(),
            created: 0,
        }
    }

    fn rendition(image_id: Uuid, spec: &str) -> CustomRendition {
        CustomRendition {
            id: Uuid::now_v7(),
            image_id,
            filter_spec: spec.into(),
            focal_point_key: String::new(),
            file: format!("memory://images/{spec}.png"),
            width: 5,
            height: 5,
            created: 0,
        }
    }

    async fn gallery_entry(store: &MemoryContentStore, image: Option<Uuid>) -> (Uuid, Uuid) {
        let root = store.root_page().await.unwrap();
        let home = store
            .insert_page(
                root.id,
                Page::unattached("Home".into(), "home".into(), PageContent::empty(PageType::Home)),
            )
            .await
            .unwrap();
        let gallery = store
            .insert_page(
                home.id,
                Page::unattached("Gallery".into(), "gallery".into(), PageContent::Gallery),
            )
            .await
            .unwrap();
        let entry = store
            .insert_page(
                gallery.id,
                Page::unattached(
                    "Facade".into(),
                    "facade".into(),
                    PageContent::DetailsGallery(DetailsGallery {
                        image,
                        ..Default::default()
                    }),
                ),
            )
            .await
            .unwrap();
        (gallery.id, entry.id)
    }

    #[tokio::test]
    async fn deleting_image_clears_references_and_renditions() {
        let store = MemoryContentStore::new();
        let img = store.insert_image(image()).await.unwrap();
        store.insert_rendition(rendition(img.id, "width-5")).await.unwrap();
        let (_, entry) = gallery_entry(&store, Some(img.id)).await;

        let deleted = store.delete_image(img.id).await.unwrap().unwrap();
        assert_eq!(deleted.renditions.len(), 1);

        let page = store.get_page(entry).await.unwrap().unwrap();
        assert_eq!(page.content.as_details_gallery().unwrap().image, None);
        assert!(store.list_renditions(img.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_rendition_is_unique_violation() {
        let store = MemoryContentStore::new();
        let img = store.insert_image(image()).await.unwrap();
        store.insert_rendition(rendition(img.id, "fill-5x5")).await.unwrap();
        let err = store
            .insert_rendition(rendition(img.id, "fill-5x5"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.list_renditions(img.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_page_clears_cta_buttons() {
        let store = MemoryContentStore::new();
        let (gallery, entry) = gallery_entry(&store, None).await;
        let button = store
            .insert_cta_button(CtaButton {
                id: Uuid::now_v7(),
                label: "Ver".into(),
                link: String::new(),
                page_id: Some(entry),
            })
            .await
            .unwrap();

        let removed = store.delete_page(gallery).await.unwrap();
        assert_eq!(removed.len(), 2);
        let button = store.get_cta_button(button.id).await.unwrap().unwrap();
        assert_eq!(button.page_id, None);
    }

    #[tokio::test]
    async fn failed_insert_leaves_tree_unchanged() {
        let store = MemoryContentStore::new();
        let root = store.root_page().await.unwrap();
        let err = store
            .insert_page(
                root.id,
                Page::unattached("Gallery".into(), "gallery".into(), PageContent::Gallery),
            )
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("parent", ErrorCode::Placement));
        assert!(store.children(root.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn visible_filter_excludes_drafts() {
        let store = MemoryContentStore::new();
        let (_, entry) = gallery_entry(&store, None).await;
        let filter = PageFilter::of_type(PageType::DetailsGallery).visible();
        assert_eq!(store.list_pages(filter).await.unwrap().len(), 1);

        let mut page = store.get_page(entry).await.unwrap().unwrap();
        page.live = false;
        store.update_page(page).await.unwrap();
        assert!(store.list_pages(filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_lookup_requires_active_user() {
        let store = MemoryContentStore::new();
        let mut user = crate::models::CreateUser {
            username: "ana".into(),
            ..Default::default()
        }
        .into_user();
        store.insert_user(user.clone()).await.unwrap();
        let (token, raw) = ApiToken::issue(user.id, "cli");
        store.insert_api_token(token).await.unwrap();

        let hash = crate::models::api_token::hash_token(&raw);
        assert!(store.find_user_by_token_hash(&hash).await.unwrap().is_some());

        user.is_active = false;
        store.state.write().users.insert(user.id, user);
        assert!(store.find_user_by_token_hash(&hash).await.unwrap().is_none());
    }
}
