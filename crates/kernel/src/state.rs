//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::content::{BlockLibrary, ContentResult, PageService};
use crate::db;
use crate::media::{
    DocumentService, FileStorage, ImageService, LocalFileStorage, MemoryFileStorage,
};
use crate::models::{ApiToken, CreateUser, User};
use crate::store::{ContentStore, MemoryContentStore, PgContentStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Backend for every persisted entity.
    store: Arc<dyn ContentStore>,

    /// Where uploaded files live.
    storage: Arc<dyn FileStorage>,

    /// Structured-content blocks built over the configured authors.
    blocks: Arc<BlockLibrary>,

    pages: PageService,
    images: ImageService,
    documents: DocumentService,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// With `DATABASE_URL` set, connects to PostgreSQL, applies migrations
    /// and makes sure the tree root exists. Otherwise everything lives in
    /// memory.
    pub async fn new(config: &Config) -> Result<Self> {
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            config.media_dir.clone(),
            config.media_url.clone(),
        ));

        let store: Arc<dyn ContentStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;
                db::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;
                let store = PgContentStore::new(pool);
                let root = store
                    .ensure_root()
                    .await
                    .context("failed to create the root page")?;
                info!(root_id = %root.id, "connected to PostgreSQL");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set, using the in-memory store");
                Arc::new(MemoryContentStore::new())
            }
        };

        Self::from_parts(config.clone(), store, storage)
    }

    /// In-memory state with in-memory file storage.
    pub fn in_memory(config: Config) -> Result<Self> {
        let storage = Arc::new(MemoryFileStorage::new(config.media_url.clone()));
        Self::from_parts(config, Arc::new(MemoryContentStore::new()), storage)
    }

    /// Assemble state from an existing store and file storage.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn ContentStore>,
        storage: Arc<dyn FileStorage>,
    ) -> Result<Self> {
        let blocks = Arc::new(
            BlockLibrary::with_standard_blocks(&config.author_choices)
                .context("failed to build the block library")?,
        );
        let pages = PageService::new(
            store.clone(),
            blocks.clone(),
            config.author_choices.clone(),
            storage.clone(),
        );
        let images = ImageService::new(store.clone(), storage.clone());
        let documents = DocumentService::new(store.clone(), storage.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                storage,
                blocks,
                pages,
                images,
                documents,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.inner.storage
    }

    pub fn blocks(&self) -> &BlockLibrary {
        &self.inner.blocks
    }

    pub fn pages(&self) -> &PageService {
        &self.inner.pages
    }

    pub fn images(&self) -> &ImageService {
        &self.inner.images
    }

    pub fn documents(&self) -> &DocumentService {
        &self.inner.documents
    }

    /// Create a user and issue it an API token. Returns the raw token,
    /// which is not stored.
    pub async fn create_user(
        &self,
        input: CreateUser,
        token_name: &str,
    ) -> ContentResult<(User, String)> {
        let user = self.inner.store.insert_user(input.clean()?.into_user()).await?;
        let (token, raw) = ApiToken::issue(user.id, token_name);
        self.inner.store.insert_api_token(token).await?;
        info!(user_id = %user.id, username = %user.username, staff = user.is_staff, "user created");
        Ok((user, raw))
    }

    /// Check if the backing store is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.inner.store.healthy().await
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
