//! PostgreSQL content store.
//!
//! Pages live in `page` plus one table per page type. Every write runs in a
//! single transaction; tree writes lock the affected parent row first so
//! sibling paths are computed without races.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ContentStore, DeletedImage, PageFilter};
use crate::content::error::{ContentError, ContentResult};
use crate::content::page_type::PageType;
use crate::content::tree::{
    check_placement, child_url_path, depth_of, is_descendant, next_child_path,
};
use crate::content::validation::ErrorCode;
use crate::models::{
    ApiToken, CtaButton, CustomDocument, CustomImage, CustomRendition, DetailsGallery, Page,
    PageContent, User,
};

const PAGE_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.path, p.depth, p.parent_id, p.url_path, p.page_type,
           p.live, p.public, p.created, p.changed,
           h.header, d.image_id, d.caption, d.description
    FROM page p
    LEFT JOIN home_page h ON h.page_id = p.id
    LEFT JOIN details_gallery_page d ON d.page_id = p.id
"#;

const SLUG_CONSTRAINT: &str = "page_parent_slug_key";

/// Joined page row.
#[derive(Debug, sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    title: String,
    slug: String,
    path: String,
    depth: i32,
    parent_id: Option<Uuid>,
    url_path: String,
    page_type: String,
    live: bool,
    public: bool,
    created: i64,
    changed: i64,
    header: Option<Value>,
    image_id: Option<Uuid>,
    caption: Option<String>,
    description: Option<String>,
}

impl TryFrom<PageRow> for Page {
    type Error = ContentError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        let page_type: PageType = row
            .page_type
            .parse()
            .map_err(|e| ContentError::Other(anyhow::Error::new(e)))?;
        let content = match page_type {
            PageType::Root => PageContent::Root,
            PageType::Home => PageContent::Home {
                header: row.header.unwrap_or_else(|| Value::Array(Vec::new())),
            },
            PageType::Gallery => PageContent::Gallery,
            PageType::DetailsGallery => PageContent::DetailsGallery(DetailsGallery {
                image: row.image_id,
                caption: row.caption.unwrap_or_default(),
                description: row.description.unwrap_or_default(),
            }),
        };
        Ok(Page {
            id: row.id,
            title: row.title,
            slug: row.slug,
            path: row.path,
            depth: row.depth,
            parent_id: row.parent_id,
            url_path: row.url_path,
            live: row.live,
            public: row.public,
            created: row.created,
            changed: row.changed,
            content,
        })
    }
}

fn into_pages(rows: Vec<PageRow>) -> ContentResult<Vec<Page>> {
    rows.into_iter().map(Page::try_from).collect()
}

/// Map a database error, surfacing unique violations.
fn map_db_error(error: sqlx::Error) -> ContentError {
    if let sqlx::Error::Database(db) = &error
        && db.is_unique_violation()
    {
        let constraint = db.constraint().unwrap_or_default().to_string();
        if constraint == SLUG_CONSTRAINT {
            return ContentError::field(
                "slug",
                ErrorCode::Invalid,
                "This slug is already in use within the context of its parent page.",
            );
        }
        return ContentError::UniqueViolation { constraint };
    }
    ContentError::Database(error)
}

/// Content store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the root page if the tree is empty.
    pub async fn ensure_root(&self) -> ContentResult<Page> {
        let mut tx = self.pool.begin().await?;
        // Serialise concurrent first starts.
        sqlx::query("LOCK TABLE page IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        if let Some(root) = fetch_root(&mut tx).await? {
            tx.commit().await?;
            return Ok(root);
        }
        let root = Page::root();
        insert_page_row(&mut tx, &root).await?;
        tx.commit().await?;
        info!(page_id = %root.id, "created root page");
        Ok(root)
    }

    async fn fetch_page(&self, id: Uuid) -> ContentResult<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!("{PAGE_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Page::try_from).transpose()
    }
}

impl std::fmt::Debug for PgContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgContentStore").finish()
    }
}

async fn fetch_root(tx: &mut Transaction<'_, Postgres>) -> ContentResult<Option<Page>> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        "{PAGE_SELECT} WHERE p.parent_id IS NULL ORDER BY p.path LIMIT 1"
    ))
    .fetch_optional(&mut **tx)
    .await?;
    row.map(Page::try_from).transpose()
}

/// Load and row-lock a page.
async fn lock_page(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> ContentResult<Page> {
    let row = sqlx::query_as::<_, PageRow>(&format!("{PAGE_SELECT} WHERE p.id = $1 FOR UPDATE OF p"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ContentError::not_found("page", id))?;
    Page::try_from(row)
}

async fn child_paths(tx: &mut Transaction<'_, Postgres>, parent_id: Uuid) -> ContentResult<Vec<String>> {
    let paths: Vec<(String,)> = sqlx::query_as("SELECT path FROM page WHERE parent_id = $1")
        .bind(parent_id)
        .fetch_all(&mut **tx)
        .await?;
    Ok(paths.into_iter().map(|(p,)| p).collect())
}

async fn ensure_image_exists(
    tx: &mut Transaction<'_, Postgres>,
    content: &PageContent,
) -> ContentResult<()> {
    let Some(image_id) = content.as_details_gallery().and_then(|d| d.image) else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM custom_image WHERE id = $1)")
        .bind(image_id)
        .fetch_one(&mut **tx)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ContentError::not_found("image", image_id))
    }
}

async fn insert_page_row(tx: &mut Transaction<'_, Postgres>, page: &Page) -> ContentResult<()> {
    sqlx::query(
        r#"
        INSERT INTO page (id, title, slug, path, depth, parent_id, url_path, page_type,
                          live, public, created, changed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(page.id)
    .bind(&page.title)
    .bind(&page.slug)
    .bind(&page.path)
    .bind(page.depth)
    .bind(page.parent_id)
    .bind(&page.url_path)
    .bind(page.page_type().machine_name())
    .bind(page.live)
    .bind(page.public)
    .bind(page.created)
    .bind(page.changed)
    .execute(&mut **tx)
    .await
    .map_err(map_db_error)?;
    upsert_content(tx, page).await
}

/// Write the per-type row of a page.
async fn upsert_content(tx: &mut Transaction<'_, Postgres>, page: &Page) -> ContentResult<()> {
    match &page.content {
        PageContent::Root => {}
        PageContent::Home { header } => {
            sqlx::query(
                r#"
                INSERT INTO home_page (page_id, header) VALUES ($1, $2)
                ON CONFLICT (page_id) DO UPDATE SET header = EXCLUDED.header
                "#,
            )
            .bind(page.id)
            .bind(header)
            .execute(&mut **tx)
            .await?;
        }
        PageContent::Gallery => {
            sqlx::query("INSERT INTO gallery_page (page_id) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(page.id)
                .execute(&mut **tx)
                .await?;
        }
        PageContent::DetailsGallery(fields) => {
            sqlx::query(
                r#"
                INSERT INTO details_gallery_page (page_id, image_id, caption, description)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (page_id) DO UPDATE
                    SET image_id = EXCLUDED.image_id,
                        caption = EXCLUDED.caption,
                        description = EXCLUDED.description
                "#,
            )
            .bind(page.id)
            .bind(fields.image)
            .bind(&fields.caption)
            .bind(&fields.description)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

/// Rewrite path, depth and url_path of every page whose path starts with `old_path`.
async fn rebase_subtree(
    tx: &mut Transaction<'_, Postgres>,
    old_path: &str,
    new_path: &str,
    old_url: &str,
    new_url: &str,
) -> ContentResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE page
        SET path = $2 || substr(path, $3),
            depth = char_length($2 || substr(path, $3)) / 4,
            url_path = $4 || substr(url_path, $5)
        WHERE path LIKE $1 || '%'
        "#,
    )
    .bind(old_path)
    .bind(new_path)
    .bind(old_path.chars().count() as i32 + 1)
    .bind(new_url)
    .bind(old_url.chars().count() as i32 + 1)
    .execute(&mut **tx)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn root_page(&self) -> ContentResult<Page> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "{PAGE_SELECT} WHERE p.parent_id IS NULL ORDER BY p.path LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Page::try_from(row),
            None => self.ensure_root().await,
        }
    }

    async fn get_page(&self, id: Uuid) -> ContentResult<Option<Page>> {
        self.fetch_page(id).await
    }

    async fn find_page_by_url(&self, url_path: &str) -> ContentResult<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!("{PAGE_SELECT} WHERE p.url_path = $1"))
            .bind(url_path)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Page::try_from).transpose()
    }

    async fn children(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "{PAGE_SELECT} WHERE p.parent_id = $1 ORDER BY p.path"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        into_pages(rows)
    }

    async fn ancestors(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        let Some(page) = self.fetch_page(id).await? else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "{PAGE_SELECT} WHERE $1 LIKE p.path || '%' AND p.path <> $1 ORDER BY p.path"
        ))
        .bind(&page.path)
        .fetch_all(&self.pool)
        .await?;
        into_pages(rows)
    }

    async fn list_pages(&self, filter: PageFilter) -> ContentResult<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            r#"{PAGE_SELECT}
            WHERE ($1::text IS NULL OR p.page_type = $1)
              AND (NOT $2 OR (p.live AND NOT EXISTS (
                    SELECT 1 FROM page r
                    WHERE NOT r.public AND p.path LIKE r.path || '%'
              )))
            ORDER BY p.path"#
        ))
        .bind(filter.page_type.map(|t| t.machine_name()))
        .bind(filter.visible_only)
        .fetch_all(&self.pool)
        .await?;
        into_pages(rows)
    }

    async fn insert_page(&self, parent_id: Uuid, mut page: Page) -> ContentResult<Page> {
        let mut tx = self.pool.begin().await?;
        let parent = lock_page(&mut tx, parent_id).await?;
        check_placement(page.page_type(), &parent)?;
        ensure_image_exists(&mut tx, &page.content).await?;

        let siblings = child_paths(&mut tx, parent_id).await?;
        let path = next_child_path(&parent.path, siblings.iter().map(String::as_str))?;
        page.depth = depth_of(&path);
        page.path = path;
        page.parent_id = Some(parent_id);
        page.url_path = child_url_path(&parent.url_path, &page.slug);

        insert_page_row(&mut tx, &page).await?;
        tx.commit().await?;

        debug!(page_id = %page.id, path = %page.path, "page attached");
        Ok(page)
    }

    async fn update_page(&self, mut page: Page) -> ContentResult<Page> {
        let mut tx = self.pool.begin().await?;
        let stored = lock_page(&mut tx, page.id).await?;
        if stored.page_type() != page.page_type() {
            return Err(ContentError::field(
                "type",
                ErrorCode::Invalid,
                "The type of an existing page cannot be changed.",
            ));
        }
        ensure_image_exists(&mut tx, &page.content).await?;

        let new_url = match stored.parent_id {
            Some(parent_id) => {
                let parent = lock_page(&mut tx, parent_id).await?;
                child_url_path(&parent.url_path, &page.slug)
            }
            None => stored.url_path.clone(),
        };
        page.path = stored.path.clone();
        page.depth = stored.depth;
        page.parent_id = stored.parent_id;
        page.created = stored.created;

        if new_url != stored.url_path {
            rebase_subtree(&mut tx, &stored.path, &stored.path, &stored.url_path, &new_url).await?;
        }
        page.url_path = new_url;

        sqlx::query(
            r#"
            UPDATE page
            SET title = $2, slug = $3, url_path = $4, live = $5, public = $6, changed = $7
            WHERE id = $1
            "#,
        )
        .bind(page.id)
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.url_path)
        .bind(page.live)
        .bind(page.public)
        .bind(page.changed)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;
        upsert_content(&mut tx, &page).await?;

        tx.commit().await?;
        Ok(page)
    }

    async fn move_page(&self, id: Uuid, new_parent_id: Uuid) -> ContentResult<Page> {
        let mut tx = self.pool.begin().await?;
        let page = lock_page(&mut tx, id).await?;
        if page.is_root() {
            return Err(ContentError::RootImmutable("moved"));
        }
        let new_parent = lock_page(&mut tx, new_parent_id).await?;
        if new_parent.id == id || is_descendant(&new_parent.path, &page.path) {
            return Err(ContentError::field(
                "parent",
                ErrorCode::Placement,
                "A page cannot be moved under itself or one of its descendants.",
            ));
        }
        check_placement(page.page_type(), &new_parent)?;
        if page.parent_id == Some(new_parent_id) {
            tx.commit().await?;
            return Ok(page);
        }

        let siblings = child_paths(&mut tx, new_parent_id).await?;
        let new_path = next_child_path(&new_parent.path, siblings.iter().map(String::as_str))?;
        let new_url = child_url_path(&new_parent.url_path, &page.slug);
        let moved = rebase_subtree(&mut tx, &page.path, &new_path, &page.url_path, &new_url).await?;

        sqlx::query("UPDATE page SET parent_id = $2, changed = $3 WHERE id = $1")
            .bind(id)
            .bind(new_parent_id)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        tx.commit().await?;

        debug!(page_id = %id, new_parent = %new_parent_id, pages = moved, "subtree moved");
        self.fetch_page(id)
            .await?
            .ok_or_else(|| ContentError::not_found("page", id))
    }

    async fn delete_page(&self, id: Uuid) -> ContentResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;
        let page = lock_page(&mut tx, id).await?;
        if page.is_root() {
            return Err(ContentError::RootImmutable("deleted"));
        }
        let removed: Vec<(Uuid,)> =
            sqlx::query_as("DELETE FROM page WHERE path LIKE $1 || '%' RETURNING id")
                .bind(&page.path)
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(removed.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_image(&self, image: CustomImage) -> ContentResult<CustomImage> {
        let image = sqlx::query_as::<_, CustomImage>(
            r#"
            INSERT INTO custom_image (id, title, file, width, height, file_size, file_hash,
                                      focal_point_x, focal_point_y, focal_point_width,
                                      focal_point_height, alt, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(image.id)
        .bind(&image.title)
        .bind(&image.file)
        .bind(image.width)
        .bind(image.height)
        .bind(image.file_size)
        .bind(&image.file_hash)
        .bind(image.focal_point_x)
        .bind(image.focal_point_y)
        .bind(image.focal_point_width)
        .bind(image.focal_point_height)
        .bind(&image.alt)
        .bind(image.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(image)
    }

    async fn get_image(&self, id: Uuid) -> ContentResult<Option<CustomImage>> {
        Ok(
            sqlx::query_as::<_, CustomImage>("SELECT * FROM custom_image WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_images(&self) -> ContentResult<Vec<CustomImage>> {
        Ok(
            sqlx::query_as::<_, CustomImage>("SELECT * FROM custom_image ORDER BY created, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn update_image(&self, image: CustomImage) -> ContentResult<CustomImage> {
        sqlx::query_as::<_, CustomImage>(
            r#"
            UPDATE custom_image
            SET title = $2, alt = $3, focal_point_x = $4, focal_point_y = $5,
                focal_point_width = $6, focal_point_height = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(image.id)
        .bind(&image.title)
        .bind(&image.alt)
        .bind(image.focal_point_x)
        .bind(image.focal_point_y)
        .bind(image.focal_point_width)
        .bind(image.focal_point_height)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ContentError::not_found("image", image.id))
    }

    async fn delete_image(&self, id: Uuid) -> ContentResult<Option<DeletedImage>> {
        let mut tx = self.pool.begin().await?;
        let renditions = sqlx::query_as::<_, CustomRendition>(
            "SELECT * FROM custom_rendition WHERE image_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let image = sqlx::query_as::<_, CustomImage>(
            "DELETE FROM custom_image WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(image.map(|image| DeletedImage { image, renditions }))
    }

    async fn find_rendition(
        &self,
        image_id: Uuid,
        filter_spec: &str,
        focal_point_key: &str,
    ) -> ContentResult<Option<CustomRendition>> {
        Ok(sqlx::query_as::<_, CustomRendition>(
            r#"
            SELECT * FROM custom_rendition
            WHERE image_id = $1 AND filter_spec = $2 AND focal_point_key = $3
            "#,
        )
        .bind(image_id)
        .bind(filter_spec)
        .bind(focal_point_key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_rendition(&self, rendition: CustomRendition) -> ContentResult<CustomRendition> {
        let rendition = sqlx::query_as::<_, CustomRendition>(
            r#"
            INSERT INTO custom_rendition (id, image_id, filter_spec, focal_point_key, file,
                                          width, height, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(rendition.id)
        .bind(rendition.image_id)
        .bind(&rendition.filter_spec)
        .bind(&rendition.focal_point_key)
        .bind(&rendition.file)
        .bind(rendition.width)
        .bind(rendition.height)
        .bind(rendition.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rendition)
    }

    async fn list_renditions(&self, image_id: Uuid) -> ContentResult<Vec<CustomRendition>> {
        Ok(sqlx::query_as::<_, CustomRendition>(
            "SELECT * FROM custom_rendition WHERE image_id = $1 ORDER BY created, id",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_document(&self, document: CustomDocument) -> ContentResult<CustomDocument> {
        let document = sqlx::query_as::<_, CustomDocument>(
            r#"
            INSERT INTO custom_document (id, title, file, filename, mime_type, file_size,
                                         file_hash, collection, tags, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.file)
        .bind(&document.filename)
        .bind(&document.mime_type)
        .bind(document.file_size)
        .bind(&document.file_hash)
        .bind(&document.collection)
        .bind(&document.tags)
        .bind(document.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>> {
        Ok(
            sqlx::query_as::<_, CustomDocument>("SELECT * FROM custom_document WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_documents(&self) -> ContentResult<Vec<CustomDocument>> {
        Ok(sqlx::query_as::<_, CustomDocument>(
            "SELECT * FROM custom_document ORDER BY created, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_document(&self, id: Uuid) -> ContentResult<Option<CustomDocument>> {
        Ok(sqlx::query_as::<_, CustomDocument>(
            "DELETE FROM custom_document WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_cta_button(&self, button: CtaButton) -> ContentResult<CtaButton> {
        if let Some(page_id) = button.page_id
            && self.fetch_page(page_id).await?.is_none()
        {
            return Err(ContentError::not_found("page", page_id));
        }
        let button = sqlx::query_as::<_, CtaButton>(
            r#"
            INSERT INTO cta_button_default (id, label, link, page_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(button.id)
        .bind(&button.label)
        .bind(&button.link)
        .bind(button.page_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(button)
    }

    async fn get_cta_button(&self, id: Uuid) -> ContentResult<Option<CtaButton>> {
        Ok(
            sqlx::query_as::<_, CtaButton>("SELECT * FROM cta_button_default WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_cta_buttons(&self) -> ContentResult<Vec<CtaButton>> {
        Ok(
            sqlx::query_as::<_, CtaButton>("SELECT * FROM cta_button_default ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn delete_cta_button(&self, id: Uuid) -> ContentResult<bool> {
        let result = sqlx::query("DELETE FROM cta_button_default WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_user(&self, user: User) -> ContentResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, is_staff,
                               is_superuser, is_active, permissions, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.is_active)
        .bind(&user.permissions)
        .bind(user.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> ContentResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_api_token(&self, token: ApiToken) -> ContentResult<ApiToken> {
        let token = sqlx::query_as::<_, ApiToken>(
            r#"
            INSERT INTO api_token (id, user_id, name, token_hash, created)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.name)
        .bind(&token.token_hash)
        .bind(token.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(token)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> ContentResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN api_token t ON t.user_id = u.id
            WHERE t.token_hash = $1 AND u.is_active
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn healthy(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}
