//! Page model.
//!
//! A page is a node in the site tree. Its position (`path`, `depth`,
//! `parent_id`, `url_path`) is owned by the tree; its type-specific fields
//! live in [`PageContent`], a tagged variant over the page types.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::blocks::{BlockLibrary, HEADER_STREAM};
use crate::content::page_type::PageType;
use crate::content::validation::{ErrorCode, ValidationErrors};

/// Maximum length of page titles and slugs.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum length of a gallery entry caption.
pub const MAX_CAPTION_LENGTH: usize = 255;

#[allow(clippy::expect_used)]
static VALID_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("valid regex literal"));

/// Page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Page title.
    pub title: String,

    /// URL segment, unique among siblings.
    pub slug: String,

    /// Materialized tree path (4 characters per level).
    pub path: String,

    /// Tree depth; the root is 1.
    pub depth: i32,

    /// Parent page (None only for the root).
    pub parent_id: Option<Uuid>,

    /// Full URL path from the root, e.g. `/home/gallery/facade/`.
    pub url_path: String,

    /// Published flag.
    pub live: bool,

    /// Whether the page is visible without view restrictions.
    pub public: bool,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,

    /// Type-specific fields.
    #[serde(flatten)]
    pub content: PageContent,
}

/// Type-specific page fields, tagged by page type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageContent {
    #[serde(rename = "page")]
    Root,

    #[serde(rename = "home_page")]
    Home {
        /// Header navigation stream (cleaned structured content).
        #[serde(default = "empty_stream")]
        header: Value,
    },

    #[serde(rename = "gallery_page")]
    Gallery,

    #[serde(rename = "details_gallery_page")]
    DetailsGallery(DetailsGallery),
}

/// Fields of a gallery entry page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsGallery {
    /// Image shown for this entry; cleared when the image is deleted.
    #[serde(default)]
    pub image: Option<Uuid>,

    /// Caption shown on the gallery listing.
    #[serde(default)]
    pub caption: String,

    #[serde(default)]
    pub description: String,
}

fn empty_stream() -> Value {
    Value::Array(Vec::new())
}

impl PageContent {
    /// The page type this content belongs to.
    pub fn page_type(&self) -> PageType {
        match self {
            PageContent::Root => PageType::Root,
            PageContent::Home { .. } => PageType::Home,
            PageContent::Gallery => PageType::Gallery,
            PageContent::DetailsGallery(_) => PageType::DetailsGallery,
        }
    }

    /// Empty content for a page type.
    pub fn empty(page_type: PageType) -> Self {
        match page_type {
            PageType::Root => PageContent::Root,
            PageType::Home => PageContent::Home {
                header: empty_stream(),
            },
            PageType::Gallery => PageContent::Gallery,
            PageType::DetailsGallery => PageContent::DetailsGallery(DetailsGallery::default()),
        }
    }

    /// Validate and normalise the type-specific fields.
    pub fn clean(self, blocks: &BlockLibrary) -> Result<Self, ValidationErrors> {
        match self {
            PageContent::Home { header } => {
                let mut errors = ValidationErrors::new();
                let header = match blocks.validate(HEADER_STREAM, &header) {
                    Ok(cleaned) => cleaned,
                    Err(e) => {
                        errors.merge_prefixed("header", e);
                        header
                    }
                };
                errors.into_result(PageContent::Home { header })
            }
            PageContent::DetailsGallery(mut fields) => {
                let mut errors = ValidationErrors::new();
                fields.caption = fields.caption.trim().to_string();
                let len = fields.caption.chars().count();
                if len > MAX_CAPTION_LENGTH {
                    errors.add(
                        "caption",
                        ErrorCode::MaxLength,
                        format!(
                            "Ensure this value has at most {MAX_CAPTION_LENGTH} characters (it has {len})."
                        ),
                    );
                }
                errors.into_result(PageContent::DetailsGallery(fields))
            }
            other => Ok(other),
        }
    }

    /// The gallery fields, if this is a gallery entry.
    pub fn as_details_gallery(&self) -> Option<&DetailsGallery> {
        match self {
            PageContent::DetailsGallery(fields) => Some(fields),
            _ => None,
        }
    }

    /// The header stream, if this is a home page.
    pub fn header(&self) -> Option<&Value> {
        match self {
            PageContent::Home { header } => Some(header),
            _ => None,
        }
    }
}

impl Page {
    pub fn page_type(&self) -> PageType {
        self.content.page_type()
    }

    /// Check if this page is the tree root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Live and not itself restricted. Restrictions on ancestors are
    /// checked by the page service.
    pub fn is_visible(&self) -> bool {
        self.live && self.public
    }

    /// A fresh, unpositioned page. The tree assigns its position on attach.
    pub fn unattached(title: String, slug: String, content: PageContent) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::now_v7(),
            title,
            slug,
            path: String::new(),
            depth: 0,
            parent_id: None,
            url_path: String::new(),
            live: true,
            public: true,
            created: now,
            changed: now,
            content,
        }
    }

    /// The tree root.
    pub fn root() -> Self {
        let mut root = Self::unattached("Root".to_string(), "root".to_string(), PageContent::Root);
        root.path = crate::content::tree::child_path("", 1);
        root.depth = 1;
        root.url_path = "/".to_string();
        root
    }
}

/// Input for creating a new page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPage {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub live: Option<bool>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(flatten)]
    pub content: PageContent,
}

impl NewPage {
    pub fn new(title: impl Into<String>, content: PageContent) -> Self {
        Self {
            title: title.into(),
            slug: None,
            live: None,
            public: None,
            content,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Create as a draft.
    pub fn draft(mut self) -> Self {
        self.live = Some(false);
        self
    }

    /// Create with view restrictions.
    pub fn private(mut self) -> Self {
        self.public = Some(false);
        self
    }
}

/// Input for updating a page. The page type cannot change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    /// Replacement type-specific fields; must keep the same type.
    #[serde(default)]
    pub content: Option<PageContent>,
}

/// Validate a title and resolve the slug (derived from the title when unset).
pub fn clean_title_and_slug(
    title: &str,
    slug: Option<&str>,
) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = title.trim().to_string();
    if title.is_empty() {
        errors.add("title", ErrorCode::Required, "This field is required.");
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        errors.add(
            "title",
            ErrorCode::MaxLength,
            format!("Ensure this value has at most {MAX_TITLE_LENGTH} characters."),
        );
    }

    let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => slugify(&title),
    };
    if !title.is_empty() && slug.is_empty() {
        errors.add("slug", ErrorCode::Required, "A slug could not be derived from the title.");
    } else if !slug.is_empty() && !VALID_SLUG.is_match(&slug) {
        errors.add(
            "slug",
            ErrorCode::Invalid,
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    } else if slug.chars().count() > MAX_TITLE_LENGTH {
        errors.add(
            "slug",
            ErrorCode::MaxLength,
            format!("Ensure this value has at most {MAX_TITLE_LENGTH} characters."),
        );
    }

    errors.into_result((title, slug))
}

/// Lowercase, hyphen-separated URL segment derived from `text`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
