//! Render contexts for served pages.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::blocks::{CATEGORY_BLOCK, SUBCATEGORY_BLOCK};
use super::page_type::PageType;
use super::schema::Enumeration;
use crate::models::{CustomImage, Page};

/// Compact reference to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub url_path: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            url_path: page.url_path.clone(),
            page_type: page.page_type(),
        }
    }
}

/// Image as shown in a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    pub id: Uuid,
    pub title: String,
    pub alt: String,
    pub width: i32,
    pub height: i32,
    pub url: String,
}

impl GalleryImage {
    pub fn new(image: &CustomImage, url: String) -> Self {
        Self {
            id: image.id,
            title: image.title.clone(),
            alt: image.alt.clone(),
            width: image.width,
            height: image.height,
            url,
        }
    }
}

/// One gallery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub page: PageSummary,
    pub caption: String,
    pub description: String,
    /// None when the entry has no image or its image was deleted.
    pub image: Option<GalleryImage>,
}

/// Context of a gallery page. `items` is always present, possibly empty.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryContext {
    pub page: Page,
    pub items: Vec<GalleryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderSubcategory {
    pub title: String,
    pub author: String,
    pub author_label: String,
}

/// A resolved header category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCategory {
    pub id: Option<String>,
    pub title: String,
    /// Target page; None when it is gone or not visible.
    pub category_page: Option<PageSummary>,
    #[serde(skip)]
    pub category_page_id: Option<Uuid>,
    pub subcategories: Vec<HeaderSubcategory>,
}

/// Context of the home page.
#[derive(Debug, Clone, Serialize)]
pub struct HomeContext {
    pub page: Page,
    pub header: Vec<HeaderCategory>,
    pub children: Vec<PageSummary>,
}

/// Context of a page type with no extra fields.
#[derive(Debug, Clone, Serialize)]
pub struct PlainContext {
    pub page: Page,
    pub children: Vec<PageSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PageContext {
    Home(HomeContext),
    Gallery(GalleryContext),
    Plain(PlainContext),
}

/// A page ready for a template.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    pub template: String,
    pub context: PageContext,
}

/// Template name for a page type.
pub fn template_for(page_type: PageType) -> String {
    format!("cms/{}.html", page_type.machine_name())
}

/// Read header categories out of a cleaned header stream. Page references
/// are left unresolved.
pub fn header_categories(header: &Value, authors: &Enumeration) -> Vec<HeaderCategory> {
    let Some(items) = header.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some(CATEGORY_BLOCK))
        .filter_map(|item| {
            let value = item.get("value")?;
            let subcategories = value
                .get("subcategories")
                .and_then(Value::as_array)
                .map(|subs| {
                    subs.iter()
                        .filter(|s| s.get("type").and_then(Value::as_str) == Some(SUBCATEGORY_BLOCK))
                        .filter_map(|s| s.get("value"))
                        .map(|s| {
                            let author = str_field(s, "author");
                            let author_label = authors
                                .choices()
                                .iter()
                                .find(|c| c.value == author)
                                .map(|c| c.label.clone())
                                .unwrap_or_else(|| author.clone());
                            HeaderSubcategory {
                                title: str_field(s, "title"),
                                author,
                                author_label,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(HeaderCategory {
                id: item.get("id").and_then(Value::as_str).map(str::to_string),
                title: str_field(value, "title"),
                category_page: None,
                category_page_id: value
                    .get("category_page")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok()),
                subcategories,
            })
        })
        .collect()
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
