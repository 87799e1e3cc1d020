//! Page types and their placement rules.
//!
//! Every page in the tree is one of a closed set of types. Each type declares
//! which parent types it may live under; the table is static and checked on
//! every create and move, whatever the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of page types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PageType {
    /// Generic page. The tree root is one of these.
    #[serde(rename = "page")]
    Root,
    /// Site home page, expected directly under the root.
    #[serde(rename = "home_page")]
    Home,
    /// Gallery listing, expected under the home page.
    #[serde(rename = "gallery_page")]
    Gallery,
    /// A single gallery entry: image, caption and description.
    #[serde(rename = "details_gallery_page")]
    DetailsGallery,
}

impl PageType {
    /// Every page type, in declaration order.
    pub const ALL: [PageType; 4] = [
        PageType::Root,
        PageType::Home,
        PageType::Gallery,
        PageType::DetailsGallery,
    ];

    /// Machine name used in storage and URLs.
    pub fn machine_name(self) -> &'static str {
        match self {
            PageType::Root => "page",
            PageType::Home => "home_page",
            PageType::Gallery => "gallery_page",
            PageType::DetailsGallery => "details_gallery_page",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            PageType::Root => "Page",
            PageType::Home => "Home Page",
            PageType::Gallery => "Gallery Page",
            PageType::DetailsGallery => "Details Gallery Page",
        }
    }

    /// Plural label for admin listings.
    pub fn label_plural(self) -> &'static str {
        match self {
            PageType::Root => "Pages",
            PageType::Home => "Home Pages",
            PageType::Gallery => "Gallery Pages",
            PageType::DetailsGallery => "Details Gallery Pages",
        }
    }

    /// Parent types this page type may be attached under.
    ///
    /// An empty slice means the type is unrestricted.
    pub fn parent_page_types(self) -> &'static [PageType] {
        match self {
            PageType::Root => &[],
            PageType::Home => &[PageType::Root],
            PageType::Gallery => &[PageType::Home],
            PageType::DetailsGallery => &[PageType::Gallery],
        }
    }
}

/// Whether a page of type `child` may be attached under a page of type `parent`.
pub fn can_attach(child: PageType, parent: PageType) -> bool {
    let allowed = child.parent_page_types();
    allowed.is_empty() || allowed.contains(&parent)
}

/// Page types that may be created directly under a page of type `parent`.
pub fn allowed_subpage_types(parent: PageType) -> Vec<PageType> {
    PageType::ALL
        .into_iter()
        .filter(|child| can_attach(*child, parent))
        .collect()
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.machine_name())
    }
}

/// Error returned when parsing an unknown page type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown page type '{0}'")]
pub struct UnknownPageType(pub String);

impl FromStr for PageType {
    type Err = UnknownPageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageType::ALL
            .into_iter()
            .find(|t| t.machine_name() == s)
            .ok_or_else(|| UnknownPageType(s.to_string()))
    }
}
