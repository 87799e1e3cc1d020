//! Page tree positions.
//!
//! Pages are stored with a materialized path: each level adds a fixed-width
//! base-36 step, so `00010002` is the second child of the root `0001`.
//! Ordering by path gives a depth-first walk and a subtree is a path prefix.
//!
//! [`PageTree`] is the explicit in-memory tree used by the memory store. The
//! free functions are shared with the SQL store so both compute positions
//! the same way.

use std::collections::HashMap;

use uuid::Uuid;

use super::error::{ContentError, ContentResult};
use super::page_type::{PageType, can_attach};
use super::validation::ErrorCode;
use crate::models::page::Page;

/// Characters per path step.
pub const STEP_LEN: usize = 4;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Largest child index a single step can encode.
pub const MAX_CHILDREN: u32 = 36 * 36 * 36 * 36 - 1;

/// Path of the `index`-th child (1-based) of `parent_path`.
pub fn child_path(parent_path: &str, index: u32) -> String {
    let mut step = [b'0'; STEP_LEN];
    let mut n = index;
    for slot in step.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    let mut path = String::with_capacity(parent_path.len() + STEP_LEN);
    path.push_str(parent_path);
    path.extend(step.iter().map(|b| *b as char));
    path
}

/// Decode the last step of `path`.
pub fn last_step(path: &str) -> Option<u32> {
    let start = path.len().checked_sub(STEP_LEN)?;
    path.get(start..)?.chars().try_fold(0u32, |acc, c| {
        c.to_digit(36).map(|d| acc * 36 + d)
    })
}

/// Path for a new last child of `parent_path`, given its current children.
pub fn next_child_path<'a>(
    parent_path: &str,
    existing_children: impl IntoIterator<Item = &'a str>,
) -> ContentResult<String> {
    let highest = existing_children
        .into_iter()
        .filter_map(last_step)
        .max()
        .unwrap_or(0);
    if highest >= MAX_CHILDREN {
        return Err(ContentError::field(
            "parent",
            ErrorCode::Invalid,
            "The parent page has no room for more children.",
        ));
    }
    Ok(child_path(parent_path, highest + 1))
}

/// Depth implied by a path.
pub fn depth_of(path: &str) -> i32 {
    (path.len() / STEP_LEN) as i32
}

/// Path of the parent of `path`, if any.
pub fn parent_path(path: &str) -> Option<&str> {
    path.len()
        .checked_sub(STEP_LEN)
        .filter(|&n| n > 0)
        .and_then(|n| path.get(..n))
}

/// Whether `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() && path.starts_with(ancestor)
}

/// Replace the `old_prefix` of `path` with `new_prefix`.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    match path.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        None => path.to_string(),
    }
}

/// URL path of a child with `slug` under a parent at `parent_url`.
pub fn child_url_path(parent_url: &str, slug: &str) -> String {
    format!("{}/{slug}/", parent_url.trim_end_matches('/'))
}

/// Reject attaching `child_type` under `parent`.
pub fn check_placement(child_type: PageType, parent: &Page) -> ContentResult<()> {
    if can_attach(child_type, parent.page_type()) {
        return Ok(());
    }
    let allowed: Vec<&str> = child_type
        .parent_page_types()
        .iter()
        .map(|t| t.machine_name())
        .collect();
    Err(ContentError::field(
        "parent",
        ErrorCode::Placement,
        format!(
            "A '{}' cannot be placed under a '{}'; allowed parents: {}.",
            child_type,
            parent.page_type(),
            allowed.join(", ")
        ),
    ))
}

fn slug_taken() -> ContentError {
    ContentError::field(
        "slug",
        ErrorCode::Invalid,
        "This slug is already in use within the context of its parent page.",
    )
}

/// Explicit in-memory page tree.
#[derive(Debug, Clone)]
pub struct PageTree {
    root_id: Uuid,
    pages: HashMap<Uuid, Page>,
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTree {
    /// A tree holding only a fresh root page.
    pub fn new() -> Self {
        Self::with_root(Page::root())
    }

    pub fn with_root(root: Page) -> Self {
        let root_id = root.id;
        let mut pages = HashMap::new();
        pages.insert(root_id, root);
        Self { root_id, pages }
    }

    pub fn root(&self) -> &Page {
        // The root is inserted on construction and never removed.
        &self.pages[&self.root_id]
    }

    pub fn get(&self, id: Uuid) -> Option<&Page> {
        self.pages.get(&id)
    }

    fn require(&self, id: Uuid) -> ContentResult<&Page> {
        self.pages
            .get(&id)
            .ok_or_else(|| ContentError::not_found("page", id))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Direct children of `id`, in tree order.
    pub fn children(&self, id: Uuid) -> Vec<&Page> {
        let mut children: Vec<&Page> = self
            .pages
            .values()
            .filter(|p| p.parent_id == Some(id))
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        children
    }

    /// Every page below `id`, in tree order.
    pub fn descendants(&self, id: Uuid) -> Vec<&Page> {
        let Some(page) = self.pages.get(&id) else {
            return Vec::new();
        };
        let mut found: Vec<&Page> = self
            .pages
            .values()
            .filter(|p| is_descendant(&p.path, &page.path))
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Every page above `id`, root first.
    pub fn ancestors(&self, id: Uuid) -> Vec<&Page> {
        let mut chain = Vec::new();
        let mut current = self.pages.get(&id).and_then(|p| p.parent_id);
        while let Some(parent_id) = current {
            let Some(parent) = self.pages.get(&parent_id) else {
                break;
            };
            chain.push(parent);
            current = parent.parent_id;
        }
        chain.reverse();
        chain
    }

    pub fn find_by_url_path(&self, url_path: &str) -> Option<&Page> {
        self.pages.values().find(|p| p.url_path == url_path)
    }

    fn slug_in_use(&self, parent_id: Uuid, slug: &str, except: Option<Uuid>) -> bool {
        self.pages
            .values()
            .any(|p| p.parent_id == Some(parent_id) && p.slug == slug && Some(p.id) != except)
    }

    /// Attach `page` as the last child of `parent_id`.
    ///
    /// Placement, slug uniqueness and parent existence are all checked before
    /// anything changes.
    pub fn attach(&mut self, parent_id: Uuid, mut page: Page) -> ContentResult<&Page> {
        let parent = self.require(parent_id)?;
        check_placement(page.page_type(), parent)?;
        if self.slug_in_use(parent_id, &page.slug, None) {
            return Err(slug_taken());
        }

        let siblings = self.children(parent_id);
        let path = next_child_path(&parent.path, siblings.iter().map(|p| p.path.as_str()))?;

        page.depth = depth_of(&path);
        page.path = path;
        page.parent_id = Some(parent_id);
        page.url_path = child_url_path(&parent.url_path, &page.slug);

        let id = page.id;
        self.pages.insert(id, page);
        self.require(id)
    }

    /// Move `id` and its subtree to be the last child of `new_parent_id`.
    pub fn move_subtree(&mut self, id: Uuid, new_parent_id: Uuid) -> ContentResult<&Page> {
        let page = self.require(id)?;
        if page.is_root() {
            return Err(ContentError::RootImmutable("moved"));
        }
        let new_parent = self.require(new_parent_id)?;
        if new_parent.id == id || is_descendant(&new_parent.path, &page.path) {
            return Err(ContentError::field(
                "parent",
                ErrorCode::Placement,
                "A page cannot be moved under itself or one of its descendants.",
            ));
        }
        check_placement(page.page_type(), new_parent)?;
        if self.slug_in_use(new_parent_id, &page.slug, Some(id)) {
            return Err(slug_taken());
        }
        if page.parent_id == Some(new_parent_id) {
            return self.require(id);
        }

        let old_path = page.path.clone();
        let old_url = page.url_path.clone();
        let siblings = self.children(new_parent_id);
        let new_path =
            next_child_path(&new_parent.path, siblings.iter().map(|p| p.path.as_str()))?;
        let new_url = child_url_path(&new_parent.url_path, &page.slug);

        let subtree: Vec<Uuid> = std::iter::once(id)
            .chain(self.descendants(id).into_iter().map(|p| p.id))
            .collect();
        let now = chrono::Utc::now().timestamp();
        for member in subtree {
            if let Some(p) = self.pages.get_mut(&member) {
                p.path = rebase(&p.path, &old_path, &new_path);
                p.depth = depth_of(&p.path);
                p.url_path = rebase(&p.url_path, &old_url, &new_url);
                if p.id == id {
                    p.parent_id = Some(new_parent_id);
                    p.changed = now;
                }
            }
        }
        self.require(id)
    }

    /// Replace the stored fields of an existing page.
    ///
    /// Position fields are kept from the stored page; a slug change rewrites
    /// the URL paths of the whole subtree.
    pub fn replace(&mut self, mut page: Page) -> ContentResult<&Page> {
        let stored = self.require(page.id)?;
        if stored.page_type() != page.page_type() {
            return Err(ContentError::field(
                "type",
                ErrorCode::Invalid,
                "The type of an existing page cannot be changed.",
            ));
        }
        if let Some(parent_id) = stored.parent_id
            && self.slug_in_use(parent_id, &page.slug, Some(page.id))
        {
            return Err(slug_taken());
        }

        let old_url = stored.url_path.clone();
        let new_url = match stored.parent_id.and_then(|pid| self.pages.get(&pid)) {
            Some(parent) => child_url_path(&parent.url_path, &page.slug),
            None => stored.url_path.clone(),
        };
        page.path = stored.path.clone();
        page.depth = stored.depth;
        page.parent_id = stored.parent_id;
        page.created = stored.created;
        page.url_path = new_url.clone();

        if old_url != new_url {
            let below: Vec<Uuid> = self.descendants(page.id).into_iter().map(|p| p.id).collect();
            for member in below {
                if let Some(p) = self.pages.get_mut(&member) {
                    p.url_path = rebase(&p.url_path, &old_url, &new_url);
                }
            }
        }

        let id = page.id;
        self.pages.insert(id, page);
        self.require(id)
    }

    /// Remove `id` and everything below it. Returns the removed pages.
    pub fn remove_subtree(&mut self, id: Uuid) -> ContentResult<Vec<Page>> {
        let page = self.require(id)?;
        if page.is_root() {
            return Err(ContentError::RootImmutable("deleted"));
        }
        let ids: Vec<Uuid> = std::iter::once(id)
            .chain(self.descendants(id).into_iter().map(|p| p.id))
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|member| self.pages.remove(&member))
            .collect())
    }

    /// Mutable access for field updates that do not touch position.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Page> {
        self.pages.get_mut(&id)
    }
}
