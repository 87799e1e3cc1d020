//! Content model.
//!
//! This module provides:
//! - Page types and their parent/child placement rules
//! - The structured-content schema engine (struct and stream blocks)
//! - The header navigation blocks and the block library
//! - The materialized-path page tree
//! - PageService: page lifecycle and render contexts

pub mod blocks;
pub mod context;
pub mod error;
pub mod page_service;
pub mod page_type;
pub mod schema;
pub mod tree;
pub mod validation;

pub use blocks::BlockLibrary;
pub use context::{GalleryContext, GalleryItem, HomeContext, RenderedPage};
pub use error::{ContentError, ContentResult};
pub use page_service::PageService;
pub use page_type::PageType;
pub use schema::{Block, Enumeration, SchemaError};
pub use tree::PageTree;
pub use validation::{ErrorCode, FieldError, ValidationErrors};
