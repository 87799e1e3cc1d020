//! Media: file storage, images, renditions and documents.

pub mod documents;
pub mod filter;
pub mod images;
pub mod rendition;
pub mod storage;

pub use documents::DocumentService;
pub use filter::{FilterSpec, FilterSpecError};
pub use images::ImageService;
pub use rendition::RenditionService;
pub use storage::{FileStorage, LocalFileStorage, MemoryFileStorage};
