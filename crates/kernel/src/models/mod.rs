//! Data models.

pub mod api_token;
pub mod cta_button;
pub mod document;
pub mod image;
pub mod page;
pub mod permission;
pub mod user;

pub use api_token::ApiToken;
pub use cta_button::{CtaButton, NewCtaButton};
pub use document::{CustomDocument, DocumentMeta};
pub use image::{CustomImage, CustomRendition, FocalPoint, ImageMeta};
pub use page::{DetailsGallery, NewPage, Page, PageContent, UpdatePage};
pub use permission::Permission;
pub use user::{CreateUser, User, UserProfile};
