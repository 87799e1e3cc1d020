//! HTTP middleware components.
//!
//! Provides bearer token authentication and the extractors built on it.

pub mod auth;

pub use auth::{CurrentUser, RequireStaff, RequireUser, authenticate};
