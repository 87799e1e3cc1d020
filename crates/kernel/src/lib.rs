//! Arquitectos CMS Kernel Library
//!
//! Page tree, structured content, media and the HTTP surface.
//! The main entry point for running the server is the `arquitectos` binary.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod media;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::build_router;
