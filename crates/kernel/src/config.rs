//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::content::Enumeration;

/// Author choices used when `AUTHOR_CHOICES` is unset.
pub const DEFAULT_AUTHOR_CHOICES: &str = "arquitectos:Arquitectos;invitados:Invitados";

/// Default admin mount point.
pub const DEFAULT_ADMIN_PREFIX: &str = "/wubba-lubba-dub-dub";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When None, an in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Directory uploaded media is written to (default: ./media).
    pub media_dir: PathBuf,

    /// Base URL media is served from (default: /media).
    pub media_url: String,

    /// Development mode: enables the API index and schema endpoints.
    pub debug: bool,

    /// Where the admin surface is mounted.
    pub admin_prefix: String,

    /// Closed set of header subcategory authors.
    pub author_choices: Enumeration,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let media_dir = env::var("MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./media"));

        let media_url = env::var("MEDIA_URL").unwrap_or_else(|_| "/media".to_string());

        let debug = env::var("DEBUG")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let admin_prefix = normalize_prefix(
            &env::var("ADMIN_PREFIX").unwrap_or_else(|_| DEFAULT_ADMIN_PREFIX.to_string()),
        );

        let author_choices = parse_author_choices(
            &env::var("AUTHOR_CHOICES").unwrap_or_else(|_| DEFAULT_AUTHOR_CHOICES.to_string()),
        )
        .context("AUTHOR_CHOICES must be a non-empty list of value:Label pairs")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            media_dir,
            media_url,
            debug,
            admin_prefix,
            author_choices,
            cors_allowed_origins,
        })
    }

    /// In-memory configuration for tests: no database, debug on.
    pub fn for_tests() -> Result<Self> {
        Ok(Self {
            port: 0,
            database_url: None,
            database_max_connections: 1,
            media_dir: env::temp_dir().join("arquitectos-media"),
            media_url: "/media".to_string(),
            debug: true,
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
            author_choices: parse_author_choices(DEFAULT_AUTHOR_CHOICES)?,
            cors_allowed_origins: vec!["*".to_string()],
        })
    }
}

/// Parse `value:Label;value:Label`. A bare value is its own label.
pub fn parse_author_choices(raw: &str) -> Result<Enumeration> {
    let pairs: Vec<(&str, &str)> = raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((value, label)) => (value.trim(), label.trim()),
            None => (entry, entry),
        })
        .collect();
    Enumeration::from_pairs(&pairs).context("invalid author choices")
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Leading slash, no trailing slash.
fn normalize_prefix(raw: &str) -> String {
    format!("/{}", raw.trim().trim_matches('/'))
}
