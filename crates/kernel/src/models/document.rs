//! Document model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::image::MAX_MEDIA_TITLE_LENGTH;
use crate::content::validation::ValidationErrors;

/// Collection documents land in when none is given.
pub const DEFAULT_COLLECTION: &str = "Root";

/// Uploaded document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomDocument {
    pub id: Uuid,
    pub title: String,
    pub file: String,
    /// Original filename, used for the download name.
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_hash: String,
    pub collection: String,
    pub tags: Vec<String>,
    pub created: i64,
}

/// Editable document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentMeta {
    pub fn clean(mut self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.title = self.title.trim().to_string();
        errors.check_text("title", &self.title, MAX_MEDIA_TITLE_LENGTH, true);

        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        for (i, tag) in tags.iter().enumerate() {
            errors.check_text(&format!("tags.{i}"), tag, 100, false);
        }
        self.tags = tags;

        self.collection = Some(
            self.collection
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_COLLECTION)
                .to_string(),
        );
        errors.into_result(self)
    }

    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(DEFAULT_COLLECTION)
    }
}
