//! Image and rendition models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::validation::ValidationErrors;

/// Maximum length of image alt text.
pub const MAX_ALT_LENGTH: usize = 1000;

/// Maximum length of media titles.
pub const MAX_MEDIA_TITLE_LENGTH: usize = 255;

/// Region of an image to keep in view when cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocalPoint {
    /// Centre x, in pixels.
    pub x: i32,
    /// Centre y, in pixels.
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FocalPoint {
    /// Stable key identifying this focal point within rendition lookups.
    pub fn key(&self) -> String {
        format!("focus-{}-{}-{}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Focal point key for an optional focal point; empty when unset.
pub fn focal_point_key(point: Option<&FocalPoint>) -> String {
    point.map(FocalPoint::key).unwrap_or_default()
}

/// Image record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomImage {
    pub id: Uuid,
    pub title: String,
    /// Storage URI of the original (e.g. `local://original_images/...`).
    pub file: String,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    /// SHA-256 of the original file, hex encoded.
    pub file_hash: String,
    pub focal_point_x: Option<i32>,
    pub focal_point_y: Option<i32>,
    pub focal_point_width: Option<i32>,
    pub focal_point_height: Option<i32>,
    /// Default alt text.
    pub alt: String,
    pub created: i64,
}

impl CustomImage {
    /// The focal point, when all four coordinates are set.
    pub fn focal_point(&self) -> Option<FocalPoint> {
        Some(FocalPoint {
            x: self.focal_point_x?,
            y: self.focal_point_y?,
            width: self.focal_point_width?,
            height: self.focal_point_height?,
        })
    }

    pub fn set_focal_point(&mut self, point: Option<FocalPoint>) {
        self.focal_point_x = point.map(|p| p.x);
        self.focal_point_y = point.map(|p| p.y);
        self.focal_point_width = point.map(|p| p.width);
        self.focal_point_height = point.map(|p| p.height);
    }

    pub fn focal_point_key(&self) -> String {
        focal_point_key(self.focal_point().as_ref())
    }
}

/// Editable image metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageMeta {
    pub title: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub focal_point: Option<FocalPoint>,
}

impl ImageMeta {
    pub fn clean(mut self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.title = self.title.trim().to_string();
        errors.check_text("title", &self.title, MAX_MEDIA_TITLE_LENGTH, true);
        errors.check_text("alt", &self.alt, MAX_ALT_LENGTH, false);
        if let Some(point) = &self.focal_point
            && (point.width < 0 || point.height < 0)
        {
            errors.add(
                "focal_point",
                crate::content::validation::ErrorCode::Invalid,
                "Focal point dimensions cannot be negative.",
            );
        }
        errors.into_result(self)
    }
}

/// A resized derivative of an image for one filter spec and focal point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomRendition {
    pub id: Uuid,
    pub image_id: Uuid,
    /// Canonical filter spec, e.g. `fill-300x200`.
    pub filter_spec: String,
    pub focal_point_key: String,
    pub file: String,
    pub width: i32,
    pub height: i32,
    pub created: i64,
}

impl CustomRendition {
    /// Lookup key: renditions are unique on this triple.
    pub fn identity(&self) -> (Uuid, &str, &str) {
        (self.image_id, &self.filter_spec, &self.focal_point_key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::validation::ErrorCode;

    #[test]
    fn focal_point_requires_all_coordinates() {
        let mut image = CustomImage {
            id: Uuid::now_v7(),
            title: "Facade".into(),
            file: "local://original_images/facade.jpg".into(),
            width: 800,
            height: 600,
            file_size: 10,
            file_hash: String::new(),
            focal_point_x: Some(10),
            focal_point_y: None,
            focal_point_width: None,
            focal_point_height: None,
            alt: String::new(),
            created: 0,
        };
        assert!(image.focal_point().is_none());
        assert_eq!(image.focal_point_key(), "");

        image.set_focal_point(Some(FocalPoint { x: 400, y: 300, width: 50, height: 40 }));
        assert_eq!(image.focal_point_key(), "focus-400-300-50x40");
    }

    #[test]
    fn alt_defaults_empty_and_is_bounded() {
        let meta: ImageMeta = serde_json::from_str(r#"{"title": "Facade"}"#).unwrap();
        assert_eq!(meta.alt, "");
        assert!(meta.clone().clean().is_ok());

        let long = ImageMeta {
            alt: "a".repeat(MAX_ALT_LENGTH + 1),
            ..meta
        };
        assert!(long.clean().unwrap_err().has("alt", ErrorCode::MaxLength));
    }

    #[test]
    fn title_required() {
        let meta = ImageMeta::default();
        assert!(meta.clean().unwrap_err().has("title", ErrorCode::Required));
    }
}
