//! Arquitectos test utilities.
//!
//! Helpers for integration testing: page request bodies, header block
//! fixtures and JSON assertion utilities.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Start a page request body of the given type.
pub fn test_page(page_type: &str, title: &str) -> TestPage {
    TestPage {
        page_type: page_type.to_string(),
        title: title.to_string(),
        slug: None,
        live: None,
        public: None,
        fields: serde_json::Map::new(),
    }
}

/// Builder for the JSON body of a page create request.
#[derive(Debug, Clone)]
pub struct TestPage {
    pub page_type: String,
    pub title: String,
    pub slug: Option<String>,
    pub live: Option<bool>,
    pub public: Option<bool>,
    pub fields: serde_json::Map<String, JsonValue>,
}

impl TestPage {
    /// Set an explicit slug.
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }

    /// Create as a draft.
    pub fn draft(mut self) -> Self {
        self.live = Some(false);
        self
    }

    /// Create with view restrictions.
    pub fn private(mut self) -> Self {
        self.public = Some(false);
        self
    }

    /// Set a type-specific field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Set the home page header stream.
    pub fn with_header(self, header: JsonValue) -> Self {
        self.with_field("header", header)
    }

    /// Set the gallery entry caption.
    pub fn with_caption(self, caption: &str) -> Self {
        self.with_field("caption", json!(caption))
    }

    /// Set the gallery entry image.
    pub fn with_image(self, image_id: Uuid) -> Self {
        self.with_field("image", json!(image_id.to_string()))
    }

    /// Render the request body.
    pub fn to_json(&self) -> JsonValue {
        let mut body = self.fields.clone();
        body.insert("type".into(), json!(self.page_type));
        body.insert("title".into(), json!(self.title));
        if let Some(slug) = &self.slug {
            body.insert("slug".into(), json!(slug));
        }
        if let Some(live) = self.live {
            body.insert("live".into(), json!(live));
        }
        if let Some(public) = self.public {
            body.insert("public".into(), json!(public));
        }
        JsonValue::Object(body)
    }
}

/// Header block fixtures.
pub mod header {
    use serde_json::{Value, json};
    use uuid::Uuid;

    /// A subcategory value. `author: None` leaves the author unset.
    pub fn subcategory(title: &str, author: Option<&str>) -> Value {
        let mut value = json!({"title": title});
        if let Some(author) = author {
            value["author"] = json!(author);
        }
        json!({"type": "subcategory", "value": value})
    }

    /// A category holding `count` subcategories by `author`.
    pub fn category(title: &str, page: Option<Uuid>, count: usize, author: Option<&str>) -> Value {
        let subcategories: Vec<Value> = (0..count)
            .map(|i| subcategory(&format!("{title} {}", i + 1), author))
            .collect();
        json!({
            "type": "category",
            "value": {
                "title": title,
                "category_page": page.map(|id| id.to_string()),
                "subcategories": subcategories,
            }
        })
    }

    /// A header stream of the given categories.
    pub fn stream(categories: Vec<Value>) -> Value {
        Value::Array(categories)
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a validation error body reports `code` at `field`.
    pub fn field_error(body: &Value, field: &str, code: &str) {
        let found = body["errors"][field]
            .as_array()
            .is_some_and(|errs| errs.iter().any(|e| e["code"] == code));
        assert!(
            found,
            "Expected error '{code}' at '{field}', got: {}",
            serde_json::to_string_pretty(body).unwrap_or_default()
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_builder() {
        let body = test_page("details_gallery_page", "Facade")
            .draft()
            .with_caption("Facade")
            .to_json();

        assert_eq!(body["type"], "details_gallery_page");
        assert_eq!(body["title"], "Facade");
        assert_eq!(body["live"], false);
        assert_eq!(body["caption"], "Facade");
        assert!(body.get("public").is_none());
    }

    #[test]
    fn test_header_category() {
        let page = Uuid::now_v7();
        let category = header::category("Obras", Some(page), 3, Some("ana"));
        let subs = category["value"]["subcategories"].as_array().unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0]["value"]["author"], "ana");
        assert_eq!(category["value"]["category_page"], page.to_string());
    }

    #[test]
    fn test_unset_author_omitted() {
        let sub = header::subcategory("Casas", None);
        assert!(sub["value"].get("author").is_none());
    }
}
