//! Call-to-action button defaults.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::validation::ValidationErrors;

/// Maximum length of the label and link fields.
pub const MAX_CTA_FIELD_LENGTH: usize = 255;

/// Default call-to-action button. `page_id` is cleared when the page goes away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CtaButton {
    pub id: Uuid,
    pub label: String,
    pub link: String,
    pub page_id: Option<Uuid>,
}

/// Input for a CTA button.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCtaButton {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub page_id: Option<Uuid>,
}

impl NewCtaButton {
    pub fn clean(mut self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.label = self.label.trim().to_string();
        self.link = self.link.trim().to_string();
        errors.check_text("label", &self.label, MAX_CTA_FIELD_LENGTH, false);
        errors.check_text("link", &self.link, MAX_CTA_FIELD_LENGTH, false);
        errors.into_result(self)
    }

    pub fn into_button(self) -> CtaButton {
        CtaButton {
            id: Uuid::now_v7(),
            label: self.label,
            link: self.link,
            page_id: self.page_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::validation::ErrorCode;

    #[test]
    fn blank_fields_allowed() {
        assert!(NewCtaButton::default().clean().is_ok());
    }

    #[test]
    fn label_and_link_bounded() {
        let errors = NewCtaButton {
            label: "l".repeat(256),
            link: "k".repeat(256),
            page_id: None,
        }
        .clean()
        .unwrap_err();
        assert!(errors.has("label", ErrorCode::MaxLength));
        assert!(errors.has("link", ErrorCode::MaxLength));
    }
}
