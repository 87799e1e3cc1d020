//! Media permissions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Permissions checked by the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddImage,
    ChangeImage,
    DeleteImage,
    /// Pick an existing image in a chooser.
    ChooseImage,
    AddDocument,
    ChangeDocument,
    DeleteDocument,
    /// Pick an existing document in a chooser.
    ChooseDocument,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::AddImage,
        Permission::ChangeImage,
        Permission::DeleteImage,
        Permission::ChooseImage,
        Permission::AddDocument,
        Permission::ChangeDocument,
        Permission::DeleteDocument,
        Permission::ChooseDocument,
    ];

    pub fn codename(self) -> &'static str {
        match self {
            Permission::AddImage => "add_image",
            Permission::ChangeImage => "change_image",
            Permission::DeleteImage => "delete_image",
            Permission::ChooseImage => "choose_image",
            Permission::AddDocument => "add_document",
            Permission::ChangeDocument => "change_document",
            Permission::DeleteDocument => "delete_document",
            Permission::ChooseDocument => "choose_document",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Permission::AddImage => "Can add image",
            Permission::ChangeImage => "Can change image",
            Permission::DeleteImage => "Can delete image",
            Permission::ChooseImage => "Can choose image",
            Permission::AddDocument => "Can add document",
            Permission::ChangeDocument => "Can change document",
            Permission::DeleteDocument => "Can delete document",
            Permission::ChooseDocument => "Can choose document",
        }
    }

    pub fn from_codename(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.codename() == name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codenames_round_trip() {
        for p in Permission::ALL {
            assert_eq!(Permission::from_codename(p.codename()), Some(p));
        }
        assert_eq!(Permission::ChooseImage.codename(), "choose_image");
        assert_eq!(Permission::ChooseDocument.codename(), "choose_document");
        assert_eq!(Permission::from_codename("publish_page"), None);
    }
}
