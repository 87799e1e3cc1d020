//! User model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;
use crate::content::validation::ValidationErrors;

/// User record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// May use the admin surface.
    pub is_staff: bool,
    /// Holds every permission.
    pub is_superuser: bool,
    pub is_active: bool,
    /// Granted permission codenames.
    pub permissions: Vec<String>,
    pub created: i64,
}

impl User {
    /// Check if the user holds `permission`.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_active
            && (self.is_superuser || self.permissions.iter().any(|p| p == permission.codename()))
    }

    /// Check if the user may use the admin surface.
    pub fn can_access_admin(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl CreateUser {
    pub fn clean(mut self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
        errors.check_text("username", &self.username, 150, true);
        errors.check_text("email", &self.email, 254, false);
        if !self.email.is_empty() && !self.email.contains('@') {
            errors.add(
                "email",
                crate::content::validation::ErrorCode::Invalid,
                "Enter a valid email address.",
            );
        }
        errors.check_text("first_name", &self.first_name, 150, false);
        errors.check_text("last_name", &self.last_name, 150, false);
        errors.into_result(self)
    }

    pub fn into_user(self) -> User {
        User {
            id: Uuid::now_v7(),
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            is_active: true,
            permissions: self
                .permissions
                .into_iter()
                .map(|p| p.codename().to_string())
                .collect(),
            created: chrono::Utc::now().timestamp(),
        }
    }
}

/// Public view of a user, as returned by `/back/api/me/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub permissions: Vec<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        let permissions = if user.is_superuser {
            Permission::ALL
                .iter()
                .map(|p| p.codename().to_string())
                .collect()
        } else {
            user.permissions.clone()
        };
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_staff: user.is_staff,
            permissions,
        }
    }
}
