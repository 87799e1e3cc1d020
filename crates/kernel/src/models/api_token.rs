//! API tokens for bearer authentication.
//!
//! Only the SHA-256 hash of a token is stored. The raw value is returned
//! once, at creation.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// API token record (never contains the raw token).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub created: i64,
}

impl ApiToken {
    /// Build a new token for `user_id`. Returns `(ApiToken, raw_token)`.
    pub fn issue(user_id: Uuid, name: &str) -> (Self, String) {
        let raw_token = generate_token();
        let token = Self {
            id: Uuid::now_v7(),
            user_id,
            name: name.to_string(),
            token_hash: hash_token(&raw_token),
            created: chrono::Utc::now().timestamp(),
        };
        (token, raw_token)
    }
}

/// Generate a cryptographically random token (32 bytes, hex encoded).
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
