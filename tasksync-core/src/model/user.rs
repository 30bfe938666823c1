//! Authenticated user and session types
//!
//! These mirror what the hosted auth service hands back. The sync layer
//! treats them as opaque values: it never mutates a `User`, it only swaps
//! one for another.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Backend-issued user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Create a user ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random UUID v4 user ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An authenticated user
///
/// Only `id` is interpreted by the sync layer. Everything else is a
/// provider-specific claim carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user_metadata: Map<String, Value>,

    /// Every other claim the auth service sent (`aud`, `role`, `app_metadata`, ...)
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            user_metadata: Map::new(),
            claims: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.user_metadata.insert(key.into(), value);
        self
    }
}

/// Proof of authentication, as returned by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub user: User,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user: User) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("u1");
        assert_eq!(id.to_string(), "u1");
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(UserId::generate(), UserId::generate());
    }

    #[test]
    fn test_user_parses_auth_payload() {
        let payload = json!({
            "id": "8a3f0c1e-0000-4000-8000-000000000001",
            "aud": "authenticated",
            "role": "authenticated",
            "email": "ada@example.com",
            "app_metadata": { "provider": "email", "providers": ["email"] },
            "user_metadata": { "name": "Ada" },
            "created_at": "2024-01-01T00:00:00Z"
        });

        let user: User = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(user.id.as_str(), "8a3f0c1e-0000-4000-8000-000000000001");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.user_metadata.get("name"), Some(&json!("Ada")));
        assert_eq!(user.claims.get("role"), Some(&json!("authenticated")));

        // Nothing the provider sent is lost
        assert_eq!(serde_json::to_value(&user).unwrap(), payload);
    }

    #[test]
    fn test_user_without_claims() {
        let user: User = serde_json::from_value(json!({ "id": "u2" })).unwrap();
        assert_eq!(user, User::new("u2"));
    }
}
