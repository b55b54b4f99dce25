//! User directory record.
//!
//! Authentication material (password hashes, tokens) is owned elsewhere; this
//! record only carries what authorization and listings need.

use super::role::UserRole;
use super::{ensure_not_blank, now_epoch_ms, ModelValidationError, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Stored lowercased; unique across the directory.
    pub email: String,
    pub full_name: String,
    pub department: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an active user with a generated id.
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, role: UserRole) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&email.into()),
            full_name: full_name.into(),
            department: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        ensure_not_blank("user", "email", &self.email)?;
        ensure_not_blank("user", "full_name", &self.full_name)?;
        if self.updated_at < self.created_at {
            return Err(ModelValidationError::TimestampOrder { entity: "user" });
        }
        Ok(())
    }
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}
