//! Service-level error taxonomy.
//!
//! # Invariants
//! - Every service API returns `CoreResult`; callers map variants to
//!   transport status codes via `status_code()` / `error_code()`.
//! - "Nothing found to report" is never an error.

use crate::pagination::PaginationError;
use crate::repo::RepoError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced case/observation/conflict/user is absent or soft-deleted.
    #[error("{0}")]
    NotFound(String),
    /// Requester role is insufficient for the action.
    #[error("{0}")]
    Authorization(String),
    /// Malformed caller input (invalid cursor, too-short content, ...).
    #[error("{0}")]
    Validation(String),
    /// Uniqueness violation (e.g. duplicate user email).
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(RepoError),
}

impl CoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status the REST layer should render for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Authorization(_) => 403,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Storage(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT_ERROR",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, .. } => {
                Self::NotFound(format!("{} not found", title(entity)))
            }
            RepoError::Duplicate { entity, key } => {
                Self::Conflict(format!("{} already exists: {key}", title(entity)))
            }
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<PaginationError> for CoreError {
    fn from(value: PaginationError) -> Self {
        match value {
            PaginationError::InvalidCursor(_) => Self::Validation(value.to_string()),
            PaginationError::Storage(err) => err.into(),
        }
    }
}

fn title(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
