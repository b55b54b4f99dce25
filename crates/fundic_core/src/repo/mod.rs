//! Repository layer abstractions and SQLite persistence.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate the model before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Soft-deleted rows are excluded unless a caller explicitly asks for them.

use crate::db::DbError;
use crate::model::{Metadata, ModelValidationError};
use crate::pagination::CursorKey;
use rusqlite::types::Value;
use rusqlite::{ffi, Connection, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

pub mod case_repo;
pub mod conflict_repo;
pub mod observation_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed store implementing every repository trait over one
/// migrated connection.
#[derive(Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps a connection returned by `open_db` / `open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

/// Appends the keyset predicate for `(ts DESC, id ASC)` ordering.
pub(crate) fn push_cursor_filter(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    after: Option<&CursorKey>,
    ts_column: &str,
    id_column: &str,
) {
    if let Some(key) = after {
        sql.push_str(&format!(
            " AND ({ts_column} < ? OR ({ts_column} = ? AND {id_column} > ?))"
        ));
        bind_values.push(Value::Integer(key.created_at));
        bind_values.push(Value::Integer(key.created_at));
        bind_values.push(Value::Text(key.id.to_string()));
    }
}

pub(crate) fn push_limit_offset(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    limit: Option<u32>,
    offset: u32,
) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn metadata_to_db(metadata: &Metadata) -> RepoResult<String> {
    serde_json::to_string(metadata)
        .map_err(|err| RepoError::InvalidData(format!("unserializable metadata: {err}")))
}

pub(crate) fn parse_metadata(value: &str, column: &str) -> RepoResult<Metadata> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid json object in {column}: {err}")))
}

/// True only for `UNIQUE` index failures; primary key, `CHECK` and foreign
/// key violations are left to the caller's generic error path.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
