//! Domain model for IC case management.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Provide lifecycle helpers for soft-delete and resolution state.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Cases and observations are soft-deleted (tombstoned), never removed.
//! - Timestamps are Unix epoch milliseconds (UTC).

use thiserror::Error;
use uuid::Uuid;

pub mod case;
pub mod conflict;
pub mod observation;
pub mod role;
pub mod user;

pub type UserId = Uuid;
pub type CaseId = Uuid;
pub type ObservationId = Uuid;
pub type ConflictId = Uuid;

/// Free-form JSON object attached to cases and observations.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Model invariant violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelValidationError {
    #[error("{entity}.{field} must not be blank")]
    BlankField {
        entity: &'static str,
        field: &'static str,
    },
    #[error("conflict severity {0} is outside [0, 1]")]
    SeverityOutOfRange(f64),
    #[error("conflict observation pair must be two distinct ids in canonical order")]
    NonCanonicalPair,
    #[error("{entity}.updated_at must not be earlier than created_at")]
    TimestampOrder { entity: &'static str },
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn ensure_not_blank(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField { entity, field });
    }
    Ok(())
}
