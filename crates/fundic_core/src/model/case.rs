//! Case (deal under evaluation) domain model.
//!
//! # Invariants
//! - `is_deleted` is the source of truth for tombstone state; deleted cases
//!   are invisible to every read path.
//! - `created_by` never changes after creation.

use super::role::{Permission, UserRole};
use super::{ensure_not_blank, now_epoch_ms, CaseId, Metadata, ModelValidationError, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review workflow state of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    InProgress,
    PendingReview,
    Approved,
    Rejected,
    Closed,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "in_progress" => Some(Self::InProgress),
            "pending_review" => Some(Self::PendingReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub title: String,
    pub description: Option<String>,
    pub company_name: String,
    pub sector: Option<String>,
    pub status: CaseStatus,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: bool,
    pub metadata: Metadata,
}

impl Case {
    /// Creates a draft case owned by `created_by`.
    pub fn new(
        title: impl Into<String>,
        company_name: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            company_name: company_name.into(),
            sector: None,
            status: CaseStatus::Draft,
            created_by,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            metadata: Metadata::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        ensure_not_blank("case", "title", &self.title)?;
        ensure_not_blank("case", "company_name", &self.company_name)?;
        if self.updated_at < self.created_at {
            return Err(ModelValidationError::TimestampOrder { entity: "case" });
        }
        Ok(())
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Case-level read access.
    ///
    /// Roles holding `read:case:all` see every case; `read:case:own` only
    /// covers cases the requester created.
    pub fn readable_by(&self, user_id: UserId, role: UserRole) -> bool {
        role.has_permission(Permission::ReadCaseAll)
            || (role.has_permission(Permission::ReadCaseOwn) && self.created_by == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Case, CaseStatus};
    use crate::model::role::UserRole;
    use uuid::Uuid;

    #[test]
    fn new_case_starts_as_active_draft() {
        let case = Case::new("Series B review", "Acme", Uuid::new_v4());
        assert_eq!(case.status, CaseStatus::Draft);
        assert!(case.is_active());
        assert!(case.validate().is_ok());
    }

    #[test]
    fn analyst_reads_only_own_cases() {
        let owner = Uuid::new_v4();
        let case = Case::new("Series B review", "Acme", owner);
        assert!(case.readable_by(owner, UserRole::Analyst));
        assert!(!case.readable_by(Uuid::new_v4(), UserRole::Analyst));
        assert!(case.readable_by(Uuid::new_v4(), UserRole::LeadPartner));
        assert!(case.readable_by(Uuid::new_v4(), UserRole::Admin));
    }

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            CaseStatus::Draft,
            CaseStatus::InProgress,
            CaseStatus::PendingReview,
            CaseStatus::Approved,
            CaseStatus::Rejected,
            CaseStatus::Closed,
        ] {
            assert_eq!(CaseStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CaseStatus::parse("archived"), None);
    }
}
