//! Observation domain model.
//!
//! # Responsibility
//! - Define the tagged finding record attached to a case.
//! - Provide lifecycle helpers for verification and soft-delete semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another observation.
//! - `case_id` never changes after creation.
//! - `is_deleted` is the source of truth for tombstone state.
//! - `verified_by` and `verified_at` are set together with `is_verified`.

use super::{
    ensure_not_blank, now_epoch_ms, CaseId, Metadata, ModelValidationError, ObservationId, UserId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    /// Public information.
    #[serde(rename = "PUB")]
    Public,
    /// External proprietary data.
    #[serde(rename = "EXT")]
    External,
    /// Internal company data.
    #[serde(rename = "INT")]
    Internal,
    /// Confidential / NDA data.
    #[serde(rename = "CONF")]
    Confidential,
    /// Analysis or derived data.
    #[serde(rename = "ANL")]
    Analysis,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "PUB",
            Self::External => "EXT",
            Self::Internal => "INT",
            Self::Confidential => "CONF",
            Self::Analysis => "ANL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PUB" => Some(Self::Public),
            "EXT" => Some(Self::External),
            "INT" => Some(Self::Internal),
            "CONF" => Some(Self::Confidential),
            "ANL" => Some(Self::Analysis),
            _ => None,
        }
    }
}

/// Audience tier allowed to see an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DisclosureLevel {
    /// Investment committee only.
    #[serde(rename = "IC")]
    Ic,
    /// Limited partners.
    #[serde(rename = "LP")]
    Lp,
    /// Limited partners under NDA.
    #[serde(rename = "LP_NDA")]
    LpNda,
    /// Private / internal.
    #[serde(rename = "PRIVATE")]
    Private,
}

impl DisclosureLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ic => "IC",
            Self::Lp => "LP",
            Self::LpNda => "LP_NDA",
            Self::Private => "PRIVATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IC" => Some(Self::Ic),
            "LP" => Some(Self::Lp),
            "LP_NDA" => Some(Self::LpNda),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

/// One tagged finding attached to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub case_id: CaseId,
    /// Free-text section label, e.g. "Financials".
    pub section: String,
    pub content: String,
    pub source_tag: SourceTag,
    pub disclosure_level: DisclosureLevel,
    pub created_by: UserId,
    pub is_verified: bool,
    pub verified_by: Option<UserId>,
    /// Epoch milliseconds; present exactly when `is_verified`.
    pub verified_at: Option<i64>,
    /// Soft delete tombstone; conflicts keep referencing deleted rows.
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub metadata: Metadata,
}

impl Observation {
    /// Creates an unverified observation with `PUB` / `PRIVATE` defaults.
    pub fn new(
        case_id: CaseId,
        section: impl Into<String>,
        content: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            case_id,
            section: section.into(),
            content: content.into(),
            source_tag: SourceTag::Public,
            disclosure_level: DisclosureLevel::Private,
            created_by,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        ensure_not_blank("observation", "section", &self.section)?;
        ensure_not_blank("observation", "content", &self.content)?;
        if self.updated_at < self.created_at {
            return Err(ModelValidationError::TimestampOrder {
                entity: "observation",
            });
        }
        Ok(())
    }

    /// Records verification by `verifier` at `at_ms`.
    pub fn mark_verified(&mut self, verifier: UserId, at_ms: i64) {
        self.is_verified = true;
        self.verified_by = Some(verifier);
        self.verified_at = Some(at_ms);
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
