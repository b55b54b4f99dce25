//! Conflict domain model.
//!
//! # Invariants
//! - `observation_id_1 < observation_id_2`; the pair is canonical so one
//!   unordered observation pair maps to exactly one record per case.
//! - `severity` is within `[0, 1]`.
//! - Conflicts are never deleted; the only mutation is resolution.

use super::{CaseId, ConflictId, ModelValidationError, ObservationId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    PriceAnomaly,
    DataInconsistency,
    SourceConflict,
    TimingConflict,
}

impl ConflictType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PriceAnomaly => "price_anomaly",
            Self::DataInconsistency => "data_inconsistency",
            Self::SourceConflict => "source_conflict",
            Self::TimingConflict => "timing_conflict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "price_anomaly" => Some(Self::PriceAnomaly),
            "data_inconsistency" => Some(Self::DataInconsistency),
            "source_conflict" => Some(Self::SourceConflict),
            "timing_conflict" => Some(Self::TimingConflict),
            _ => None,
        }
    }
}

/// Unordered observation pair in canonical `(low, high)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationPair(ObservationId, ObservationId);

impl ObservationPair {
    /// Returns `None` when both ids are equal.
    pub fn new(a: ObservationId, b: ObservationId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self(a, b)),
            std::cmp::Ordering::Greater => Some(Self(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> ObservationId {
        self.0
    }

    pub fn high(&self) -> ObservationId {
        self.1
    }
}

/// Detected disagreement between two observations of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub case_id: CaseId,
    pub observation_id_1: ObservationId,
    pub observation_id_2: ObservationId,
    pub conflict_type: ConflictType,
    pub severity: f64,
    pub description: String,
    pub detected_at: i64,
    pub is_resolved: bool,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<i64>,
    pub resolution_notes: Option<String>,
}

impl Conflict {
    /// Creates an unresolved conflict for a canonical pair.
    pub fn detected(
        case_id: CaseId,
        pair: ObservationPair,
        conflict_type: ConflictType,
        severity: f64,
        description: impl Into<String>,
        detected_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            observation_id_1: pair.low(),
            observation_id_2: pair.high(),
            conflict_type,
            severity,
            description: description.into(),
            detected_at,
            is_resolved: false,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
        }
    }

    pub fn pair(&self) -> Option<ObservationPair> {
        ObservationPair::new(self.observation_id_1, self.observation_id_2)
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if !(0.0..=1.0).contains(&self.severity) {
            return Err(ModelValidationError::SeverityOutOfRange(self.severity));
        }
        if self.observation_id_1 >= self.observation_id_2 {
            return Err(ModelValidationError::NonCanonicalPair);
        }
        Ok(())
    }

    /// Marks the conflict resolved.
    ///
    /// Re-resolving overwrites resolver, timestamp and notes.
    pub fn resolve(&mut self, resolver: UserId, at_ms: i64, notes: Option<String>) {
        self.is_resolved = true;
        self.resolved_by = Some(resolver);
        self.resolved_at = Some(at_ms);
        self.resolution_notes = notes;
    }
}
