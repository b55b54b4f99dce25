//! Pairwise observation comparison heuristics.
//!
//! # Rules
//! - Different source tags raise severity to at least 0.3.
//! - Different disclosure levels raise severity to at least 0.25.
//! - A contradictory word pair (one word in each content, case-insensitive
//!   substring match) raises severity to at least 0.6 and classifies the pair
//!   as `DataInconsistency`. Only the first matching pair in
//!   `CONTRADICTORY_PAIRS` order counts.
//! - Signals combine by `max`, never by sum.
//! - Without a type, severity above 0.5 assigns `SourceConflict` when source
//!   tags differ, `DataInconsistency` otherwise.
//! - A finding is reported only with a type and severity above 0.2.
//!
//! Metadata-only signals cap at 0.3, so a pair is reported only when the
//! contradictory word scan hits.

use crate::model::conflict::ConflictType;
use crate::model::observation::Observation;

pub const SOURCE_MISMATCH_SEVERITY: f64 = 0.3;
pub const DISCLOSURE_MISMATCH_SEVERITY: f64 = 0.25;
pub const CONTRADICTION_SEVERITY: f64 = 0.6;
pub const TYPE_ASSIGNMENT_THRESHOLD: f64 = 0.5;
pub const REPORTING_THRESHOLD: f64 = 0.2;

/// Ordered word pairs; earlier pairs win.
pub const CONTRADICTORY_PAIRS: &[(&str, &str)] = &[
    ("increase", "decrease"),
    ("improve", "deteriorate"),
    ("strength", "weakness"),
    ("positive", "negative"),
    ("growth", "decline"),
];

/// Result of comparing two observations that qualifies as a conflict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFinding {
    pub conflict_type: ConflictType,
    pub severity: f64,
    /// Contradictory word pair that triggered classification, if any.
    pub contradiction: Option<(&'static str, &'static str)>,
}

/// Compares two observations; `None` means the pair is not conflicting.
pub fn analyze_pair(first: &Observation, second: &Observation) -> Option<PairFinding> {
    let mut severity: f64 = 0.0;
    let mut conflict_type = None;

    let sources_differ = first.source_tag != second.source_tag;
    if sources_differ {
        severity = severity.max(SOURCE_MISMATCH_SEVERITY);
    }

    if first.disclosure_level != second.disclosure_level {
        severity = severity.max(DISCLOSURE_MISMATCH_SEVERITY);
    }

    let contradiction = find_contradiction(&first.content, &second.content);
    if contradiction.is_some() {
        severity = severity.max(CONTRADICTION_SEVERITY);
        conflict_type = Some(ConflictType::DataInconsistency);
    }

    if severity > TYPE_ASSIGNMENT_THRESHOLD && conflict_type.is_none() {
        conflict_type = Some(if sources_differ {
            ConflictType::SourceConflict
        } else {
            ConflictType::DataInconsistency
        });
    }

    match conflict_type {
        Some(conflict_type) if severity > REPORTING_THRESHOLD => Some(PairFinding {
            conflict_type,
            severity,
            contradiction,
        }),
        _ => None,
    }
}

/// First contradictory pair with one word in each text, in either direction.
pub fn find_contradiction(first: &str, second: &str) -> Option<(&'static str, &'static str)> {
    let first = first.to_lowercase();
    let second = second.to_lowercase();

    CONTRADICTORY_PAIRS.iter().copied().find(|(word, opposite)| {
        (first.contains(word) && second.contains(opposite))
            || (first.contains(opposite) && second.contains(word))
    })
}
