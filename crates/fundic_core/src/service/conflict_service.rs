//! Conflict detection, resolution and query use-cases.
//!
//! # Responsibility
//! - Detect new conflicts between the active observations of a case.
//! - Resolve conflicts and expose severity/offset/cursor listings.
//!
//! # Invariants
//! - Only lead partners and above detect or resolve.
//! - At most one conflict exists per unordered observation pair per case;
//!   detection skips recorded pairs and storage enforces a unique index.
//! - Detection reports only conflicts created by that call.
//! - Re-resolving an already resolved conflict overwrites its resolution.

use super::access::{load_readable_case, require_lead_or_above, Actor};
use super::conflict_analysis::analyze_pair;
use crate::config::{ConflictConfig, CoreConfig};
use crate::error::{CoreError, CoreResult};
use crate::model::conflict::{Conflict, ObservationPair};
use crate::model::{now_epoch_ms, CaseId, ConflictId};
use crate::pagination::{CursorPage, Paginator};
use crate::repo::case_repo::CaseRepository;
use crate::repo::conflict_repo::{ConflictListQuery, ConflictRepository};
use crate::repo::observation_repo::ObservationRepository;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Offset listing envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictListResult {
    pub items: Vec<Conflict>,
    /// Rows matching the filter, ignoring skip/limit.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictStatistics {
    pub case_id: CaseId,
    pub total_count: u64,
    pub resolved_count: u64,
    pub unresolved_count: u64,
    /// Mean severity rounded to two decimals; 0 without conflicts.
    pub average_severity: f64,
    pub by_type: BTreeMap<String, u64>,
}

pub struct ConflictService<S> {
    store: S,
    paginator: Paginator,
    config: ConflictConfig,
}

impl<S> ConflictService<S>
where
    S: CaseRepository + ObservationRepository + ConflictRepository,
{
    pub fn new(store: S, config: &CoreConfig) -> Self {
        Self {
            store,
            paginator: Paginator::new(config.pagination),
            config: config.conflicts,
        }
    }

    /// Detects and persists conflicts not yet recorded for the case.
    ///
    /// Returns an empty list when the case has fewer than two active
    /// observations or no pair qualifies.
    ///
    /// # Errors
    /// - `Authorization` unless the actor is lead partner or above.
    /// - `NotFound` when the case is missing or soft-deleted.
    pub fn detect(&self, case_id: CaseId, actor: &Actor) -> CoreResult<Vec<Conflict>> {
        require_lead_or_above(actor, "Only lead partners and above can detect conflicts")?;
        let case = self
            .store
            .get_case(case_id, false)?
            .ok_or_else(|| CoreError::not_found("Case not found"))?;

        let started_at = Instant::now();
        let observations = self.store.list_active_observations(case.id)?;
        if observations.len() < 2 {
            debug!(
                "event=conflict_detect module=conflict status=skipped case_id={} observations={}",
                case.id,
                observations.len()
            );
            return Ok(Vec::new());
        }

        let mut known_pairs = self.store.list_conflict_pairs(case.id)?;
        let detected_at = now_epoch_ms();
        let mut candidates = Vec::new();

        for (index, first) in observations.iter().enumerate() {
            for second in &observations[index + 1..] {
                let Some(pair) = ObservationPair::new(first.id, second.id) else {
                    continue;
                };
                if known_pairs.contains(&pair) {
                    continue;
                }

                if let Some(finding) = analyze_pair(first, second) {
                    candidates.push(Conflict::detected(
                        case.id,
                        pair,
                        finding.conflict_type,
                        finding.severity,
                        format!(
                            "Conflict detected between observations: {} vs {}",
                            first.section, second.section
                        ),
                        detected_at,
                    ));
                    known_pairs.insert(pair);
                }
            }
        }

        let created = if candidates.is_empty() {
            Vec::new()
        } else {
            self.store.insert_conflicts(&candidates)?
        };

        if created.len() < candidates.len() {
            warn!(
                "event=conflict_detect module=conflict status=partial case_id={} skipped_existing={}",
                case.id,
                candidates.len() - created.len()
            );
        }
        info!(
            "event=conflict_detect module=conflict status=ok case_id={} observations={} created={} duration_ms={}",
            case.id,
            observations.len(),
            created.len(),
            started_at.elapsed().as_millis()
        );
        Ok(created)
    }

    /// Marks a conflict resolved by the actor at the current time.
    ///
    /// # Errors
    /// - `NotFound` when no conflict has that id.
    /// - `Authorization` unless the actor is lead partner or above.
    pub fn resolve(
        &self,
        conflict_id: ConflictId,
        actor: &Actor,
        notes: Option<String>,
    ) -> CoreResult<Conflict> {
        let mut conflict = self
            .store
            .get_conflict(conflict_id)?
            .ok_or_else(|| CoreError::not_found("Conflict not found"))?;
        require_lead_or_above(actor, "Only lead partners and above can resolve conflicts")?;

        let was_resolved = conflict.is_resolved;
        conflict.resolve(actor.user_id, now_epoch_ms(), notes);
        self.store.update_resolution(&conflict)?;

        info!(
            "event=conflict_resolve module=conflict status=ok conflict_id={} case_id={} re_resolved={}",
            conflict.id, conflict.case_id, was_resolved
        );
        Ok(conflict)
    }

    /// Gets one conflict the actor may read through its case.
    pub fn get_conflict(&self, conflict_id: ConflictId, actor: &Actor) -> CoreResult<Conflict> {
        let conflict = self
            .store
            .get_conflict(conflict_id)?
            .ok_or_else(|| CoreError::not_found("Conflict not found"))?;
        load_readable_case(&self.store, conflict.case_id, actor)?;
        Ok(conflict)
    }

    /// Unresolved conflicts with `severity >= threshold`, highest first.
    ///
    /// `threshold` defaults to the configured value (0.7). Range checking is
    /// left to the caller.
    pub fn high_severity(
        &self,
        case_id: CaseId,
        actor: &Actor,
        threshold: Option<f64>,
    ) -> CoreResult<Vec<Conflict>> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let query = ConflictListQuery {
            resolved: Some(false),
            min_severity: Some(threshold.unwrap_or(self.config.high_severity_threshold)),
            ..ConflictListQuery::for_case(case.id)
        };
        Ok(self.store.list_conflicts(&query)?)
    }

    /// Offset listing ordered by `severity DESC, detected_at DESC`.
    pub fn list_conflicts(
        &self,
        case_id: CaseId,
        actor: &Actor,
        skip: u32,
        limit: u32,
        resolved: Option<bool>,
    ) -> CoreResult<ConflictListResult> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let query = ConflictListQuery {
            resolved,
            limit: Some(limit),
            offset: skip,
            ..ConflictListQuery::for_case(case.id)
        };
        let total = self.store.count_conflicts(&query)?;
        let items = self.store.list_conflicts(&query)?;
        Ok(ConflictListResult { items, total })
    }

    /// Cursor listing ordered by `detected_at DESC, id ASC`.
    pub fn list_conflicts_page(
        &self,
        case_id: CaseId,
        actor: &Actor,
        cursor: Option<&str>,
        limit: i64,
        resolved: Option<bool>,
    ) -> CoreResult<CursorPage<Conflict>> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let page = self.paginator.paginate(cursor, limit, |after, fetch_limit| {
            self.store
                .list_conflicts_after(case.id, resolved, after, fetch_limit)
        })?;
        Ok(page)
    }

    pub fn statistics(&self, case_id: CaseId, actor: &Actor) -> CoreResult<ConflictStatistics> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let conflicts = self
            .store
            .list_conflicts(&ConflictListQuery::for_case(case.id))?;

        let total_count = conflicts.len() as u64;
        let resolved_count = conflicts.iter().filter(|c| c.is_resolved).count() as u64;
        let average_severity = if conflicts.is_empty() {
            0.0
        } else {
            let sum: f64 = conflicts.iter().map(|c| c.severity).sum();
            round_two_decimals(sum / conflicts.len() as f64)
        };

        let mut by_type = BTreeMap::new();
        for conflict in &conflicts {
            *by_type
                .entry(conflict.conflict_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(ConflictStatistics {
            case_id: case.id,
            total_count,
            resolved_count,
            unresolved_count: total_count - resolved_count,
            average_severity,
            by_type,
        })
    }
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_two_decimals;

    #[test]
    fn rounds_average_to_two_decimals() {
        assert_eq!(round_two_decimals(0.6), 0.6);
        assert_eq!(round_two_decimals(0.456), 0.46);
        assert_eq!(round_two_decimals(0.0), 0.0);
    }
}
