//! Case lifecycle use-cases.
//!
//! # Invariants
//! - Actors without `read:case:all` only ever list or search their own cases.
//! - Creators below lead partner may edit a case only while it is a draft;
//!   status changes need lead partner or above.

use super::access::{load_active_case, load_readable_case, Actor};
use crate::config::{CoreConfig, ValidationConfig};
use crate::error::{CoreError, CoreResult};
use crate::model::case::{Case, CaseStatus};
use crate::model::role::Permission;
use crate::model::{now_epoch_ms, CaseId, Metadata, UserId};
use crate::repo::case_repo::{CaseListQuery, CaseRepository};
use crate::repo::conflict_repo::{ConflictListQuery, ConflictRepository};
use crate::repo::observation_repo::{ObservationListQuery, ObservationRepository};
use log::info;
use serde::Serialize;

/// Input for `create_case`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCase {
    pub title: String,
    pub company_name: String,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub metadata: Metadata,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<CaseStatus>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseListResult {
    pub items: Vec<Case>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseStatistics {
    pub case_id: CaseId,
    pub status: CaseStatus,
    pub observation_count: u64,
    pub conflict_count: u64,
    pub unresolved_conflict_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct CaseService<R> {
    repo: R,
    validation: ValidationConfig,
}

impl<R: CaseRepository> CaseService<R> {
    pub fn new(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            validation: config.validation,
        }
    }

    /// Creates a draft case owned by the actor.
    pub fn create_case(&self, actor: &Actor, input: NewCase) -> CoreResult<Case> {
        let title = self.check_title(&input.title)?;
        let company_name = input.company_name.trim();
        if company_name.is_empty() {
            return Err(CoreError::invalid("Company name is required"));
        }

        let mut case = Case::new(title, company_name, actor.user_id);
        case.description = input.description.filter(|value| !value.trim().is_empty());
        case.sector = input.sector.filter(|value| !value.trim().is_empty());
        case.metadata = input.metadata;
        self.repo.create_case(&case)?;

        info!(
            "event=case_create module=case status=ok case_id={} created_by={}",
            case.id, case.created_by
        );
        Ok(case)
    }

    pub fn get_case(&self, case_id: CaseId, actor: &Actor) -> CoreResult<Case> {
        load_readable_case(&self.repo, case_id, actor)
    }

    /// Offset listing ordered by `created_at DESC`, optionally by status.
    pub fn list_cases(
        &self,
        actor: &Actor,
        status: Option<CaseStatus>,
        skip: u32,
        limit: u32,
    ) -> CoreResult<CaseListResult> {
        let query = CaseListQuery {
            created_by: own_cases_only(actor),
            status,
            limit: Some(limit),
            offset: skip,
            ..CaseListQuery::default()
        };
        self.run_listing(&query)
    }

    /// Case-insensitive substring search over title and company name.
    pub fn search_cases(
        &self,
        actor: &Actor,
        text: &str,
        skip: u32,
        limit: u32,
    ) -> CoreResult<CaseListResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::invalid("Search text is required"));
        }
        let query = CaseListQuery {
            created_by: own_cases_only(actor),
            text_contains: Some(text.to_string()),
            limit: Some(limit),
            offset: skip,
            ..CaseListQuery::default()
        };
        self.run_listing(&query)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    /// - `Authorization` when the actor is neither the creator nor lead
    ///   partner or above, when a creator edits a non-draft case, or when
    ///   someone below lead partner changes the status.
    /// - `Validation` for a too-short title.
    pub fn update_case(
        &self,
        case_id: CaseId,
        actor: &Actor,
        update: CaseUpdate,
    ) -> CoreResult<Case> {
        let mut case = load_active_case(&self.repo, case_id)?;
        let moderates = actor.role.is_lead_or_above();
        if !moderates {
            if case.created_by != actor.user_id {
                return Err(CoreError::unauthorized("Not authorized to update this case"));
            }
            if case.status != CaseStatus::Draft {
                return Err(CoreError::unauthorized("Can only update draft cases"));
            }
            if update.status.is_some() {
                return Err(CoreError::unauthorized("Not authorized to change case status"));
            }
        }

        if let Some(title) = update.title {
            case.title = self.check_title(&title)?.to_string();
        }
        if let Some(description) = update.description {
            case.description = Some(description).filter(|value| !value.trim().is_empty());
        }
        let previous_status = case.status;
        if let Some(status) = update.status {
            case.status = status;
        }
        if let Some(metadata) = update.metadata {
            case.metadata = metadata;
        }
        case.updated_at = now_epoch_ms().max(case.created_at);
        self.repo.update_case(&case)?;

        info!(
            "event=case_update module=case status=ok case_id={} updated_by={} case_status={}->{}",
            case.id,
            actor.user_id,
            previous_status.as_str(),
            case.status.as_str()
        );
        Ok(case)
    }

    /// Tombstones a case. Allowed for its creator and lead partners and above.
    pub fn soft_delete_case(&self, case_id: CaseId, actor: &Actor) -> CoreResult<()> {
        let case = load_active_case(&self.repo, case_id)?;
        if !actor.owns_or_moderates(case.created_by) {
            return Err(CoreError::unauthorized("Not authorized to delete this case"));
        }

        self.repo.soft_delete_case(case.id, now_epoch_ms())?;
        info!(
            "event=case_delete module=case status=ok case_id={} deleted_by={}",
            case.id, actor.user_id
        );
        Ok(())
    }

    fn check_title<'a>(&self, raw: &'a str) -> CoreResult<&'a str> {
        let title = raw.trim();
        if title.chars().count() < self.validation.min_case_title_chars {
            return Err(CoreError::invalid(format!(
                "Case title must be at least {} characters",
                self.validation.min_case_title_chars
            )));
        }
        Ok(title)
    }

    fn run_listing(&self, query: &CaseListQuery) -> CoreResult<CaseListResult> {
        let total = self.repo.count_cases(query)?;
        let items = self.repo.list_cases(query)?;
        Ok(CaseListResult { items, total })
    }
}

impl<S> CaseService<S>
where
    S: CaseRepository + ObservationRepository + ConflictRepository,
{
    /// Observation and conflict counts of one readable case.
    pub fn case_statistics(&self, case_id: CaseId, actor: &Actor) -> CoreResult<CaseStatistics> {
        let case = load_readable_case(&self.repo, case_id, actor)?;
        let observation_count = self
            .repo
            .count_observations(&ObservationListQuery::for_case(case.id))?;
        let conflict_count = self
            .repo
            .count_conflicts(&ConflictListQuery::for_case(case.id))?;
        let unresolved_conflict_count = self.repo.count_conflicts(&ConflictListQuery {
            resolved: Some(false),
            ..ConflictListQuery::for_case(case.id)
        })?;

        Ok(CaseStatistics {
            case_id: case.id,
            status: case.status,
            observation_count,
            conflict_count,
            unresolved_conflict_count,
            created_at: case.created_at,
            updated_at: case.updated_at,
        })
    }
}

fn own_cases_only(actor: &Actor) -> Option<UserId> {
    (!actor.role.has_permission(Permission::ReadCaseAll)).then_some(actor.user_id)
}
