//! Observation use-cases.
//!
//! # Invariants
//! - Observations attach only to active cases.
//! - Content length is checked in characters against the configured minimum
//!   on create and on every content update.
//! - Section labels are trimmed with inner whitespace collapsed.
//! - Reads go through the parent case's access check.

use super::access::{load_active_case, load_readable_case, require_lead_or_above, Actor};
use crate::config::{CoreConfig, ValidationConfig};
use crate::error::{CoreError, CoreResult};
use crate::model::observation::{DisclosureLevel, Observation, SourceTag};
use crate::model::{now_epoch_ms, CaseId, Metadata, ObservationId};
use crate::pagination::{CursorPage, Paginator};
use crate::repo::case_repo::CaseRepository;
use crate::repo::observation_repo::{ObservationListQuery, ObservationRepository};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Input for `create_observation`; unset tags take `PUB` / `PRIVATE`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewObservation {
    pub section: String,
    pub content: String,
    pub source_tag: Option<SourceTag>,
    pub disclosure_level: Option<DisclosureLevel>,
    pub metadata: Metadata,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationUpdate {
    pub section: Option<String>,
    pub content: Option<String>,
    pub source_tag: Option<SourceTag>,
    pub disclosure_level: Option<DisclosureLevel>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    pub source_tag: Option<SourceTag>,
    pub disclosure_level: Option<DisclosureLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationListResult {
    pub items: Vec<Observation>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationStatistics {
    pub case_id: CaseId,
    pub total_count: u64,
    pub verified_count: u64,
    pub unverified_count: u64,
    pub by_source: BTreeMap<String, u64>,
    pub by_disclosure: BTreeMap<String, u64>,
}

pub struct ObservationService<S> {
    store: S,
    paginator: Paginator,
    validation: ValidationConfig,
}

impl<S> ObservationService<S>
where
    S: CaseRepository + ObservationRepository,
{
    pub fn new(store: S, config: &CoreConfig) -> Self {
        Self {
            store,
            paginator: Paginator::new(config.pagination),
            validation: config.validation,
        }
    }

    /// Attaches a new observation to an active case.
    pub fn create_observation(
        &self,
        case_id: CaseId,
        actor: &Actor,
        input: NewObservation,
    ) -> CoreResult<Observation> {
        let case = load_active_case(&self.store, case_id)?;
        let section = normalize_section(&input.section)?;
        self.check_content(&input.content)?;

        let mut observation = Observation::new(case.id, section, input.content, actor.user_id);
        if let Some(source_tag) = input.source_tag {
            observation.source_tag = source_tag;
        }
        if let Some(disclosure_level) = input.disclosure_level {
            observation.disclosure_level = disclosure_level;
        }
        observation.metadata = input.metadata;
        self.store.create_observation(&observation)?;

        info!(
            "event=observation_create module=observation status=ok observation_id={} case_id={} source={} disclosure={}",
            observation.id,
            case.id,
            observation.source_tag.as_str(),
            observation.disclosure_level.as_str()
        );
        Ok(observation)
    }

    pub fn get_observation(&self, id: ObservationId, actor: &Actor) -> CoreResult<Observation> {
        let observation = self.load_observation(id)?;
        load_readable_case(&self.store, observation.case_id, actor)?;
        Ok(observation)
    }

    /// Applies a partial update. Allowed for the creator and lead partners
    /// and above.
    pub fn update_observation(
        &self,
        id: ObservationId,
        actor: &Actor,
        update: ObservationUpdate,
    ) -> CoreResult<Observation> {
        let mut observation = self.load_observation(id)?;
        if !actor.owns_or_moderates(observation.created_by) {
            return Err(CoreError::unauthorized(
                "Not authorized to update this observation",
            ));
        }

        if let Some(section) = update.section {
            observation.section = normalize_section(&section)?;
        }
        if let Some(content) = update.content {
            self.check_content(&content)?;
            observation.content = content;
        }
        if let Some(source_tag) = update.source_tag {
            observation.source_tag = source_tag;
        }
        if let Some(disclosure_level) = update.disclosure_level {
            observation.disclosure_level = disclosure_level;
        }
        if let Some(metadata) = update.metadata {
            observation.metadata = metadata;
        }
        observation.updated_at = now_epoch_ms().max(observation.created_at);
        self.store.update_observation(&observation)?;

        info!(
            "event=observation_update module=observation status=ok observation_id={} updated_by={}",
            observation.id, actor.user_id
        );
        Ok(observation)
    }

    pub fn soft_delete_observation(&self, id: ObservationId, actor: &Actor) -> CoreResult<()> {
        let observation = self.load_observation(id)?;
        if !actor.owns_or_moderates(observation.created_by) {
            return Err(CoreError::unauthorized(
                "Not authorized to delete this observation",
            ));
        }

        self.store.soft_delete_observation(id, now_epoch_ms())?;
        info!(
            "event=observation_delete module=observation status=ok observation_id={} deleted_by={}",
            id, actor.user_id
        );
        Ok(())
    }

    /// Marks an observation verified by the actor.
    pub fn verify_observation(&self, id: ObservationId, actor: &Actor) -> CoreResult<Observation> {
        let mut observation = self.load_observation(id)?;
        require_lead_or_above(actor, "Only lead partners and above can verify observations")?;

        let now = now_epoch_ms().max(observation.created_at);
        observation.mark_verified(actor.user_id, now);
        observation.updated_at = now;
        self.store.update_observation(&observation)?;

        info!(
            "event=observation_verify module=observation status=ok observation_id={} verified_by={}",
            observation.id, actor.user_id
        );
        Ok(observation)
    }

    /// Offset listing ordered by `created_at DESC, id ASC`.
    pub fn list_observations(
        &self,
        case_id: CaseId,
        actor: &Actor,
        filter: ObservationFilter,
        skip: u32,
        limit: u32,
    ) -> CoreResult<ObservationListResult> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let query = ObservationListQuery {
            source_tag: filter.source_tag,
            disclosure_level: filter.disclosure_level,
            limit: Some(limit),
            offset: skip,
            ..ObservationListQuery::for_case(case.id)
        };
        self.run_listing(&query)
    }

    /// Case-insensitive substring search over content.
    pub fn search_observations(
        &self,
        case_id: CaseId,
        actor: &Actor,
        text: &str,
        skip: u32,
        limit: u32,
    ) -> CoreResult<ObservationListResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::invalid("Search text is required"));
        }
        let case = load_readable_case(&self.store, case_id, actor)?;
        let query = ObservationListQuery {
            content_contains: Some(text.to_string()),
            limit: Some(limit),
            offset: skip,
            ..ObservationListQuery::for_case(case.id)
        };
        self.run_listing(&query)
    }

    /// Cursor listing ordered by `created_at DESC, id ASC`.
    pub fn list_observations_page(
        &self,
        case_id: CaseId,
        actor: &Actor,
        cursor: Option<&str>,
        limit: i64,
    ) -> CoreResult<CursorPage<Observation>> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let page = self.paginator.paginate(cursor, limit, |after, fetch_limit| {
            self.store.list_observations_after(case.id, after, fetch_limit)
        })?;
        Ok(page)
    }

    pub fn observation_statistics(
        &self,
        case_id: CaseId,
        actor: &Actor,
    ) -> CoreResult<ObservationStatistics> {
        let case = load_readable_case(&self.store, case_id, actor)?;
        let observations = self.store.list_active_observations(case.id)?;

        let total_count = observations.len() as u64;
        let verified_count = observations.iter().filter(|obs| obs.is_verified).count() as u64;
        let mut by_source = BTreeMap::new();
        let mut by_disclosure = BTreeMap::new();
        for observation in &observations {
            *by_source
                .entry(observation.source_tag.as_str().to_string())
                .or_insert(0) += 1;
            *by_disclosure
                .entry(observation.disclosure_level.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(ObservationStatistics {
            case_id: case.id,
            total_count,
            verified_count,
            unverified_count: total_count - verified_count,
            by_source,
            by_disclosure,
        })
    }

    fn load_observation(&self, id: ObservationId) -> CoreResult<Observation> {
        self.store
            .get_observation(id, false)?
            .ok_or_else(|| CoreError::not_found("Observation not found"))
    }

    fn run_listing(&self, query: &ObservationListQuery) -> CoreResult<ObservationListResult> {
        let total = self.store.count_observations(query)?;
        let items = self.store.list_observations(query)?;
        Ok(ObservationListResult { items, total })
    }

    fn check_content(&self, content: &str) -> CoreResult<()> {
        let min_chars = self.validation.min_observation_content_chars;
        if content.trim().chars().count() < min_chars {
            return Err(CoreError::invalid(format!(
                "Observation content must be at least {min_chars} characters"
            )));
        }
        Ok(())
    }
}

fn normalize_section(raw: &str) -> CoreResult<String> {
    let section = WHITESPACE_RUN.replace_all(raw.trim(), " ");
    if section.is_empty() {
        return Err(CoreError::invalid("Section is required"));
    }
    Ok(section.into_owned())
}

#[cfg(test)]
mod tests {
    use super::normalize_section;

    #[test]
    fn section_whitespace_is_collapsed() {
        assert_eq!(
            normalize_section("  Market \t\n Analysis ").unwrap(),
            "Market Analysis"
        );
    }

    #[test]
    fn blank_section_is_rejected() {
        let err = normalize_section(" \n ").unwrap_err();
        assert_eq!(err.to_string(), "Section is required");
    }
}
