//! Observation repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Every list/read path excludes `is_deleted = 1` unless asked otherwise.
//! - Offset listings are ordered `created_at DESC, id ASC`; the detection
//!   scan is ordered `created_at ASC, id ASC`.

use super::{
    bool_to_int, metadata_to_db, parse_flag, parse_metadata, parse_optional_uuid, parse_uuid,
    push_cursor_filter, push_limit_offset, RepoError, RepoResult, SqliteStore,
};
use crate::model::observation::{DisclosureLevel, Observation, SourceTag};
use crate::model::{CaseId, ObservationId};
use crate::pagination::{CursorKey, CursorKeyed};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const OBSERVATION_SELECT_SQL: &str = "SELECT
    id,
    case_id,
    section,
    content,
    source_tag,
    disclosure_level,
    created_by,
    created_at,
    updated_at,
    is_verified,
    verified_by,
    verified_at,
    is_deleted,
    metadata
FROM observations";

/// Query options for listing the observations of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationListQuery {
    pub case_id: CaseId,
    pub source_tag: Option<SourceTag>,
    pub disclosure_level: Option<DisclosureLevel>,
    /// Case-insensitive substring match on content, Unicode-aware.
    pub content_contains: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ObservationListQuery {
    pub fn for_case(case_id: CaseId) -> Self {
        Self {
            case_id,
            source_tag: None,
            disclosure_level: None,
            content_contains: None,
            limit: None,
            offset: 0,
        }
    }
}

pub trait ObservationRepository {
    fn create_observation(&self, observation: &Observation) -> RepoResult<ObservationId>;
    fn update_observation(&self, observation: &Observation) -> RepoResult<()>;
    fn get_observation(
        &self,
        id: ObservationId,
        include_deleted: bool,
    ) -> RepoResult<Option<Observation>>;
    fn soft_delete_observation(&self, id: ObservationId, updated_at: i64) -> RepoResult<()>;
    fn list_observations(&self, query: &ObservationListQuery) -> RepoResult<Vec<Observation>>;
    /// Row count for `query`, ignoring its limit/offset.
    fn count_observations(&self, query: &ObservationListQuery) -> RepoResult<u64>;
    /// Every active observation of a case, oldest first.
    fn list_active_observations(&self, case_id: CaseId) -> RepoResult<Vec<Observation>>;
    fn list_observations_after(
        &self,
        case_id: CaseId,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<Observation>>;
}

impl CursorKeyed for Observation {
    fn cursor_key(&self) -> CursorKey {
        CursorKey::new(self.created_at, self.id)
    }
}

impl ObservationRepository for SqliteStore<'_> {
    fn create_observation(&self, observation: &Observation) -> RepoResult<ObservationId> {
        observation.validate()?;

        self.conn.execute(
            "INSERT INTO observations (
                id,
                case_id,
                section,
                content,
                source_tag,
                disclosure_level,
                created_by,
                created_at,
                updated_at,
                is_verified,
                verified_by,
                verified_at,
                is_deleted,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                observation.id.to_string(),
                observation.case_id.to_string(),
                observation.section.as_str(),
                observation.content.as_str(),
                observation.source_tag.as_str(),
                observation.disclosure_level.as_str(),
                observation.created_by.to_string(),
                observation.created_at,
                observation.updated_at,
                bool_to_int(observation.is_verified),
                observation.verified_by.map(|id| id.to_string()),
                observation.verified_at,
                bool_to_int(observation.is_deleted),
                metadata_to_db(&observation.metadata)?,
            ],
        )?;

        Ok(observation.id)
    }

    fn update_observation(&self, observation: &Observation) -> RepoResult<()> {
        observation.validate()?;

        let changed = self.conn.execute(
            "UPDATE observations
             SET
                section = ?1,
                content = ?2,
                source_tag = ?3,
                disclosure_level = ?4,
                updated_at = ?5,
                is_verified = ?6,
                verified_by = ?7,
                verified_at = ?8,
                is_deleted = ?9,
                metadata = ?10
             WHERE id = ?11;",
            params![
                observation.section.as_str(),
                observation.content.as_str(),
                observation.source_tag.as_str(),
                observation.disclosure_level.as_str(),
                observation.updated_at,
                bool_to_int(observation.is_verified),
                observation.verified_by.map(|id| id.to_string()),
                observation.verified_at,
                bool_to_int(observation.is_deleted),
                metadata_to_db(&observation.metadata)?,
                observation.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "observation",
                id: observation.id,
            });
        }
        Ok(())
    }

    fn get_observation(
        &self,
        id: ObservationId,
        include_deleted: bool,
    ) -> RepoResult<Option<Observation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBSERVATION_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_observation_row(row)?));
        }
        Ok(None)
    }

    fn soft_delete_observation(&self, id: ObservationId, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE observations
             SET is_deleted = 1, updated_at = MAX(updated_at, ?1)
             WHERE id = ?2;",
            params![updated_at, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "observation",
                id,
            });
        }
        Ok(())
    }

    fn list_observations(&self, query: &ObservationListQuery) -> RepoResult<Vec<Observation>> {
        let (mut sql, mut bind_values) = filtered_sql(OBSERVATION_SELECT_SQL, query);
        sql.push_str(" ORDER BY created_at DESC, id ASC");
        push_limit_offset(&mut sql, &mut bind_values, query.limit, query.offset);
        self.query_observations(&sql, bind_values)
    }

    fn count_observations(&self, query: &ObservationListQuery) -> RepoResult<u64> {
        let (sql, bind_values) = filtered_sql("SELECT COUNT(*) FROM observations", query);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative observation count {count}")))
    }

    fn list_active_observations(&self, case_id: CaseId) -> RepoResult<Vec<Observation>> {
        let sql = format!(
            "{OBSERVATION_SELECT_SQL}
             WHERE case_id = ? AND is_deleted = 0
             ORDER BY created_at ASC, id ASC"
        );
        self.query_observations(&sql, vec![Value::Text(case_id.to_string())])
    }

    fn list_observations_after(
        &self,
        case_id: CaseId,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<Observation>> {
        let mut sql = format!("{OBSERVATION_SELECT_SQL} WHERE case_id = ? AND is_deleted = 0");
        let mut bind_values = vec![Value::Text(case_id.to_string())];
        push_cursor_filter(&mut sql, &mut bind_values, after, "created_at", "id");
        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        self.query_observations(&sql, bind_values)
    }
}

impl SqliteStore<'_> {
    fn query_observations(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Observation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut observations = Vec::new();
        while let Some(row) = rows.next()? {
            observations.push(parse_observation_row(row)?);
        }
        Ok(observations)
    }
}

fn filtered_sql(select: &str, query: &ObservationListQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE case_id = ? AND is_deleted = 0");
    let mut bind_values = vec![Value::Text(query.case_id.to_string())];

    if let Some(source_tag) = query.source_tag {
        sql.push_str(" AND source_tag = ?");
        bind_values.push(Value::Text(source_tag.as_str().to_string()));
    }
    if let Some(disclosure_level) = query.disclosure_level {
        sql.push_str(" AND disclosure_level = ?");
        bind_values.push(Value::Text(disclosure_level.as_str().to_string()));
    }
    if let Some(needle) = query.content_contains.as_deref() {
        sql.push_str(" AND instr(fold_case(content), fold_case(?)) > 0");
        bind_values.push(Value::Text(needle.to_string()));
    }

    (sql, bind_values)
}

fn parse_observation_row(row: &Row<'_>) -> RepoResult<Observation> {
    let id_text: String = row.get("id")?;
    let case_id_text: String = row.get("case_id")?;
    let created_by_text: String = row.get("created_by")?;
    let metadata_text: String = row.get("metadata")?;

    let source_text: String = row.get("source_tag")?;
    let source_tag = SourceTag::parse(&source_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid source tag `{source_text}` in observations.source_tag"
        ))
    })?;
    let disclosure_text: String = row.get("disclosure_level")?;
    let disclosure_level = DisclosureLevel::parse(&disclosure_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid disclosure level `{disclosure_text}` in observations.disclosure_level"
        ))
    })?;

    let observation = Observation {
        id: parse_uuid(&id_text, "observations.id")?,
        case_id: parse_uuid(&case_id_text, "observations.case_id")?,
        section: row.get("section")?,
        content: row.get("content")?,
        source_tag,
        disclosure_level,
        created_by: parse_uuid(&created_by_text, "observations.created_by")?,
        is_verified: parse_flag(row.get("is_verified")?, "observations.is_verified")?,
        verified_by: parse_optional_uuid(row.get("verified_by")?, "observations.verified_by")?,
        verified_at: row.get("verified_at")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "observations.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        metadata: parse_metadata(&metadata_text, "observations.metadata")?,
    };
    observation.validate()?;
    Ok(observation)
}
