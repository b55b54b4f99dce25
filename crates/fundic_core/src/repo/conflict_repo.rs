//! Conflict repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Conflict rows are never deleted.
//! - `(case_id, observation_id_1, observation_id_2)` is unique; batch
//!   insertion skips pairs that already exist and reports only new rows.
//! - Severity listings order by `severity DESC, detected_at DESC, id ASC`.

use super::{
    bool_to_int, parse_flag, parse_optional_uuid, parse_uuid, push_cursor_filter,
    push_limit_offset, RepoError, RepoResult, SqliteStore,
};
use crate::model::conflict::{Conflict, ConflictType, ObservationPair};
use crate::model::{CaseId, ConflictId};
use crate::pagination::{CursorKey, CursorKeyed};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use std::collections::HashSet;

const CONFLICT_SELECT_SQL: &str = "SELECT
    id,
    case_id,
    observation_id_1,
    observation_id_2,
    conflict_type,
    severity,
    description,
    detected_at,
    is_resolved,
    resolved_by,
    resolved_at,
    resolution_notes
FROM conflicts";

/// Query options for severity-ordered conflict listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictListQuery {
    pub case_id: CaseId,
    /// `None` lists both resolved and unresolved conflicts.
    pub resolved: Option<bool>,
    /// Inclusive lower severity bound.
    pub min_severity: Option<f64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ConflictListQuery {
    pub fn for_case(case_id: CaseId) -> Self {
        Self {
            case_id,
            resolved: None,
            min_severity: None,
            limit: None,
            offset: 0,
        }
    }
}

pub trait ConflictRepository {
    fn get_conflict(&self, id: ConflictId) -> RepoResult<Option<Conflict>>;
    fn list_conflicts(&self, query: &ConflictListQuery) -> RepoResult<Vec<Conflict>>;
    /// Row count for `query`, ignoring its limit/offset.
    fn count_conflicts(&self, query: &ConflictListQuery) -> RepoResult<u64>;
    /// Canonical pairs already recorded for a case, resolved or not.
    fn list_conflict_pairs(&self, case_id: CaseId) -> RepoResult<HashSet<ObservationPair>>;
    /// Inserts all conflicts in one transaction, skipping pairs that already
    /// exist. Returns the conflicts actually inserted, in input order.
    fn insert_conflicts(&self, conflicts: &[Conflict]) -> RepoResult<Vec<Conflict>>;
    fn update_resolution(&self, conflict: &Conflict) -> RepoResult<()>;
    /// Lists conflicts ordered by `(detected_at DESC, id ASC)`, strictly
    /// after `after` when set.
    fn list_conflicts_after(
        &self,
        case_id: CaseId,
        resolved: Option<bool>,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<Conflict>>;
}

impl CursorKeyed for Conflict {
    fn cursor_key(&self) -> CursorKey {
        CursorKey::new(self.detected_at, self.id)
    }
}

impl ConflictRepository for SqliteStore<'_> {
    fn get_conflict(&self, id: ConflictId) -> RepoResult<Option<Conflict>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONFLICT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_conflict_row(row)?));
        }
        Ok(None)
    }

    fn list_conflicts(&self, query: &ConflictListQuery) -> RepoResult<Vec<Conflict>> {
        let (mut sql, mut bind_values) = filtered_sql(CONFLICT_SELECT_SQL, query);
        sql.push_str(" ORDER BY severity DESC, detected_at DESC, id ASC");
        push_limit_offset(&mut sql, &mut bind_values, query.limit, query.offset);
        self.query_conflicts(&sql, bind_values)
    }

    fn count_conflicts(&self, query: &ConflictListQuery) -> RepoResult<u64> {
        let (sql, bind_values) = filtered_sql("SELECT COUNT(*) FROM conflicts", query);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative conflict count {count}")))
    }

    fn list_conflict_pairs(&self, case_id: CaseId) -> RepoResult<HashSet<ObservationPair>> {
        let mut stmt = self.conn.prepare(
            "SELECT observation_id_1, observation_id_2
             FROM conflicts
             WHERE case_id = ?1;",
        )?;
        let mut rows = stmt.query([case_id.to_string()])?;
        let mut pairs = HashSet::new();
        while let Some(row) = rows.next()? {
            let first: String = row.get(0)?;
            let second: String = row.get(1)?;
            let pair = ObservationPair::new(
                parse_uuid(&first, "conflicts.observation_id_1")?,
                parse_uuid(&second, "conflicts.observation_id_2")?,
            )
            .ok_or_else(|| {
                RepoError::InvalidData(format!("conflict pair repeats observation `{first}`"))
            })?;
            pairs.insert(pair);
        }
        Ok(pairs)
    }

    fn insert_conflicts(&self, conflicts: &[Conflict]) -> RepoResult<Vec<Conflict>> {
        for conflict in conflicts {
            conflict.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(conflicts.len());
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO conflicts (
                    id,
                    case_id,
                    observation_id_1,
                    observation_id_2,
                    conflict_type,
                    severity,
                    description,
                    detected_at,
                    is_resolved,
                    resolved_by,
                    resolved_at,
                    resolution_notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            )?;
            for conflict in conflicts {
                let changed = stmt.execute(params![
                    conflict.id.to_string(),
                    conflict.case_id.to_string(),
                    conflict.observation_id_1.to_string(),
                    conflict.observation_id_2.to_string(),
                    conflict.conflict_type.as_str(),
                    conflict.severity,
                    conflict.description.as_str(),
                    conflict.detected_at,
                    bool_to_int(conflict.is_resolved),
                    conflict.resolved_by.map(|id| id.to_string()),
                    conflict.resolved_at,
                    conflict.resolution_notes.as_deref(),
                ])?;
                if changed == 1 {
                    inserted.push(conflict.clone());
                }
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn update_resolution(&self, conflict: &Conflict) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE conflicts
             SET
                is_resolved = ?1,
                resolved_by = ?2,
                resolved_at = ?3,
                resolution_notes = ?4
             WHERE id = ?5;",
            params![
                bool_to_int(conflict.is_resolved),
                conflict.resolved_by.map(|id| id.to_string()),
                conflict.resolved_at,
                conflict.resolution_notes.as_deref(),
                conflict.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "conflict",
                id: conflict.id,
            });
        }
        Ok(())
    }

    fn list_conflicts_after(
        &self,
        case_id: CaseId,
        resolved: Option<bool>,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<Conflict>> {
        let query = ConflictListQuery {
            resolved,
            ..ConflictListQuery::for_case(case_id)
        };
        let (mut sql, mut bind_values) = filtered_sql(CONFLICT_SELECT_SQL, &query);
        push_cursor_filter(&mut sql, &mut bind_values, after, "detected_at", "id");
        sql.push_str(" ORDER BY detected_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        self.query_conflicts(&sql, bind_values)
    }
}

impl SqliteStore<'_> {
    fn query_conflicts(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Conflict>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut conflicts = Vec::new();
        while let Some(row) = rows.next()? {
            conflicts.push(parse_conflict_row(row)?);
        }
        Ok(conflicts)
    }
}

fn filtered_sql(select: &str, query: &ConflictListQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE case_id = ?");
    let mut bind_values = vec![Value::Text(query.case_id.to_string())];

    if let Some(resolved) = query.resolved {
        sql.push_str(" AND is_resolved = ?");
        bind_values.push(Value::Integer(bool_to_int(resolved)));
    }
    if let Some(min_severity) = query.min_severity {
        sql.push_str(" AND severity >= ?");
        bind_values.push(Value::Real(min_severity));
    }

    (sql, bind_values)
}

fn parse_conflict_row(row: &Row<'_>) -> RepoResult<Conflict> {
    let id_text: String = row.get("id")?;
    let case_id_text: String = row.get("case_id")?;
    let first_text: String = row.get("observation_id_1")?;
    let second_text: String = row.get("observation_id_2")?;
    let type_text: String = row.get("conflict_type")?;
    let conflict_type = ConflictType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid conflict type `{type_text}` in conflicts.conflict_type"
        ))
    })?;

    let conflict = Conflict {
        id: parse_uuid(&id_text, "conflicts.id")?,
        case_id: parse_uuid(&case_id_text, "conflicts.case_id")?,
        observation_id_1: parse_uuid(&first_text, "conflicts.observation_id_1")?,
        observation_id_2: parse_uuid(&second_text, "conflicts.observation_id_2")?,
        conflict_type,
        severity: row.get("severity")?,
        description: row.get("description")?,
        detected_at: row.get("detected_at")?,
        is_resolved: parse_flag(row.get("is_resolved")?, "conflicts.is_resolved")?,
        resolved_by: parse_optional_uuid(row.get("resolved_by")?, "conflicts.resolved_by")?,
        resolved_at: row.get("resolved_at")?,
        resolution_notes: row.get("resolution_notes")?,
    };
    conflict.validate()?;
    Ok(conflict)
}
