//! Case repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `get_case(id, false)` never returns a tombstoned case.
//! - Soft delete only flips `is_deleted`; rows are never removed.
//! - Listings exclude tombstoned cases and are ordered `created_at DESC, id ASC`.

use super::{
    bool_to_int, metadata_to_db, parse_flag, parse_metadata, parse_uuid, push_limit_offset,
    RepoError, RepoResult, SqliteStore,
};
use crate::model::case::{Case, CaseStatus};
use crate::model::{CaseId, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const CASE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    company_name,
    sector,
    status,
    created_by,
    created_at,
    updated_at,
    is_deleted,
    metadata
FROM cases";

/// Query options for offset listings of active cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseListQuery {
    /// Restrict to cases created by this user.
    pub created_by: Option<UserId>,
    pub status: Option<CaseStatus>,
    /// Case-insensitive substring match on title or company name.
    pub text_contains: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait CaseRepository {
    fn create_case(&self, case: &Case) -> RepoResult<CaseId>;
    fn update_case(&self, case: &Case) -> RepoResult<()>;
    fn get_case(&self, id: CaseId, include_deleted: bool) -> RepoResult<Option<Case>>;
    fn soft_delete_case(&self, id: CaseId, updated_at: i64) -> RepoResult<()>;
    fn list_cases(&self, query: &CaseListQuery) -> RepoResult<Vec<Case>>;
    /// Row count for `query`, ignoring its limit/offset.
    fn count_cases(&self, query: &CaseListQuery) -> RepoResult<u64>;
}

impl CaseRepository for SqliteStore<'_> {
    fn create_case(&self, case: &Case) -> RepoResult<CaseId> {
        case.validate()?;

        self.conn.execute(
            "INSERT INTO cases (
                id,
                title,
                description,
                company_name,
                sector,
                status,
                created_by,
                created_at,
                updated_at,
                is_deleted,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                case.id.to_string(),
                case.title.as_str(),
                case.description.as_deref(),
                case.company_name.as_str(),
                case.sector.as_deref(),
                case.status.as_str(),
                case.created_by.to_string(),
                case.created_at,
                case.updated_at,
                bool_to_int(case.is_deleted),
                metadata_to_db(&case.metadata)?,
            ],
        )?;

        Ok(case.id)
    }

    fn update_case(&self, case: &Case) -> RepoResult<()> {
        case.validate()?;

        let changed = self.conn.execute(
            "UPDATE cases
             SET
                title = ?1,
                description = ?2,
                company_name = ?3,
                sector = ?4,
                status = ?5,
                updated_at = ?6,
                is_deleted = ?7,
                metadata = ?8
             WHERE id = ?9;",
            params![
                case.title.as_str(),
                case.description.as_deref(),
                case.company_name.as_str(),
                case.sector.as_deref(),
                case.status.as_str(),
                case.updated_at,
                bool_to_int(case.is_deleted),
                metadata_to_db(&case.metadata)?,
                case.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "case",
                id: case.id,
            });
        }
        Ok(())
    }

    fn get_case(&self, id: CaseId, include_deleted: bool) -> RepoResult<Option<Case>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CASE_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_case_row(row)?));
        }
        Ok(None)
    }

    fn soft_delete_case(&self, id: CaseId, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cases
             SET is_deleted = 1, updated_at = MAX(updated_at, ?1)
             WHERE id = ?2;",
            params![updated_at, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "case", id });
        }
        Ok(())
    }

    fn list_cases(&self, query: &CaseListQuery) -> RepoResult<Vec<Case>> {
        let (mut sql, mut bind_values) = filtered_sql(CASE_SELECT_SQL, query);
        sql.push_str(" ORDER BY created_at DESC, id ASC");
        push_limit_offset(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cases = Vec::new();
        while let Some(row) = rows.next()? {
            cases.push(parse_case_row(row)?);
        }
        Ok(cases)
    }

    fn count_cases(&self, query: &CaseListQuery) -> RepoResult<u64> {
        let (sql, bind_values) = filtered_sql("SELECT COUNT(*) FROM cases", query);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative case count {count}")))
    }
}

fn filtered_sql(select: &str, query: &CaseListQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE is_deleted = 0");
    let mut bind_values = Vec::new();

    if let Some(created_by) = query.created_by {
        sql.push_str(" AND created_by = ?");
        bind_values.push(Value::Text(created_by.to_string()));
    }
    if let Some(status) = query.status {
        sql.push_str(" AND status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(needle) = query.text_contains.as_deref() {
        sql.push_str(
            " AND (instr(fold_case(title), fold_case(?)) > 0
                OR instr(fold_case(company_name), fold_case(?)) > 0)",
        );
        bind_values.push(Value::Text(needle.to_string()));
        bind_values.push(Value::Text(needle.to_string()));
    }

    (sql, bind_values)
}

fn parse_case_row(row: &Row<'_>) -> RepoResult<Case> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = CaseStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid case status `{status_text}` in cases.status"))
    })?;
    let created_by_text: String = row.get("created_by")?;
    let metadata_text: String = row.get("metadata")?;

    let case = Case {
        id: parse_uuid(&id_text, "cases.id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        company_name: row.get("company_name")?,
        sector: row.get("sector")?,
        status,
        created_by: parse_uuid(&created_by_text, "cases.created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "cases.is_deleted")?,
        metadata: parse_metadata(&metadata_text, "cases.metadata")?,
    };
    case.validate()?;
    Ok(case)
}
