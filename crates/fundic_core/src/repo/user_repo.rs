//! User directory repository.

use super::{
    bool_to_int, is_unique_violation, parse_flag, parse_uuid, push_cursor_filter, RepoError,
    RepoResult, SqliteStore,
};
use crate::model::role::{parse_user_role, UserRole};
use crate::model::user::User;
use crate::model::UserId;
use crate::pagination::{CursorKey, CursorKeyed};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    full_name,
    department,
    role,
    is_active,
    created_at,
    updated_at
FROM users";

/// Filters for cursor listing of users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Restrict to exactly this user (analyst self-view).
    pub only_id: Option<UserId>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Exact match on the stored (lowercased) email.
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Persists name, department and role changes.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn set_user_active(&self, id: UserId, is_active: bool, updated_at: i64) -> RepoResult<()>;
    /// Lists users ordered by `(created_at DESC, id ASC)`, strictly after
    /// `after` when set.
    fn list_users_after(
        &self,
        filter: &UserFilter,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<User>>;
}

impl CursorKeyed for User {
    fn cursor_key(&self) -> CursorKey {
        CursorKey::new(self.created_at, self.id)
    }
}

impl UserRepository for SqliteStore<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO users (
                id,
                email,
                full_name,
                department,
                role,
                is_active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                user.id.to_string(),
                user.email.as_str(),
                user.full_name.as_str(),
                user.department.as_deref(),
                user.role.as_str(),
                bool_to_int(user.is_active),
                user.created_at,
                user.updated_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(user.id),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Duplicate {
                entity: "user",
                key: user.email.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE email = ?1;"))?;
        let mut rows = stmt.query([email])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        let changed = self.conn.execute(
            "UPDATE users
             SET full_name = ?1, department = ?2, role = ?3, updated_at = ?4
             WHERE id = ?5;",
            params![
                user.full_name.as_str(),
                user.department.as_deref(),
                user.role.as_str(),
                user.updated_at,
                user.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    fn set_user_active(&self, id: UserId, is_active: bool, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET is_active = ?1, updated_at = ?2
             WHERE id = ?3;",
            params![bool_to_int(is_active), updated_at, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn list_users_after(
        &self,
        filter: &UserFilter,
        after: Option<&CursorKey>,
        limit: u32,
    ) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(id) = filter.only_id {
            sql.push_str(" AND id = ?");
            bind_values.push(Value::Text(id.to_string()));
        }
        if let Some(role) = filter.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        if let Some(is_active) = filter.is_active {
            sql.push_str(" AND is_active = ?");
            bind_values.push(Value::Integer(bool_to_int(is_active)));
        }
        push_cursor_filter(&mut sql, &mut bind_values, after, "created_at", "id");

        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = parse_user_role(&role_text)
        .map_err(|err| RepoError::InvalidData(format!("{err} in users.role")))?;

    let user = User {
        id: parse_uuid(&id_text, "users.id")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        department: row.get("department")?,
        role,
        is_active: parse_flag(row.get("is_active")?, "users.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate()?;
    Ok(user)
}
