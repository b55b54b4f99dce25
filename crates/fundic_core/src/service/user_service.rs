//! User directory use-cases.

use super::access::Actor;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::role::UserRole;
use crate::model::user::{normalize_email, User};
use crate::model::{now_epoch_ms, UserId};
use crate::pagination::{CursorPage, Paginator};
use crate::repo::user_repo::{UserFilter, UserRepository};
use log::info;

/// Input for `create_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub department: Option<String>,
    pub role: UserRole,
}

/// Partial profile update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    /// `Some("")` clears the department.
    pub department: Option<String>,
    pub role: Option<UserRole>,
}

/// Optional filters for `list_users_page`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserListFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

pub struct UserService<R> {
    repo: R,
    paginator: Paginator,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            paginator: Paginator::new(config.pagination),
        }
    }

    /// Registers a user; the email is lowercased and must be unique.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or blank name.
    /// - `Conflict` when the email is already registered.
    pub fn create_user(&self, input: NewUser) -> CoreResult<User> {
        let email = input.email.trim();
        if !looks_like_email(email) {
            return Err(CoreError::invalid(format!("Invalid email address `{email}`")));
        }
        if input.full_name.trim().is_empty() {
            return Err(CoreError::invalid("Full name is required"));
        }

        let mut user = User::new(email, input.full_name.trim(), input.role);
        user.department = input.department.filter(|value| !value.trim().is_empty());
        self.repo.create_user(&user)?;

        info!(
            "event=user_create module=user status=ok user_id={} role={}",
            user.id,
            user.role.as_str()
        );
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> CoreResult<User> {
        self.repo
            .get_user(id)?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    /// Looks a user up by email, compared lowercased.
    pub fn get_user_by_email(&self, email: &str) -> CoreResult<User> {
        self.repo
            .get_user_by_email(&normalize_email(email))?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    /// Updates a profile. Users may edit their own name and department;
    /// admins may edit anyone and are the only ones who change roles.
    pub fn update_user(&self, id: UserId, actor: &Actor, update: UserUpdate) -> CoreResult<User> {
        let is_admin = actor.role == UserRole::Admin;
        if !is_admin && actor.user_id != id {
            return Err(CoreError::unauthorized("Not authorized to update this user"));
        }
        if !is_admin && update.role.is_some() {
            return Err(CoreError::unauthorized("Only admins can change user roles"));
        }

        let mut user = self.get_user(id)?;
        if let Some(full_name) = update.full_name {
            let full_name = full_name.trim();
            if full_name.is_empty() {
                return Err(CoreError::invalid("Full name is required"));
            }
            user.full_name = full_name.to_string();
        }
        if let Some(department) = update.department {
            let department = department.trim();
            user.department = (!department.is_empty()).then(|| department.to_string());
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.updated_at = now_epoch_ms().max(user.created_at);
        self.repo.update_user(&user)?;

        info!(
            "event=user_update module=user status=ok user_id={} updated_by={} role={}",
            user.id,
            actor.user_id,
            user.role.as_str()
        );
        Ok(user)
    }

    /// Deactivates a user. Admins only; users keep their rows.
    pub fn deactivate_user(&self, id: UserId, actor: &Actor) -> CoreResult<User> {
        if actor.role != UserRole::Admin {
            return Err(CoreError::unauthorized("Only admins can deactivate users"));
        }
        let mut user = self.get_user(id)?;
        if !user.is_active {
            return Ok(user);
        }

        let now = now_epoch_ms().max(user.created_at);
        self.repo.set_user_active(user.id, false, now)?;
        user.is_active = false;
        user.updated_at = now;

        info!(
            "event=user_deactivate module=user status=ok user_id={} deactivated_by={}",
            user.id, actor.user_id
        );
        Ok(user)
    }

    /// Cursor listing ordered by `created_at DESC, id ASC`.
    ///
    /// Analysts only ever see their own record.
    pub fn list_users_page(
        &self,
        actor: &Actor,
        filter: UserListFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> CoreResult<CursorPage<User>> {
        let filter = UserFilter {
            only_id: (actor.role == UserRole::Analyst).then_some(actor.user_id),
            role: filter.role,
            is_active: filter.is_active,
        };
        self.page(&filter, cursor, limit)
    }

    /// Active users holding `role`.
    pub fn users_by_role_page(
        &self,
        role: UserRole,
        cursor: Option<&str>,
        limit: i64,
    ) -> CoreResult<CursorPage<User>> {
        let filter = UserFilter {
            role: Some(role),
            is_active: Some(true),
            ..UserFilter::default()
        };
        self.page(&filter, cursor, limit)
    }

    fn page(
        &self,
        filter: &UserFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> CoreResult<CursorPage<User>> {
        let page = self.paginator.paginate(cursor, limit, |after, fetch_limit| {
            self.repo.list_users_after(filter, after, fetch_limit)
        })?;
        Ok(page)
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("analyst@fund.example"));
        assert!(!looks_like_email("analyst.fund.example"));
        assert!(!looks_like_email("@fund.example"));
        assert!(!looks_like_email("a b@fund.example"));
        assert!(!looks_like_email("analyst@localhost"));
    }
}
