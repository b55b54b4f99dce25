//! Requester identity and shared authorization checks.

use crate::error::{CoreError, CoreResult};
use crate::model::case::Case;
use crate::model::role::UserRole;
use crate::model::{CaseId, UserId};
use crate::repo::case_repo::CaseRepository;
use serde::{Deserialize, Serialize};

/// Authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Creator of a record, or lead partner and above.
    pub fn owns_or_moderates(&self, created_by: UserId) -> bool {
        self.user_id == created_by || self.role.is_lead_or_above()
    }
}

pub(crate) fn require_lead_or_above(actor: &Actor, message: &str) -> CoreResult<()> {
    if actor.role.is_lead_or_above() {
        Ok(())
    } else {
        Err(CoreError::unauthorized(message))
    }
}

/// Loads an active case, without access checks.
pub(crate) fn load_active_case<R: CaseRepository>(repo: &R, case_id: CaseId) -> CoreResult<Case> {
    repo.get_case(case_id, false)?
        .ok_or_else(|| CoreError::not_found("Case not found"))
}

/// Loads an active case the actor may read.
///
/// Missing or deleted cases fail with `NotFound` before access is checked.
pub(crate) fn load_readable_case<R: CaseRepository>(
    repo: &R,
    case_id: CaseId,
    actor: &Actor,
) -> CoreResult<Case> {
    let case = load_active_case(repo, case_id)?;
    if !case.readable_by(actor.user_id, actor.role) {
        return Err(CoreError::unauthorized("Not authorized to access this case"));
    }
    Ok(case)
}
