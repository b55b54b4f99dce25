//! User roles and their static permission sets.
//!
//! # Invariants
//! - Role to permission mapping is a closed, exhaustive match; there is no
//!   runtime-mutable permission table.
//! - `Admin` holds every permission.
//! - Stored/serialized role strings are lowercase snake case.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Organisational role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Analyst,
    LeadPartner,
    IcMember,
    Admin,
}

/// Capability granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ReadCaseOwn,
    ReadCaseAll,
    CreateObservation,
    ReadObservationOwn,
    ReadObservationAll,
    ApproveObservation,
    ReadConflict,
    GenerateReport,
    ExportIcReport,
    ExportLpReport,
}

pub const ROLE_ANALYST: &str = "analyst";
pub const ROLE_LEAD_PARTNER: &str = "lead_partner";
pub const ROLE_IC_MEMBER: &str = "ic_member";
pub const ROLE_ADMIN: &str = "admin";

const ALL_PERMISSIONS: &[Permission] = &[
    Permission::ReadCaseOwn,
    Permission::ReadCaseAll,
    Permission::CreateObservation,
    Permission::ReadObservationOwn,
    Permission::ReadObservationAll,
    Permission::ApproveObservation,
    Permission::ReadConflict,
    Permission::GenerateReport,
    Permission::ExportIcReport,
    Permission::ExportLpReport,
];

impl UserRole {
    /// Stable string id used in storage and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyst => ROLE_ANALYST,
            Self::LeadPartner => ROLE_LEAD_PARTNER,
            Self::IcMember => ROLE_IC_MEMBER,
            Self::Admin => ROLE_ADMIN,
        }
    }

    /// Static capability set of this role.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Analyst => &[
                Permission::ReadCaseOwn,
                Permission::CreateObservation,
                Permission::ReadObservationOwn,
            ],
            Self::LeadPartner => &[
                Permission::ReadCaseAll,
                Permission::ReadObservationAll,
                Permission::ApproveObservation,
                Permission::GenerateReport,
            ],
            Self::IcMember => &[
                Permission::ReadCaseAll,
                Permission::ReadObservationAll,
                Permission::ReadConflict,
                Permission::ApproveObservation,
                Permission::GenerateReport,
                Permission::ExportIcReport,
                Permission::ExportLpReport,
            ],
            Self::Admin => ALL_PERMISSIONS,
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Lead partner, IC member or admin.
    ///
    /// Gates conflict detection/resolution, observation verification and
    /// moderation of other users' observations.
    pub fn is_lead_or_above(self) -> bool {
        match self {
            Self::Analyst => false,
            Self::LeadPartner | Self::IcMember | Self::Admin => true,
        }
    }
}

impl Permission {
    /// `action:resource[:scope]` string used by API consumers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadCaseOwn => "read:case:own",
            Self::ReadCaseAll => "read:case:all",
            Self::CreateObservation => "create:observation",
            Self::ReadObservationOwn => "read:observation:own",
            Self::ReadObservationAll => "read:observation:all",
            Self::ApproveObservation => "approve:observation",
            Self::ReadConflict => "read:conflict",
            Self::GenerateReport => "generate:report",
            Self::ExportIcReport => "export:ic_report",
            Self::ExportLpReport => "export:lp_report",
        }
    }
}

/// Parses one role from its stored string value.
pub fn parse_user_role(value: &str) -> Result<UserRole, RoleParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(RoleParseError::Empty);
    }

    match normalized {
        ROLE_ANALYST => Ok(UserRole::Analyst),
        ROLE_LEAD_PARTNER => Ok(UserRole::LeadPartner),
        ROLE_IC_MEMBER => Ok(UserRole::IcMember),
        ROLE_ADMIN => Ok(UserRole::Admin),
        other => Err(RoleParseError::Unsupported(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleParseError {
    #[error("user role value must not be empty")]
    Empty,
    #[error("user role is unsupported: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::{parse_user_role, Permission, RoleParseError, UserRole};

    #[test]
    fn parses_all_roles() {
        for role in [
            UserRole::Analyst,
            UserRole::LeadPartner,
            UserRole::IcMember,
            UserRole::Admin,
        ] {
            assert_eq!(parse_user_role(role.as_str()).expect("role parse"), role);
        }
    }

    #[test]
    fn rejects_unknown_and_empty_roles() {
        assert_eq!(parse_user_role("  "), Err(RoleParseError::Empty));
        assert_eq!(
            parse_user_role("Admin"),
            Err(RoleParseError::Unsupported("Admin".to_string()))
        );
    }

    #[test]
    fn analyst_is_limited_to_own_scope() {
        let role = UserRole::Analyst;
        assert!(role.has_permission(Permission::ReadCaseOwn));
        assert!(!role.has_permission(Permission::ReadCaseAll));
        assert!(!role.has_permission(Permission::ApproveObservation));
        assert!(!role.is_lead_or_above());
    }

    #[test]
    fn admin_holds_every_permission() {
        for permission in UserRole::IcMember
            .permissions()
            .iter()
            .chain(UserRole::Analyst.permissions())
        {
            assert!(UserRole::Admin.has_permission(*permission));
        }
        assert!(UserRole::Admin.is_lead_or_above());
    }

    #[test]
    fn only_ic_member_and_admin_export_reports() {
        assert!(UserRole::IcMember.has_permission(Permission::ExportLpReport));
        assert!(!UserRole::LeadPartner.has_permission(Permission::ExportLpReport));
        assert_eq!(Permission::ExportIcReport.as_str(), "export:ic_report");
    }
}
