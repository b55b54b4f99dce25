//! Core domain logic for fund IC case management.
//! This crate is the single source of truth for business invariants:
//! case access, observation lifecycle, conflict detection/resolution and
//! cursor pagination.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod pagination;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{CoreError, CoreResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::case::{Case, CaseStatus};
pub use model::conflict::{Conflict, ConflictType, ObservationPair};
pub use model::observation::{DisclosureLevel, Observation, SourceTag};
pub use model::role::{Permission, UserRole};
pub use model::user::User;
pub use pagination::{CursorPage, PageInfo, Paginator};
pub use repo::{RepoError, RepoResult, SqliteStore};
pub use service::case_service::{CaseService, CaseStatistics};
pub use service::conflict_service::{ConflictService, ConflictStatistics};
pub use service::observation_service::ObservationService;
pub use service::user_service::UserService;
pub use service::Actor;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
