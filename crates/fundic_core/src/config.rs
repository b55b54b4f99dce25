//! Core configuration.
//!
//! # Responsibility
//! - Hold every tunable the services read (page sizes, validation minimums,
//!   default severity threshold, logging and database locations).
//! - Load from TOML with per-field defaults.
//!
//! # Invariants
//! - Configuration is constructed once by the caller and passed into each
//!   service; there is no process-wide settings instance.
//! - Conflict detection cutoffs are constants in `service::conflict_analysis`
//!   and are not configurable.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound accepted for `pagination.max_limit`.
pub const PAGE_LIMIT_CEILING: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub pagination: PaginationConfig,
    pub validation: ValidationConfig,
    pub conflicts: ConflictConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size used when the requested limit is missing or out of range.
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub min_observation_content_chars: usize,
    pub min_case_title_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_observation_content_chars: 10,
            min_case_title_chars: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConflictConfig {
    /// Threshold used by `high_severity` when the caller passes none.
    pub high_severity_threshold: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            high_severity_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl CoreConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pagination = &self.pagination;
        if pagination.max_limit == 0 || pagination.max_limit > PAGE_LIMIT_CEILING {
            return Err(ConfigError::Invalid {
                field: "pagination.max_limit",
                reason: format!("must be within 1..={PAGE_LIMIT_CEILING}"),
            });
        }
        if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
            return Err(ConfigError::Invalid {
                field: "pagination.default_limit",
                reason: format!("must be within 1..={}", pagination.max_limit),
            });
        }

        let threshold = self.conflicts.high_severity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                field: "conflicts.high_severity_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }

        Ok(())
    }
}
