//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce role checks before any write.
//! - Map storage failures into `CoreError`.

pub mod access;
pub mod case_service;
pub mod conflict_analysis;
pub mod conflict_service;
pub mod observation_service;
pub mod user_service;

pub use access::Actor;
