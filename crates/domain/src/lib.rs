//! Domain layer for the records admin tooling.
//!
//! This crate contains:
//! - Domain vocabulary (document lifecycle, user roles, document types)
//! - Pure business rules (document validity and purge classification)
//! - Audit trail entry construction

pub mod models;
pub mod services;
