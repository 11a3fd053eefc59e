//! Persistence layer for the records admin tooling.
//!
//! This crate contains:
//! - Database connection management
//! - Catalog introspection and the target schema description
//! - Additive schema healing (phases, backfills, reporting)
//! - Reference data seeding
//! - Entity definitions and repositories used by seeding and purging

pub mod backfill;
pub mod catalog;
pub mod db;
pub mod entities;
pub mod error;
pub mod healer;
pub mod metrics;
pub mod repositories;
pub mod schema;
pub mod seed;
