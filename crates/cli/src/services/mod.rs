//! Operator services that sit outside schema healing.

pub mod backup;
pub mod purge;
