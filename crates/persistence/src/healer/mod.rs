//! Additive schema healing.
//!
//! A run walks a fixed list of phases. Each phase inspects the catalog,
//! plans the statements its tables are missing and commits them in one
//! transaction, independently of the other phases.

pub mod phase;
pub mod report;
pub mod runner;

pub use phase::{PhaseId, PhasePlan, Step, StepKind};
pub use report::{HealReport, PhaseOutcome, PhaseReport};
pub use runner::{HealOptions, SchemaHealer};
