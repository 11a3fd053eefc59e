//! Outcome of a healing run.

use serde::Serialize;

use super::phase::PhaseId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// Committed. `changes` counts DDL statements plus backfilled rows.
    Applied { changes: u64 },
    Skipped { reason: String },
    /// Rolled back after the last attempt.
    Failed { error: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: PhaseId,
    #[serde(flatten)]
    pub outcome: PhaseOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealReport {
    pub phases: Vec<PhaseReport>,
}

impl HealReport {
    pub fn push(&mut self, report: PhaseReport) {
        self.phases.push(report);
    }

    pub fn outcome(&self, phase: PhaseId) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }

    pub fn total_changes(&self) -> u64 {
        self.phases
            .iter()
            .map(|r| match r.outcome {
                PhaseOutcome::Applied { changes } => changes,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PhaseReport> {
        self.phases
            .iter()
            .filter(|r| matches!(r.outcome, PhaseOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}
