//! Executes healing phases against a live database.

use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::phase::{PhaseId, PhasePlan, StepKind};
use super::report::{HealReport, PhaseOutcome, PhaseReport};
use crate::catalog::SchemaSnapshot;
use crate::error::HealError;
use crate::schema::TARGET_TABLES;
use crate::metrics::{record_phase_failure, PhaseTimer};

#[derive(Debug, Clone)]
pub struct HealOptions {
    /// Upper bound on waiting for a table lock inside a phase.
    pub lock_timeout: Duration,
    /// Attempts per phase for retryable failures; at least one is made.
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub phases: Vec<PhaseId>,
}

impl Default for HealOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            phases: PhaseId::ALL.to_vec(),
        }
    }
}

/// Brings an older database up to the current additive schema.
///
/// Every phase runs in its own transaction: a failing statement rolls back
/// that phase only and the remaining phases are still attempted.
#[derive(Debug, Clone)]
pub struct SchemaHealer {
    pool: PgPool,
    options: HealOptions,
}

impl SchemaHealer {
    pub fn new(pool: PgPool, options: HealOptions) -> Self {
        Self { pool, options }
    }

    pub async fn run(&self) -> HealReport {
        let mut report = HealReport::default();

        for &phase in &self.options.phases {
            let timer = PhaseTimer::new(phase.name());
            let outcome = self.run_phase(phase).await;
            let elapsed_ms = timer.elapsed_ms() as u64;

            match &outcome {
                PhaseOutcome::Applied { changes } => {
                    info!(phase = phase.name(), changes, elapsed_ms, "Phase applied")
                }
                PhaseOutcome::Skipped { reason } => {
                    info!(phase = phase.name(), reason = %reason, "Phase skipped")
                }
                PhaseOutcome::Failed { error, attempts } => {
                    record_phase_failure(phase.name());
                    error!(
                        phase = phase.name(),
                        attempts,
                        elapsed_ms,
                        error = %error,
                        "Phase failed"
                    )
                }
            }
            timer.record();

            report.push(PhaseReport {
                phase,
                outcome,
                elapsed_ms,
            });
        }

        info!(
            changes = report.total_changes(),
            failed = report.failures().count(),
            "Schema healing finished"
        );
        report
    }

    /// Plans every configured phase against the current schema without
    /// executing anything.
    ///
    /// Each plan sees the schema as it is now, not as earlier phases would
    /// leave it.
    pub async fn preview(&self) -> Result<Vec<(PhaseId, PhasePlan)>, HealError> {
        let mut conn = self.pool.acquire().await?;
        let snapshot = SchemaSnapshot::load(&mut conn, &TARGET_TABLES).await?;

        Ok(self
            .options
            .phases
            .iter()
            .map(|&phase| (phase, phase.plan(&snapshot)))
            .collect())
    }

    async fn run_phase(&self, phase: PhaseId) -> PhaseOutcome {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_phase(phase).await {
                Ok(outcome) => return outcome,
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        phase = phase.name(),
                        attempt,
                        code = ?e.code(),
                        "Phase hit lock contention, retrying"
                    );
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                }
                Err(e) => {
                    return PhaseOutcome::Failed {
                        error: e.to_string(),
                        attempts: attempt,
                    }
                }
            }
        }
    }

    async fn try_phase(&self, phase: PhaseId) -> Result<PhaseOutcome, HealError> {
        let mut tx = self.pool.begin().await?;

        let lock_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.options.lock_timeout.as_millis()
        );
        sqlx::query(&lock_timeout).execute(&mut *tx).await?;

        let snapshot = SchemaSnapshot::load(&mut tx, phase.tables()).await?;
        let steps = match phase.plan(&snapshot) {
            PhasePlan::Skip(reason) => {
                tx.rollback().await?;
                return Ok(PhaseOutcome::Skipped {
                    reason: reason.to_string(),
                });
            }
            PhasePlan::Run(steps) => steps,
        };

        let mut changes = 0;
        for step in &steps {
            debug!(phase = phase.name(), step = %step.description, "Executing step");
            let result = sqlx::query(&step.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| HealError::statement(&step.description, e))?;

            changes += match step.kind {
                StepKind::Ddl => 1,
                StepKind::Backfill => result.rows_affected(),
            };
        }

        tx.commit().await?;
        Ok(PhaseOutcome::Applied { changes })
    }
}
