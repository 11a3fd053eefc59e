//! Database metrics collection.
//!
//! Records through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::{counter, histogram};
use std::time::Instant;

/// Record database query duration.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Record how long a schema healing phase took, retries included.
pub fn record_phase_duration(phase: &str, duration_secs: f64) {
    histogram!(
        "schema_heal_phase_duration_seconds",
        "phase" => phase.to_string()
    )
    .record(duration_secs);
}

/// Count a schema healing phase that ended in failure.
pub fn record_phase_failure(phase: &str) {
    counter!(
        "schema_heal_phase_failures_total",
        "phase" => phase.to_string()
    )
    .increment(1);
}

/// Times a named query; call `record()` once it has completed.
///
/// ```ignore
/// let timer = QueryTimer::new("archive_documents");
/// let result = sqlx::query(...).execute(&mut *conn).await;
/// timer.record();
/// ```
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_query_duration(&self.query_name, duration);
    }
}

/// Phase-level counterpart of [`QueryTimer`].
pub struct PhaseTimer {
    phase: &'static str,
    start: Instant,
}

impl PhaseTimer {
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    pub fn record(self) {
        record_phase_duration(self.phase, self.start.elapsed().as_secs_f64());
    }
}
