//! Domain services.

pub mod audit;
pub mod retention;

pub use audit::TransactionLogEntry;
pub use retention::{add_months, PurgeAction, PurgePolicy};
