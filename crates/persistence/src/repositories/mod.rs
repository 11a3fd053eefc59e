//! Repository implementations for database operations.

pub mod document;
pub mod document_type;
pub mod transaction_log;
pub mod user;

pub use document::{DocumentRepository, PurgeApplied, PurgeChanges};
pub use document_type::{DocumentTypeRepository, SeedResult};
pub use transaction_log::TransactionLogRepository;
pub use user::{NewUser, UserRepository};
