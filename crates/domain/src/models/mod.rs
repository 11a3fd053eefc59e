//! Domain models.

pub mod document;
pub mod document_type;
pub mod user;

pub use document::DocumentStatus;
pub use document_type::{DocumentTypeSeed, DEFAULT_DOCUMENT_TYPES, FALLBACK_DOCUMENT_TYPE};
pub use user::UserRole;
