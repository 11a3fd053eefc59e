//! Shared utilities for the records admin tooling.
//!
//! - Password hashing with Argon2id for bootstrap accounts

pub mod password;
