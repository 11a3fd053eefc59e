//! Audit trail entries written by operator tooling.
//!
//! Rows in `transaction_logs` are immutable. Entries produced by the tooling
//! have no acting user, so `user_id` stays NULL.

use serde_json::{json, Map, Value as JsonValue};

/// A transaction log row ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLogEntry {
    pub user_id: Option<i32>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
    pub meta: Option<JsonValue>,
}

impl TransactionLogEntry {
    /// Starts an entry for an action performed by the system itself.
    pub fn system_action(action: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            entity_type: None,
            entity_id: None,
            meta: None,
        }
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn entity_id(mut self, entity_id: i32) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Adds a key to the `meta` object, creating it if needed.
    pub fn meta(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        let mut map = match self.meta.take() {
            Some(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), value.into());
        self.meta = Some(JsonValue::Object(map));
        self
    }

    pub fn auto_archived(count: usize, months: i32) -> Self {
        Self::system_action("Auto-archived expired documents")
            .entity_type("document")
            .meta("count", json!(count))
            .meta("months", json!(months))
    }

    pub fn auto_deleted(count: usize, grace_days: i64) -> Self {
        Self::system_action("Auto-deleted expired documents")
            .entity_type("document")
            .meta("count", json!(count))
            .meta("grace_days", json!(grace_days))
    }
}
