//! Issued document domain models.

use serde::{Deserialize, Serialize};

/// Lifecycle of an issuance record: `draft -> approved -> issued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Approved,
    Issued,
}

impl DocumentStatus {
    /// Status given to rows written before the lifecycle existed.
    ///
    /// Those rows were only ever created at issuance time.
    pub const LEGACY: DocumentStatus = DocumentStatus::Issued;

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Issued => "issued",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_draft() {
        assert_eq!(DocumentStatus::default(), DocumentStatus::Draft);
    }

    #[test]
    fn test_legacy_rows_are_issued() {
        assert_eq!(DocumentStatus::LEGACY.as_str(), "issued");
    }

    #[test]
    fn test_display_matches_stored_value() {
        assert_eq!(DocumentStatus::Approved.to_string(), "approved");
        assert_eq!(format!("'{}'", DocumentStatus::LEGACY), "'issued'");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&DocumentStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
