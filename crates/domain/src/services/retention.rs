//! Validity window and purge classification for issued documents.
//!
//! An issued certificate is valid for a number of calendar months after its
//! issue date. Once expired it is archived; archived documents are deleted
//! after an additional grace period.

use chrono::{Duration, Months, NaiveDate};

/// What the purge should do with a single issued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeAction {
    Archive,
    Delete,
}

/// Adds calendar months, clamping to the last day of the target month.
///
/// `2024-01-31 + 1 month` is `2024-02-29`.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgePolicy {
    pub validity_months: i32,
    pub grace_days: i64,
}

impl PurgePolicy {
    pub fn new(validity_months: i32, grace_days: i64) -> Self {
        Self {
            validity_months,
            grace_days,
        }
    }

    /// A non-positive validity window turns the purge off.
    pub fn is_enabled(&self) -> bool {
        self.validity_months > 0
    }

    /// Last day on which a document issued on `issue_date` is still valid.
    pub fn expiry_date(&self, issue_date: NaiveDate) -> Option<NaiveDate> {
        if !self.is_enabled() {
            return None;
        }
        add_months(issue_date, self.validity_months.unsigned_abs())
    }

    /// Classifies an issued document as of `today`.
    pub fn classify(
        &self,
        issue_date: NaiveDate,
        is_archived: bool,
        today: NaiveDate,
    ) -> Option<PurgeAction> {
        let expiry = self.expiry_date(issue_date)?;

        if !is_archived {
            return (expiry < today).then_some(PurgeAction::Archive);
        }

        let cutoff = today.checked_sub_signed(Duration::days(self.grace_days.max(0)))?;
        (expiry < cutoff).then_some(PurgeAction::Delete)
    }
}

impl Default for PurgePolicy {
    fn default() -> Self {
        Self::new(6, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months(date(2023, 8, 31), 6), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_add_months_crosses_year() {
        assert_eq!(add_months(date(2023, 11, 15), 3), Some(date(2024, 2, 15)));
    }

    #[test]
    fn test_disabled_policy_never_acts() {
        let policy = PurgePolicy::new(0, 30);
        assert!(!policy.is_enabled());
        assert_eq!(policy.classify(date(2000, 1, 1), false, date(2024, 1, 1)), None);
        assert_eq!(policy.classify(date(2000, 1, 1), true, date(2024, 1, 1)), None);
    }

    #[test]
    fn test_archive_only_after_expiry() {
        let policy = PurgePolicy::default();
        let issued = date(2024, 1, 10);

        // expires 2024-07-10; still valid on that day
        assert_eq!(policy.classify(issued, false, date(2024, 7, 10)), None);
        assert_eq!(
            policy.classify(issued, false, date(2024, 7, 11)),
            Some(PurgeAction::Archive)
        );
    }

    #[test]
    fn test_delete_after_grace_period() {
        let policy = PurgePolicy::default();
        let issued = date(2024, 1, 10);

        assert_eq!(policy.classify(issued, true, date(2024, 8, 9)), None);
        assert_eq!(
            policy.classify(issued, true, date(2024, 8, 10)),
            Some(PurgeAction::Delete)
        );
    }

    #[test]
    fn test_negative_grace_is_treated_as_zero() {
        let policy = PurgePolicy::new(1, -5);
        assert_eq!(
            policy.classify(date(2024, 1, 1), true, date(2024, 2, 2)),
            Some(PurgeAction::Delete)
        );
    }
}
