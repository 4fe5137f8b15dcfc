//! Loan period and overdue-fine rules.

use chrono::{DateTime, Duration, Utc};

use crate::config::LoanConfig;

/// Due-date and fine arithmetic.
///
/// A loan is due `loan_period_days` after it starts. Once a loan is more than
/// `grace_period_days` whole days past due, every further whole day costs
/// `fine_per_day`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanPolicy {
    pub loan_period_days: i64,
    pub grace_period_days: i64,
    pub fine_per_day: i64,
    pub currency: String,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::from(&LoanConfig::default())
    }
}

impl From<&LoanConfig> for LoanPolicy {
    fn from(config: &LoanConfig) -> Self {
        Self {
            loan_period_days: config.loan_period_days,
            grace_period_days: config.grace_period_days,
            fine_per_day: config.fine_per_day,
            currency: config.currency.clone(),
        }
    }
}

impl LoanPolicy {
    pub fn due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + Duration::days(self.loan_period_days)
    }

    /// Whole days from `due` to `end`, truncated toward zero. Negative when
    /// `end` is before the due date.
    pub fn overdue_days(due: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        (end - due).num_days()
    }

    /// Fine owed for a loan due at `due` and closed (or evaluated) at `end`.
    pub fn fine(&self, due: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let chargeable = Self::overdue_days(due, end) - self.grace_period_days;
        chargeable.max(0) * self.fine_per_day
    }

    /// Render an amount with the configured currency label.
    pub fn format_amount(&self, amount: i64) -> String {
        format!("{} {}", self.currency, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_due_date_is_two_weeks_out() {
        let policy = LoanPolicy::default();
        let borrowed = Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0).unwrap();
        assert_eq!(policy.due_date(borrowed), due());
    }

    #[test]
    fn test_no_fine_within_grace_period() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.fine(due(), due() - Duration::days(3)), 0);
        assert_eq!(policy.fine(due(), due()), 0);
        assert_eq!(policy.fine(due(), due() + Duration::days(14)), 0);
        // 14 days and 23 hours is still 14 whole days
        assert_eq!(
            policy.fine(due(), due() + Duration::days(14) + Duration::hours(23)),
            0
        );
    }

    #[test]
    fn test_fine_accrues_per_whole_day_after_grace() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.fine(due(), due() + Duration::days(15)), 10);
        assert_eq!(policy.fine(due(), due() + Duration::days(20)), 60);
    }

    #[test]
    fn test_custom_policy() {
        let policy = LoanPolicy {
            loan_period_days: 7,
            grace_period_days: 0,
            fine_per_day: 25,
            currency: "$".into(),
        };
        assert_eq!(policy.fine(due(), due() + Duration::days(2)), 50);
        assert_eq!(policy.format_amount(50), "$ 50");
    }

    proptest! {
        #[test]
        fn prop_fine_is_never_negative(offset_hours in -2000i64..2000) {
            let policy = LoanPolicy::default();
            prop_assert!(policy.fine(due(), due() + Duration::hours(offset_hours)) >= 0);
        }

        #[test]
        fn prop_fine_matches_formula(days in 0i64..400) {
            let policy = LoanPolicy::default();
            let expected = (days - 14).max(0) * 10;
            prop_assert_eq!(policy.fine(due(), due() + Duration::days(days)), expected);
        }

        #[test]
        fn prop_fine_is_monotonic(a in 0i64..5000, b in 0i64..5000) {
            let policy = LoanPolicy::default();
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                policy.fine(due(), due() + Duration::hours(early))
                    <= policy.fine(due(), due() + Duration::hours(late))
            );
        }
    }
}
