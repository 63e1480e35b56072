//! Birthday database model.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Plausible age bounds enforced when a birthday is set.
pub const MIN_AGE: i32 = 0;
pub const MAX_AGE: i32 = 130;

/// A member's birthday within one guild.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Birthday {
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub day: i64,
    pub month: i64,
    pub year: i64,
    /// ISO 8601 timestamp
    pub updated_at: String,
}

impl Birthday {
    /// Age turning (or turned) on this year's birthday relative to `today`.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        today.year() - self.year as i32
    }

    /// Whether the birthday falls on `today`'s month/day.
    pub fn matches(&self, today: NaiveDate) -> bool {
        self.month as u32 == today.month() && self.day as u32 == today.day()
    }
}

/// Validate a (day, month, year) triple: a real calendar date with an age in
/// `MIN_AGE..=MAX_AGE` relative to `today`.
pub fn validate_birthdate(day: u32, month: u32, year: i32, today: NaiveDate) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let age = today.year() - year;
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return None;
    }
    if date > today {
        return None;
    }
    Some(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[rstest]
    #[case(29, 2, 2000, true)] // leap day
    #[case(29, 2, 2001, false)] // not a leap year
    #[case(31, 4, 1990, false)] // April has 30 days
    #[case(15, 6, 1990, true)]
    #[case(1, 1, 1800, false)] // age > 130
    #[case(1, 1, 2026, false)] // in the future
    fn birthdate_validation(
        #[case] day: u32,
        #[case] month: u32,
        #[case] year: i32,
        #[case] ok: bool,
    ) {
        assert_eq!(validate_birthdate(day, month, year, today()).is_some(), ok);
    }

    #[test]
    fn age_and_match() {
        let b = Birthday {
            id: 1,
            guild_id: 1,
            user_id: 2,
            day: 15,
            month: 6,
            year: 1990,
            updated_at: String::new(),
        };
        assert!(b.matches(today()));
        assert_eq!(b.age_on(today()), 35);
        assert!(!b.matches(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()));
    }
}
