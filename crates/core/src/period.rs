use chrono::{Days, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Billing cadence of a bill, recurring pattern or detected subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(alias = "weekly")]
    Weekly,
    #[serde(alias = "bi-weekly", alias = "biweekly", alias = "bi_weekly")]
    BiWeekly,
    #[serde(alias = "monthly")]
    Monthly,
    #[serde(alias = "quarterly")]
    Quarterly,
    #[serde(alias = "annual", alias = "yearly", alias = "Yearly")]
    Annual,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Weekly => write!(f, "Weekly"),
            Frequency::BiWeekly => write!(f, "BiWeekly"),
            Frequency::Monthly => write!(f, "Monthly"),
            Frequency::Quarterly => write!(f, "Quarterly"),
            Frequency::Annual => write!(f, "Annual"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "bi-weekly" | "biweekly" | "bi_weekly" => Ok(Frequency::BiWeekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "annual" | "yearly" => Ok(Frequency::Annual),
            other => Err(format!("Unknown frequency: '{other}'")),
        }
    }
}

impl Frequency {
    /// Nominal gap between two charges, in days.
    pub fn nominal_days(self) -> i64 {
        match self {
            Frequency::Weekly => 7,
            Frequency::BiWeekly => 14,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 91,
            Frequency::Annual => 365,
        }
    }

    /// Advances `date` by one period. Month-based cadences clamp to the last
    /// day of the target month (Jan 31 → Feb 28).
    pub fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Weekly => date.checked_add_signed(Duration::days(7)),
            Frequency::BiWeekly => date.checked_add_signed(Duration::days(14)),
            Frequency::Monthly => date.checked_add_months(Months::new(1)),
            Frequency::Quarterly => date.checked_add_months(Months::new(3)),
            Frequency::Annual => date.checked_add_months(Months::new(12)),
        }
    }
}

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    /// Window of `before` days ahead of and `after` days past `anchor`,
    /// clamped to the representable calendar.
    pub fn around(anchor: NaiveDate, before: u32, after: u32) -> Self {
        DateRange {
            start: anchor
                .checked_sub_days(Days::new(u64::from(before)))
                .unwrap_or(NaiveDate::MIN),
            end: anchor
                .checked_add_days(Days::new(u64::from(after)))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Absolute number of days between two dates.
pub fn days_apart(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn frequency_parses_feed_spellings() {
        use std::str::FromStr;
        assert_eq!(Frequency::from_str("bi-weekly"), Ok(Frequency::BiWeekly));
        assert_eq!(Frequency::from_str("Yearly"), Ok(Frequency::Annual));
        assert!(Frequency::from_str("fortnightly").is_err());
    }

    #[test]
    fn frequency_deserializes_lowercase_and_display_forms() {
        let f: Frequency = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(f, Frequency::Monthly);
        let f: Frequency = serde_json::from_str("\"Quarterly\"").unwrap();
        assert_eq!(f, Frequency::Quarterly);
        assert_eq!(serde_json::to_string(&Frequency::Annual).unwrap(), "\"Annual\"");
    }

    #[test]
    fn advance_monthly_clamps_to_month_end() {
        assert_eq!(Frequency::Monthly.advance(date(2025, 1, 31)), Some(date(2025, 2, 28)));
        assert_eq!(Frequency::Monthly.advance(date(2025, 4, 1)), Some(date(2025, 5, 1)));
    }

    #[test]
    fn advance_quarterly_and_annual() {
        assert_eq!(Frequency::Quarterly.advance(date(2025, 11, 15)), Some(date(2026, 2, 15)));
        assert_eq!(Frequency::Annual.advance(date(2024, 2, 29)), Some(date(2025, 2, 28)));
    }

    #[test]
    fn advance_weekly_cadences() {
        assert_eq!(Frequency::Weekly.advance(date(2025, 12, 29)), Some(date(2026, 1, 5)));
        assert_eq!(Frequency::BiWeekly.advance(date(2025, 1, 1)), Some(date(2025, 1, 15)));
    }

    #[test]
    fn date_range_around_is_inclusive() {
        let range = DateRange::around(date(2025, 11, 5), 3, 2);
        assert!(range.contains(date(2025, 11, 2)));
        assert!(range.contains(date(2025, 11, 7)));
        assert!(!range.contains(date(2025, 11, 1)));
        assert!(!range.contains(date(2025, 11, 8)));
        assert_eq!(range.to_string(), "2025-11-02 to 2025-11-07");
    }

    #[test]
    fn date_range_around_clamps_at_calendar_edges() {
        let range = DateRange::around(date(2025, 11, 5), u32::MAX, u32::MAX);
        assert_eq!(range.start, NaiveDate::MIN);
        assert_eq!(range.end, NaiveDate::MAX);
        assert!(range.contains(date(1900, 1, 1)));

        let range = DateRange::around(NaiveDate::MAX, 0, 1);
        assert_eq!(range.end, NaiveDate::MAX);
    }

    #[test]
    fn days_apart_is_symmetric() {
        assert_eq!(days_apart(date(2025, 1, 1), date(2025, 1, 6)), 5);
        assert_eq!(days_apart(date(2025, 1, 6), date(2025, 1, 1)), 5);
    }
}
