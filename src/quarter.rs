use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::schema::bounds;

static QUARTER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-Q([1-4])$").expect("valid quarter key pattern"));

/// A calendar quarter known to be in 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const DESCENDING: [Quarter; 4] = [Quarter::Q4, Quarter::Q3, Quarter::Q2, Quarter::Q1];

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    /// Parse a "Q1".."Q4" label. Lower-case `q` is accepted.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "Q1" | "q1" => Some(Self::Q1),
            "Q2" | "q2" => Some(Self::Q2),
            "Q3" | "q3" => Some(Self::Q3),
            "Q4" | "q4" => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    /// Quarter containing a 1-based calendar month.
    pub fn of_month(month: u32) -> Self {
        match month {
            1..=3 => Self::Q1,
            4..=6 => Self::Q2,
            7..=9 => Self::Q3,
            _ => Self::Q4,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// A (year, quarter) pair.
///
/// Fields are public and unchecked so that out-of-range values coming from
/// callers can be represented and rejected by [`QuarterTime::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuarterTime {
    pub year: i32,
    pub quarter: u8,
}

impl QuarterTime {
    pub fn new(year: i32, quarter: u8) -> Self {
        Self { year, quarter }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: Quarter::of_month(date.month()).number(),
        }
    }

    /// Canonical key, e.g. "2025-Q1".
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    /// Parse a canonical key. Anything but `YYYY-Q[1-4]` with a year in
    /// 2000..=2100 yields `None`.
    pub fn parse_key(s: &str) -> Option<Self> {
        let caps = QUARTER_KEY.captures(s)?;
        let year: i32 = caps[1].parse().ok()?;
        let quarter: u8 = caps[2].parse().ok()?;
        if !(bounds::MIN_YEAR..=bounds::MAX_YEAR).contains(&year) {
            return None;
        }
        Some(Self { year, quarter })
    }

    pub fn is_valid(&self) -> bool {
        (bounds::MIN_YEAR..=bounds::MAX_YEAR).contains(&self.year)
            && (1..=4).contains(&self.quarter)
    }

    /// Total order key: `year * 10 + quarter`.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 10 + i64::from(self.quarter)
    }

    pub fn as_quarter(&self) -> Option<Quarter> {
        Quarter::from_number(self.quarter)
    }

    /// The quarter immediately before this one.
    pub fn previous(&self) -> Self {
        if self.quarter <= 1 {
            Self {
                year: self.year.saturating_sub(1),
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }
}

impl fmt::Display for QuarterTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

/// End of a backward-looking window of `span_years` years that ends at `start`.
///
/// `end.year = start.year - span_years + 1`, quarter unchanged.
pub fn compute_end_quarter(start: QuarterTime, span_years: u32) -> ReportResult<QuarterTime> {
    if !(bounds::MIN_SPAN_YEARS..=bounds::MAX_SPAN_YEARS).contains(&span_years) {
        return Err(ReportError::InvalidSpan(span_years));
    }
    if !(1..=4).contains(&start.quarter) {
        return Err(ReportError::InvalidQuarter(start.quarter));
    }

    // span_years <= 10, so the cast cannot truncate
    let end_year = start.year.saturating_sub(span_years as i32 - 1);
    if !(bounds::MIN_YEAR..=bounds::MAX_YEAR).contains(&end_year) {
        return Err(ReportError::YearOutOfRange(end_year));
    }

    Ok(QuarterTime {
        year: end_year,
        quarter: start.quarter,
    })
}

/// `count` consecutive quarters walking backward from `end` (inclusive).
pub fn enumerate_consecutive(end: QuarterTime, count: usize) -> Vec<QuarterTime> {
    let mut quarters = Vec::with_capacity(count);
    let mut current = end;
    for _ in 0..count {
        quarters.push(current);
        current = current.previous();
    }
    quarters
}

pub fn current_quarter() -> QuarterTime {
    QuarterTime::from_date(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_for_valid_quarters() {
        for year in [2000, 2024, 2100] {
            for quarter in 1..=4 {
                let q = QuarterTime::new(year, quarter);
                assert_eq!(QuarterTime::parse_key(&q.to_key()), Some(q));
            }
        }
        assert_eq!(QuarterTime::new(2025, 1).to_key(), "2025-Q1");
    }

    #[test]
    fn parse_key_rejects_malformed_input() {
        for bad in [
            "2025-Q0", "2025-Q5", "2025Q1", "25-Q1", "02025-Q1", "2025-q1", "1999-Q4", "2101-Q1",
            " 2025-Q1", "",
        ] {
            assert_eq!(QuarterTime::parse_key(bad), None, "{bad}");
        }
    }

    #[test]
    fn validity_checks_both_fields() {
        assert!(QuarterTime::new(2025, 4).is_valid());
        assert!(!QuarterTime::new(2025, 0).is_valid());
        assert!(!QuarterTime::new(2025, 5).is_valid());
        assert!(!QuarterTime::new(1999, 1).is_valid());
        assert!(!QuarterTime::new(2101, 1).is_valid());
    }

    #[test]
    fn end_quarter_of_one_year_span_is_identity() {
        for quarter in 1..=4 {
            let q = QuarterTime::new(2025, quarter);
            assert_eq!(compute_end_quarter(q, 1).unwrap(), q);
        }
    }

    #[test]
    fn end_quarter_walks_backward() {
        let end = compute_end_quarter(QuarterTime::new(2025, 3), 3).unwrap();
        assert_eq!(end, QuarterTime::new(2023, 3));

        let end = compute_end_quarter(QuarterTime::new(2025, 1), 10).unwrap();
        assert_eq!(end, QuarterTime::new(2016, 1));
    }

    #[test]
    fn end_quarter_rejects_bad_input() {
        let q = QuarterTime::new(2025, 1);
        assert!(matches!(
            compute_end_quarter(q, 0),
            Err(ReportError::InvalidSpan(0))
        ));
        assert!(matches!(
            compute_end_quarter(q, 11),
            Err(ReportError::InvalidSpan(11))
        ));
        assert!(matches!(
            compute_end_quarter(QuarterTime::new(2025, 5), 1),
            Err(ReportError::InvalidQuarter(5))
        ));
        assert!(matches!(
            compute_end_quarter(QuarterTime::new(2003, 2), 5),
            Err(ReportError::YearOutOfRange(1999))
        ));
    }

    #[test]
    fn end_quarter_of_extreme_year_is_out_of_range() {
        assert!(matches!(
            compute_end_quarter(QuarterTime::new(i32::MIN, 1), 2),
            Err(ReportError::YearOutOfRange(i32::MIN))
        ));
        assert!(matches!(
            compute_end_quarter(QuarterTime::new(i32::MAX, 4), 1),
            Err(ReportError::YearOutOfRange(i32::MAX))
        ));

        let floor = QuarterTime::new(i32::MIN, 1);
        assert_eq!(floor.previous(), QuarterTime::new(i32::MIN, 4));
        assert_eq!(enumerate_consecutive(floor, 3).len(), 3);
    }

    #[test]
    fn consecutive_quarters_cross_year_boundary() {
        let got = enumerate_consecutive(QuarterTime::new(2025, 1), 4);
        assert_eq!(
            got,
            vec![
                QuarterTime::new(2025, 1),
                QuarterTime::new(2024, 4),
                QuarterTime::new(2024, 3),
                QuarterTime::new(2024, 2),
            ]
        );
    }

    #[test]
    fn consecutive_quarters_are_strictly_descending() {
        let got = enumerate_consecutive(QuarterTime::new(2025, 4), 8);
        assert_eq!(got.len(), 8);
        assert_eq!(got[7], QuarterTime::new(2024, 1));
        assert!(got.windows(2).all(|w| w[0].ordinal() > w[1].ordinal()));
        assert!(enumerate_consecutive(QuarterTime::new(2025, 4), 0).is_empty());
    }

    #[test]
    fn quarter_follows_calendar_month() {
        let cases = [(1, 1), (3, 1), (4, 2), (6, 2), (7, 3), (9, 3), (10, 4), (12, 4)];
        for (month, quarter) in cases {
            let date = NaiveDate::from_ymd_opt(2026, month, 15).unwrap();
            assert_eq!(QuarterTime::from_date(date), QuarterTime::new(2026, quarter));
        }
        assert!(current_quarter().is_valid());
    }

    #[test]
    fn quarter_labels_parse() {
        assert_eq!(Quarter::parse("Q3"), Some(Quarter::Q3));
        assert_eq!(Quarter::parse("q1"), Some(Quarter::Q1));
        assert_eq!(Quarter::parse("Q5"), None);
        assert_eq!(Quarter::parse("3"), None);
        assert_eq!(Quarter::Q2.to_string(), "Q2");
    }
}
