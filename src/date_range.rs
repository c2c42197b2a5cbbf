use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{ReportError, ReportResult};
use crate::quarter::QuarterTime;
use crate::schema::bounds;

/// Inclusive calendar range, millisecond precision at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn day_end(date: NaiveDate) -> NaiveDateTime {
    // 23:59:59.999 is always a valid time
    date.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| day_start(date) + Duration::days(1) - Duration::milliseconds(1))
}

fn first_of_month(year: i32, month: u32) -> ReportResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(ReportError::YearOutOfRange(year))
}

/// First instant to last millisecond of a quarter.
pub fn quarter_to_date_range(quarter: QuarterTime) -> ReportResult<DateRange> {
    if !(1..=4).contains(&quarter.quarter) {
        return Err(ReportError::InvalidQuarter(quarter.quarter));
    }

    let start_month = u32::from(quarter.quarter - 1) * 3 + 1;
    let start = first_of_month(quarter.year, start_month)?;

    // Last day of the quarter = day before the first day of the next one
    let next = if quarter.quarter == 4 {
        first_of_month(quarter.year + 1, 1)?
    } else {
        first_of_month(quarter.year, start_month + 3)?
    };
    let last = next.pred_opt().ok_or(ReportError::YearOutOfRange(quarter.year))?;

    Ok(DateRange {
        start: day_start(start),
        end: day_end(last),
    })
}

/// Jan 1 of `start_year` to Dec 31 of `end_year`.
///
/// Each year is checked against 2000..=2100 before their order is checked.
pub fn year_range_to_date_range(start_year: i32, end_year: i32) -> ReportResult<DateRange> {
    for year in [start_year, end_year] {
        if !(bounds::MIN_YEAR..=bounds::MAX_YEAR).contains(&year) {
            return Err(ReportError::YearOutOfRange(year));
        }
    }
    if start_year > end_year {
        return Err(ReportError::Validation(format!(
            "start year {start_year} is after end year {end_year}"
        )));
    }

    let start = first_of_month(start_year, 1)?;
    let end = NaiveDate::from_ymd_opt(end_year, 12, 31).ok_or(ReportError::YearOutOfRange(end_year))?;

    Ok(DateRange {
        start: day_start(start),
        end: day_end(end),
    })
}

/// "2025-01-01 ~ 2025-12-31"
pub fn format_date_range(range: &DateRange) -> String {
    let fmt = |d: NaiveDateTime| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day());
    format!("{} ~ {}", fmt(range.start), fmt(range.end))
}
