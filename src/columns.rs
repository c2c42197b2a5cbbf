use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::quarter::{enumerate_consecutive, Quarter, QuarterTime};
use crate::schema::{bounds, period};

/// Requested report window. Missing quarters mean Q1 (start) and Q4 (end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeQuery {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub start_quarter: Option<Quarter>,
    #[serde(default)]
    pub end_quarter: Option<Quarter>,
}

impl TimeRangeQuery {
    pub fn years(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            start_quarter: None,
            end_quarter: None,
        }
    }

    pub fn with_quarters(mut self, start: Quarter, end: Quarter) -> Self {
        self.start_quarter = Some(start);
        self.end_quarter = Some(end);
        self
    }

    fn first_quarter(&self) -> Quarter {
        self.start_quarter.unwrap_or(Quarter::Q1)
    }

    fn last_quarter(&self) -> Quarter {
        self.end_quarter.unwrap_or(Quarter::Q4)
    }
}

/// One displayed unit of time: an annual aggregate or a single quarter.
///
/// Also the typed key of [`crate::pivot::EmployeeRow::performance_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodColumn {
    Annual { year: i32 },
    Quarterly { year: i32, quarter: Quarter },
}

impl PeriodColumn {
    pub fn year(&self) -> i32 {
        match self {
            Self::Annual { year } | Self::Quarterly { year, .. } => *year,
        }
    }

    pub fn is_annual(&self) -> bool {
        matches!(self, Self::Annual { .. })
    }

    /// Grid cell key: "2025-Q3" or "2025-年度".
    pub fn data_key(&self) -> String {
        match self {
            Self::Annual { year } => format!("{year}-{}", period::ANNUAL_SUFFIX),
            Self::Quarterly { year, quarter } => format!("{year}-{quarter}"),
        }
    }

    /// The five columns of a full year in display order.
    pub fn full_year(year: i32) -> impl Iterator<Item = PeriodColumn> {
        std::iter::once(Self::Annual { year })
            .chain(Quarter::DESCENDING.into_iter().map(move |quarter| Self::Quarterly { year, quarter }))
    }
}

/// Rendered key used as the export header: "2025Q3" or "2025年度".
impl fmt::Display for PeriodColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annual { year } => write!(f, "{year}{}", period::ANNUAL_SUFFIX),
            Self::Quarterly { year, quarter } => write!(f, "{year}{quarter}"),
        }
    }
}

impl Serialize for PeriodColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.data_key())
    }
}

/// Columns for an explicit range: years ascending, each year as
/// `[annual, Q4, Q3, Q2, Q1]` clipped to the queried quarters in the first and
/// last year.
///
/// No validation is done. A reversed range yields no columns.
pub fn generate_columns(query: &TimeRangeQuery) -> Vec<PeriodColumn> {
    if query.start_year > query.end_year {
        warn!(
            start_year = query.start_year,
            end_year = query.end_year,
            "reversed time range, no columns generated"
        );
        return Vec::new();
    }

    let sq = query.first_quarter();
    let eq = query.last_quarter();
    let mut columns = Vec::new();

    for year in query.start_year..=query.end_year {
        columns.push(PeriodColumn::Annual { year });

        let first = if year == query.start_year { sq } else { Quarter::Q1 };
        let last = if year == query.end_year { eq } else { Quarter::Q4 };

        for quarter in Quarter::DESCENDING {
            if quarter >= first && quarter <= last {
                columns.push(PeriodColumn::Quarterly { year, quarter });
            }
        }
    }

    debug!(count = columns.len(), "generated columns from time range");
    columns
}

/// Columns inferred from the period keys present in the data.
///
/// Every year seen (annual or quarterly) gets its full five-column set, empty
/// columns included.
pub fn infer_columns<'a>(keys: impl IntoIterator<Item = &'a PeriodColumn>) -> Vec<PeriodColumn> {
    let years: BTreeSet<i32> = keys.into_iter().map(PeriodColumn::year).collect();
    let columns: Vec<PeriodColumn> = years.into_iter().flat_map(PeriodColumn::full_year).collect();
    debug!(count = columns.len(), "inferred columns from data");
    columns
}

/// The grid's quarter axis, most recent first.
///
/// - explicit quarters: walk back from the later end to the earlier one
///   (reversed input is swapped), at most 100 quarters
/// - years only: Q4..Q1 for each year, years descending
/// - no query: the 12 quarters ending at the quarter containing `today`
pub fn quarter_range(query: Option<&TimeRangeQuery>, today: NaiveDate) -> Vec<QuarterTime> {
    let Some(query) = query else {
        return enumerate_consecutive(QuarterTime::from_date(today), bounds::DEFAULT_QUARTER_COUNT);
    };

    if let (Some(sq), Some(eq)) = (query.start_quarter, query.end_quarter) {
        let mut start = QuarterTime::new(query.start_year, sq.number());
        let mut end = QuarterTime::new(query.end_year, eq.number());
        if start.ordinal() > end.ordinal() {
            std::mem::swap(&mut start, &mut end);
        }

        let mut quarters = Vec::new();
        let mut current = end;
        while current.ordinal() >= start.ordinal() && quarters.len() < bounds::MAX_QUARTER_AXIS {
            quarters.push(current);
            current = current.previous();
        }
        return quarters;
    }

    let (low, high) = if query.start_year > query.end_year {
        (query.end_year, query.start_year)
    } else {
        (query.start_year, query.end_year)
    };

    (low..=high)
        .rev()
        .flat_map(|year| {
            Quarter::DESCENDING
                .into_iter()
                .map(move |q| QuarterTime::new(year, q.number()))
        })
        .collect()
}

/// Years to show, descending.
///
/// Taken from the query, else from the span of `observed_years`, else the
/// three years ending at `current_year`.
pub fn year_range(query: Option<&TimeRangeQuery>, observed_years: &[i32], current_year: i32) -> Vec<i32> {
    let (start, end) = match query {
        Some(q) => (q.start_year, q.end_year),
        None => match (observed_years.iter().min(), observed_years.iter().max()) {
            (Some(&min), Some(&max)) => (min, max),
            _ => (current_year - 2, current_year),
        },
    };
    (start..=end).rev().collect()
}

/// [`year_range`] anchored at today's date.
pub fn year_range_today(query: Option<&TimeRangeQuery>, observed_years: &[i32]) -> Vec<i32> {
    year_range(query, observed_years, chrono::Local::now().year())
}
