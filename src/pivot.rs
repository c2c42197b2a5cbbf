use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::annual::extract_annual_rating;
use crate::columns::PeriodColumn;
use crate::quarter::Quarter;
use crate::records::{parse_department_path, BusinessQueryRecord, EmployeeInfo, PerformanceRecord};
use crate::schema::period;

static QUARTER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})Q([1-4])$").expect("valid quarter field pattern"));
static ANNUAL_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}([0-9]{{4}})$", period::ANNUAL_FIELD_PREFIX))
        .expect("valid annual field pattern")
});

/// A recognised rating letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    S,
    A,
    B,
    C,
    D,
}

impl Rating {
    pub const ALL: [Rating; 5] = [Rating::S, Rating::A, Rating::B, Rating::C, Rating::D];

    /// Case-insensitive; anything but a single S/A/B/C/D is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "S" => Some(Self::S),
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }
}

/// Per-employee count of periods at each rating letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingCounts {
    #[serde(rename = "S")]
    pub s: u32,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
    #[serde(rename = "C")]
    pub c: u32,
    #[serde(rename = "D")]
    pub d: u32,
}

impl RatingCounts {
    fn slot(&mut self, rating: Rating) -> &mut u32 {
        match rating {
            Rating::S => &mut self.s,
            Rating::A => &mut self.a,
            Rating::B => &mut self.b,
            Rating::C => &mut self.c,
            Rating::D => &mut self.d,
        }
    }

    pub fn get(&self, rating: Rating) -> u32 {
        match rating {
            Rating::S => self.s,
            Rating::A => self.a,
            Rating::B => self.b,
            Rating::C => self.c,
            Rating::D => self.d,
        }
    }

    /// Count `label` if it is a rating letter. Returns whether it was counted.
    pub fn record(&mut self, label: &str) -> bool {
        match Rating::parse(label) {
            Some(rating) => {
                *self.slot(rating) += 1;
                true
            }
            None => false,
        }
    }

    fn forget(&mut self, label: &str) {
        if let Some(rating) = Rating::parse(label) {
            let slot = self.slot(rating);
            *slot = slot.saturating_sub(1);
        }
    }

    /// Counts in S, A, B, C, D order.
    pub fn as_array(&self) -> [u32; 5] {
        Rating::ALL.map(|r| self.get(r))
    }
}

/// One employee with a rating (or "") per period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmployeeRow {
    pub employee_id: String,
    pub employee_number: String,
    pub employee_name: String,
    pub departments: [String; 4],
    pub employment_date: String,
    pub position: String,
    pub performance_data: BTreeMap<PeriodColumn, String>,
    pub rating_counts: RatingCounts,
}

impl EmployeeRow {
    /// Cell for `column`; "" when there is no data.
    pub fn rating(&self, column: &PeriodColumn) -> &str {
        self.performance_data
            .get(column)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set a cell and keep the tallies equal to the cells' ratings.
    fn set_rating(&mut self, column: PeriodColumn, rating: String) {
        self.rating_counts.record(&rating);
        if let Some(previous) = self.performance_data.insert(column, rating) {
            self.rating_counts.forget(&previous);
        }
    }
}

/// Pivot flat per-period records into one row per employee.
///
/// Rows appear in first-seen order; identity fields come from an employee's
/// first record. Records with no employee id or user id are dropped.
pub fn rows_from_records(
    records: &[PerformanceRecord],
    employee_info: Option<&HashMap<String, EmployeeInfo>>,
) -> Vec<EmployeeRow> {
    let mut rows: Vec<EmployeeRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut dropped = 0usize;

    for record in records {
        let Some(key) = record.employee_key() else {
            dropped += 1;
            continue;
        };

        let slot = *index.entry(key).or_insert_with(|| {
            rows.push(new_row_from_record(key, record, employee_info));
            rows.len() - 1
        });
        let row = &mut rows[slot];

        match Quarter::parse(&record.quarter) {
            Some(quarter) => row.set_rating(
                PeriodColumn::Quarterly {
                    year: record.year,
                    quarter,
                },
                record.performance_rating.clone(),
            ),
            None => warn!(
                employee = key,
                quarter = %record.quarter,
                "unrecognised quarter label, record ignored"
            ),
        }
    }

    if dropped > 0 {
        warn!(dropped, "records without employee identity dropped");
    }
    debug!(records = records.len(), rows = rows.len(), "pivoted flat records");
    rows
}

fn new_row_from_record(
    key: &str,
    record: &PerformanceRecord,
    employee_info: Option<&HashMap<String, EmployeeInfo>>,
) -> EmployeeRow {
    let info = employee_info.and_then(|m| m.get(key));
    let employee_number = if record.employee_number.is_empty() {
        record.employee_user_id.clone()
    } else {
        record.employee_number.clone()
    };

    EmployeeRow {
        employee_id: key.to_string(),
        employee_number,
        employee_name: record.employee_name.clone(),
        departments: parse_department_path(record.department_source()),
        employment_date: info.map(|i| i.employment_date.clone()).unwrap_or_default(),
        position: info.map(|i| i.position.clone()).unwrap_or_default(),
        performance_data: BTreeMap::new(),
        rating_counts: RatingCounts::default(),
    }
}

/// Interpret a dynamic business-query field name.
fn parse_period_field(name: &str) -> Option<PeriodColumn> {
    if let Some(caps) = QUARTER_FIELD.captures(name) {
        let year = caps[1].parse().ok()?;
        let quarter = Quarter::from_number(caps[2].parse().ok()?)?;
        return Some(PeriodColumn::Quarterly { year, quarter });
    }
    let caps = ANNUAL_FIELD.captures(name)?;
    Some(PeriodColumn::Annual {
        year: caps[1].parse().ok()?,
    })
}

/// Convert pre-aggregated business-query records, keeping input order.
///
/// Tallies are taken from the record's `ratingCount*` fields as-is.
pub fn rows_from_business_query(records: &[BusinessQueryRecord]) -> Vec<EmployeeRow> {
    let rows: Vec<EmployeeRow> = records.iter().map(row_from_business_query).collect();
    debug!(rows = rows.len(), "converted business-query records");
    rows
}

fn row_from_business_query(record: &BusinessQueryRecord) -> EmployeeRow {
    let mut performance_data = BTreeMap::new();

    for (name, value) in &record.periods {
        match parse_period_field(name) {
            Some(column @ PeriodColumn::Quarterly { .. }) => {
                if let Some(rating) = value.as_str().filter(|s| !s.is_empty()) {
                    performance_data.insert(column, rating.to_string());
                }
            }
            Some(column @ PeriodColumn::Annual { .. }) => {
                performance_data.insert(column, extract_annual_rating(value).unwrap_or_default());
            }
            None => {}
        }
    }

    EmployeeRow {
        employee_id: record.employee_no.clone(),
        employee_number: record.employee_no.clone(),
        employee_name: record.name.clone(),
        departments: [
            record.level1_department.clone(),
            record.level2_department.clone(),
            record.level3_department.clone(),
            record.level4_department.clone(),
        ],
        employment_date: record.employment_date.clone(),
        position: record.position.clone(),
        performance_data,
        rating_counts: RatingCounts {
            s: record.rating_count_s,
            a: record.rating_count_a,
            b: record.rating_count_b,
            c: record.rating_count_c,
            d: record.rating_count_d,
        },
    }
}
