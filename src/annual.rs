use chrono::{Datelike, Local};
use serde::Serialize;
use serde_json::Value;

use crate::pivot::Rating;
use crate::schema::{annual_field, period};

/// One way an upstream service has serialised an annual rating.
type AnnualShape = fn(&Value) -> Option<String>;

/// Tried in order; the first shape that yields a rating wins.
const ANNUAL_SHAPES: &[AnnualShape] = &[direct_string, nested_rating, nested_performance_rating];

/// "A"
fn direct_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// { "rating": "A" }
fn nested_rating(value: &Value) -> Option<String> {
    nested_field(value, annual_field::RATING)
}

/// { "performance_rating": "A" }
fn nested_performance_rating(value: &Value) -> Option<String> {
    nested_field(value, annual_field::PERFORMANCE_RATING)
}

fn nested_field(value: &Value, field: &str) -> Option<String> {
    value
        .as_object()?
        .get(field)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rating held by a `year{YYYY}` field, or `None` for "no rating".
///
/// Accepts a bare string, `{rating}` or `{performance_rating}`; everything
/// else (null, empty string, empty object, numbers, arrays) is no rating.
pub fn extract_annual_rating(value: &Value) -> Option<String> {
    ANNUAL_SHAPES.iter().find_map(|shape| shape(value))
}

/// Empty and null count as valid ("no rating"); strings must be S/A/B/C/D.
pub fn is_valid_rating(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) if s.is_empty() => true,
        Value::String(s) => Rating::parse(s).is_some(),
        _ => false,
    }
}

/// Drop years after `current_year + 1`, keeping order.
pub fn filter_valid_years_at(years: &[i32], current_year: i32) -> Vec<i32> {
    years
        .iter()
        .copied()
        .filter(|&year| year <= current_year + 1)
        .collect()
}

pub fn filter_valid_years(years: &[i32]) -> Vec<i32> {
    filter_valid_years_at(years, Local::now().year())
}

/// Grid column descriptor for an annual rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnualColumn {
    pub year: i32,
    pub key: String,
    pub title: String,
    pub data_key: String,
    pub width: u32,
}

impl AnnualColumn {
    fn for_year(year: i32) -> Self {
        let key = format!("{year}-{}", period::ANNUAL_SUFFIX);
        Self {
            year,
            title: format!("{year}{}", period::ANNUAL_SUFFIX),
            data_key: format!("{}{key}", period::DATA_KEY_PREFIX),
            key,
            width: period::ANNUAL_COLUMN_WIDTH,
        }
    }
}

pub fn annual_columns_at(years: &[i32], current_year: i32) -> Vec<AnnualColumn> {
    filter_valid_years_at(years, current_year)
        .into_iter()
        .map(AnnualColumn::for_year)
        .collect()
}

pub fn annual_columns(years: &[i32]) -> Vec<AnnualColumn> {
    annual_columns_at(years, Local::now().year())
}
