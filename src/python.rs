//! Python surface, built with `--features python`.
//!
//! Records cross the boundary as JSON text, tables as Polars DataFrames.

use once_cell::sync::OnceCell;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyModule};
use pyo3_polars::PyDataFrame;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::annual;
use crate::columns::{generate_columns, TimeRangeQuery};
use crate::error::{ReportError, ReportResult};
use crate::export::{self, ExportFormat, ExportOptions};
use crate::pivot::{rows_from_business_query, rows_from_records};
use crate::quarter::{self, Quarter, QuarterTime};
use crate::records::{BusinessQueryRecord, PerformanceRecord};
use crate::schema::{business_query, period};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Records as sent by one of the two backend endpoints.
enum Records {
    Flat(Vec<PerformanceRecord>),
    BusinessQuery(Vec<BusinessQueryRecord>),
}

/// Business-query records are recognised by their `employeeNo` field.
fn load_records(records_json: &str) -> ReportResult<Records> {
    let values: Vec<Value> = serde_json::from_str(records_json)?;
    let is_business_query = values
        .first()
        .and_then(Value::as_object)
        .is_some_and(|o| o.contains_key(business_query::EMPLOYEE_NO));

    if is_business_query {
        let records = values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BusinessQueryRecord>, _>>()?;
        Ok(Records::BusinessQuery(records))
    } else {
        let records = values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PerformanceRecord>, _>>()?;
        Ok(Records::Flat(records))
    }
}

fn parse_quarter(label: Option<&str>) -> ReportResult<Option<Quarter>> {
    label
        .map(|l| {
            Quarter::parse(l).ok_or_else(|| ReportError::Validation(format!("invalid quarter: {l}")))
        })
        .transpose()
}

fn build_query(
    start_year: Option<i32>,
    end_year: Option<i32>,
    start_quarter: Option<&str>,
    end_quarter: Option<&str>,
) -> ReportResult<Option<TimeRangeQuery>> {
    let (Some(start_year), Some(end_year)) = (start_year, end_year) else {
        return Ok(None);
    };
    Ok(Some(TimeRangeQuery {
        start_year,
        end_year,
        start_quarter: parse_quarter(start_quarter)?,
        end_quarter: parse_quarter(end_quarter)?,
    }))
}

/// Export table for either record shape. Flat records keep one line per
/// record; business-query records are pivoted with the full period set.
fn export_frame(records_json: &str, query: Option<&TimeRangeQuery>) -> ReportResult<polars::prelude::DataFrame> {
    match load_records(records_json)? {
        Records::Flat(records) => export::build_record_export_table(&records),
        Records::BusinessQuery(records) => {
            let rows = rows_from_business_query(&records);
            let columns = export::export_columns_for(&rows, query);
            export::build_export_table(&rows, &columns)
        }
    }
}

// ── Quarter arithmetic ──────────────────────────────────────────────────────

#[pyfunction]
fn quarter_to_string(year: i32, quarter: u8) -> String {
    QuarterTime::new(year, quarter).to_key()
}

#[pyfunction]
fn string_to_quarter(s: &str) -> Option<(i32, u8)> {
    QuarterTime::parse_key(s).map(|q| (q.year, q.quarter))
}

#[pyfunction]
fn is_valid_quarter(year: i32, quarter: u8) -> bool {
    QuarterTime::new(year, quarter).is_valid()
}

#[pyfunction]
fn calculate_end_quarter(year: i32, quarter: u8, query_length: u32) -> PyResult<(i32, u8)> {
    let end = quarter::compute_end_quarter(QuarterTime::new(year, quarter), query_length)?;
    Ok((end.year, end.quarter))
}

#[pyfunction]
#[pyo3(signature = (year, quarter, count=12))]
fn consecutive_quarters(year: i32, quarter: u8, count: usize) -> Vec<(i32, u8)> {
    quarter::enumerate_consecutive(QuarterTime::new(year, quarter), count)
        .into_iter()
        .map(|q| (q.year, q.quarter))
        .collect()
}

#[pyfunction]
fn current_quarter() -> (i32, u8) {
    let q = quarter::current_quarter();
    (q.year, q.quarter)
}

// ── Columns & ratings ───────────────────────────────────────────────────────

/// Export header keys for a time range, e.g. ["2024年度", "2024Q4", ...].
#[pyfunction]
#[pyo3(signature = (start_year, end_year, start_quarter=None, end_quarter=None))]
fn time_range_columns(
    start_year: i32,
    end_year: i32,
    start_quarter: Option<&str>,
    end_quarter: Option<&str>,
) -> PyResult<Vec<String>> {
    let query = TimeRangeQuery {
        start_year,
        end_year,
        start_quarter: parse_quarter(start_quarter)?,
        end_quarter: parse_quarter(end_quarter)?,
    };
    Ok(generate_columns(&query).iter().map(ToString::to_string).collect())
}

/// `value_json` is the JSON text of a `year{YYYY}` field.
#[pyfunction]
fn extract_annual_rating(value_json: &str) -> PyResult<Option<String>> {
    let value: Value = serde_json::from_str(value_json).map_err(ReportError::from)?;
    Ok(annual::extract_annual_rating(&value))
}

#[pyfunction]
fn filter_valid_years(years: Vec<i32>) -> Vec<i32> {
    annual::filter_valid_years(&years)
}

// ── Tables & export ─────────────────────────────────────────────────────────

/// Pivot records (either shape) into one JSON row per employee.
#[pyfunction]
fn performance_table(records_json: &str) -> PyResult<String> {
    let rows = match load_records(records_json)? {
        Records::Flat(records) => rows_from_records(&records, None),
        Records::BusinessQuery(records) => rows_from_business_query(&records),
    };
    Ok(serde_json::to_string(&rows).map_err(ReportError::from)?)
}

#[pyfunction]
#[pyo3(signature = (records_json, start_year=None, end_year=None, start_quarter=None, end_quarter=None))]
fn export_table(
    records_json: &str,
    start_year: Option<i32>,
    end_year: Option<i32>,
    start_quarter: Option<&str>,
    end_quarter: Option<&str>,
) -> PyResult<PyDataFrame> {
    let query = build_query(start_year, end_year, start_quarter, end_quarter)?;
    let df = export_frame(records_json, query.as_ref())?;
    Ok(PyDataFrame(df))
}

/// Returns `(file_name, bytes)`.
#[pyfunction]
#[pyo3(signature = (
    records_json,
    format = "xlsx",
    base_name = None,
    start_year = None,
    end_year = None,
    start_quarter = None,
    end_quarter = None,
))]
#[allow(clippy::too_many_arguments)]
fn export_bytes<'py>(
    py: Python<'py>,
    records_json: &str,
    format: &str,
    base_name: Option<String>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    start_quarter: Option<&str>,
    end_quarter: Option<&str>,
) -> PyResult<(String, Bound<'py, PyBytes>)> {
    let options = ExportOptions {
        base_name: base_name.unwrap_or_else(|| ExportOptions::default().base_name),
        format: ExportFormat::parse(format)?,
    };
    let query = build_query(start_year, end_year, start_quarter, end_quarter)?;
    let df = export_frame(records_json, query.as_ref())?;
    let file = export::export(&df, &options)?;
    Ok((file.file_name, PyBytes::new(py, &file.bytes)))
}

#[pyfunction]
fn csv_to_xlsx<'py>(py: Python<'py>, csv: &[u8]) -> PyResult<Bound<'py, PyBytes>> {
    let bytes = export::convert_csv_to_xlsx(csv)?;
    Ok(PyBytes::new(py, &bytes))
}

// ── Logging ─────────────────────────────────────────────────────────────────

/// Install a fmt subscriber once. `RUST_LOG` wins over `level`.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> PyResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| -> ReportResult<()> {
            let filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(level))
                .map_err(|e| ReportError::Validation(format!("invalid log level '{level}': {e}")))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
                .map_err(|e| ReportError::Validation(format!("logging already installed: {e}")))?;
            Ok(())
        })
        .map(|_| ())
        .map_err(PyErr::from)
}

/// Export header labels as Python submodules.
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let export_mod = PyModule::new(m.py(), "export")?;
    export_mod.add("IDENTITY", crate::schema::export::IDENTITY.to_vec())?;
    export_mod.add("COUNTS", crate::schema::export::COUNTS.to_vec())?;
    export_mod.add("DEFAULT_BASE_NAME", crate::schema::export::DEFAULT_BASE_NAME)?;
    m.add_submodule(&export_mod)?;

    let period_mod = PyModule::new(m.py(), "period")?;
    period_mod.add("ANNUAL_SUFFIX", period::ANNUAL_SUFFIX)?;
    period_mod.add("ANNUAL_FIELD_PREFIX", period::ANNUAL_FIELD_PREFIX)?;
    m.add_submodule(&period_mod)?;

    Ok(())
}

#[pymodule]
#[pyo3(name = "_core")]
fn core_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(quarter_to_string, m)?)?;
    m.add_function(wrap_pyfunction!(string_to_quarter, m)?)?;
    m.add_function(wrap_pyfunction!(is_valid_quarter, m)?)?;
    m.add_function(wrap_pyfunction!(calculate_end_quarter, m)?)?;
    m.add_function(wrap_pyfunction!(consecutive_quarters, m)?)?;
    m.add_function(wrap_pyfunction!(current_quarter, m)?)?;
    m.add_function(wrap_pyfunction!(time_range_columns, m)?)?;
    m.add_function(wrap_pyfunction!(extract_annual_rating, m)?)?;
    m.add_function(wrap_pyfunction!(filter_valid_years, m)?)?;
    m.add_function(wrap_pyfunction!(performance_table, m)?)?;
    m.add_function(wrap_pyfunction!(export_table, m)?)?;
    m.add_function(wrap_pyfunction!(export_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(csv_to_xlsx, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
