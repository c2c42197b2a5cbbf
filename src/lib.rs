//! Quarterly / annual performance report core: quarter arithmetic, report
//! column generation, record pivoting and spreadsheet export.

pub mod annual;
pub mod columns;
pub mod date_range;
pub mod error;
pub mod export;
pub mod pivot;
pub mod quarter;
pub mod records;
pub mod schema;

#[cfg(feature = "python")]
mod python;

pub use annual::{extract_annual_rating, filter_valid_years, filter_valid_years_at};
pub use columns::{generate_columns, infer_columns, PeriodColumn, TimeRangeQuery};
pub use error::{ReportError, ReportResult};
pub use export::{build_export_table, ExportFormat, ExportOptions, ExportedFile};
pub use pivot::{rows_from_business_query, rows_from_records, EmployeeRow, Rating, RatingCounts};
pub use quarter::{compute_end_quarter, current_quarter, enumerate_consecutive, Quarter, QuarterTime};
pub use records::{BusinessQueryRecord, EmployeeInfo, PerformanceRecord};
