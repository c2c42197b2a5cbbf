use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Query span must be between 1 and 10 years, got {0}")]
    InvalidSpan(u32),

    #[error("Quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u8),

    #[error("Year out of range (2000-2100): {0}")]
    YearOutOfRange(i32),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Unsupported export format: {0} (supported: xlsx, csv)")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

impl ReportError {
    /// Input the caller can fix, as opposed to a failure inside a writer.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpan(_)
                | Self::InvalidQuarter(_)
                | Self::YearOutOfRange(_)
                | Self::Validation(_)
                | Self::InvalidData(_)
                | Self::UnsupportedFormat(_)
                | Self::Json(_)
        )
    }
}

#[cfg(feature = "python")]
impl From<ReportError> for pyo3::PyErr {
    fn from(err: ReportError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyRuntimeError, PyValueError};
        if err.is_validation() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for ReportError {
    fn from(err: pyo3::PyErr) -> Self {
        ReportError::Validation(err.to_string())
    }
}
