use std::io::Cursor;

use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::columns::{generate_columns, infer_columns, PeriodColumn, TimeRangeQuery};
use crate::error::{ReportError, ReportResult};
use crate::pivot::EmployeeRow;
use crate::records::PerformanceRecord;
use crate::schema::{export, record_export};

const UTF8_BOM: &str = "\u{FEFF}";

// ── Formats & options ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    /// Parse "xlsx" or "csv". Legacy "xls" cannot be written and is rejected.
    pub fn parse(label: &str) -> ReportResult<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv;charset=utf-8;",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// File name without extension
    pub base_name: String,
    pub format: ExportFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            base_name: export::DEFAULT_BASE_NAME.to_string(),
            format: ExportFormat::default(),
        }
    }
}

impl ExportOptions {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.format.extension())
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

// ── Table building ──────────────────────────────────────────────────────────

/// Period columns for an export: the full queried range when a query is
/// given, otherwise the years found in the rows.
pub fn export_columns_for(rows: &[EmployeeRow], query: Option<&TimeRangeQuery>) -> Vec<PeriodColumn> {
    match query {
        Some(q) => generate_columns(q),
        None => infer_columns(rows.iter().flat_map(|r| r.performance_data.keys())),
    }
}

fn identity_fields(row: &EmployeeRow) -> [&str; 8] {
    [
        &row.employee_number,
        &row.employee_name,
        &row.departments[0],
        &row.departments[1],
        &row.departments[2],
        &row.departments[3],
        &row.employment_date,
        &row.position,
    ]
}

/// Employee table: identity columns, S..D tallies, then one column per period.
///
/// Every requested period gets a column even when no row has data for it.
/// With no rows the result is a header-only table.
pub fn build_export_table(rows: &[EmployeeRow], columns: &[PeriodColumn]) -> ReportResult<DataFrame> {
    let mut out: Vec<Column> =
        Vec::with_capacity(export::IDENTITY.len() + export::COUNTS.len() + columns.len());

    for (i, name) in export::IDENTITY.iter().enumerate() {
        let values: Vec<&str> = rows.iter().map(|r| identity_fields(r)[i]).collect();
        out.push(Column::new((*name).into(), values));
    }

    for (i, name) in export::COUNTS.iter().enumerate() {
        let values: Vec<u32> = rows.iter().map(|r| r.rating_counts.as_array()[i]).collect();
        out.push(Column::new((*name).into(), values));
    }

    for column in columns {
        let values: Vec<&str> = rows.iter().map(|r| r.rating(column)).collect();
        out.push(Column::new(column.to_string().into(), values));
    }

    let df = DataFrame::new(out)?;
    debug!(rows = df.height(), columns = df.width(), "built export table");
    Ok(df)
}

/// One line per flat record, for the legacy per-period export.
pub fn build_record_export_table(records: &[PerformanceRecord]) -> ReportResult<DataFrame> {
    let years: Vec<i32> = records.iter().map(|r| r.year).collect();

    let df = DataFrame::new(vec![
        Column::new(record_export::YEAR.into(), years),
        text_column(records, record_export::QUARTER, |r| r.quarter.as_str()),
        text_column(records, record_export::EMPLOYEE_NAME, |r| r.employee_name.as_str()),
        text_column(records, record_export::EMPLOYEE_NUMBER, |r| r.employee_number.as_str()),
        text_column(records, record_export::DEPARTMENT_NAME, |r| r.department_name.as_str()),
        text_column(records, record_export::DEPARTMENT_PATH, |r| r.department_path.as_str()),
        text_column(records, record_export::PERFORMANCE_RATING, |r| r.performance_rating.as_str()),
        text_column(records, record_export::LAST_SYNCED_AT, |r| r.last_synced_at.as_str()),
        text_column(records, record_export::CREATED_AT, |r| r.created_at.as_str()),
        text_column(records, record_export::UPDATED_AT, |r| r.updated_at.as_str()),
    ])?;
    Ok(df)
}

fn text_column(records: &[PerformanceRecord], name: &str, field: fn(&PerformanceRecord) -> &str) -> Column {
    let values: Vec<&str> = records.iter().map(field).collect();
    Column::new(name.into(), values)
}

pub fn header(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ── Writers ─────────────────────────────────────────────────────────────────

/// UTF-8 CSV with a leading BOM so spreadsheet tools detect the encoding.
pub fn write_csv(df: &DataFrame) -> ReportResult<Vec<u8>> {
    let mut buf = UTF8_BOM.as_bytes().to_vec();
    let mut df = df.clone();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buf)
}

/// Single-sheet workbook: header row, then one row per table row.
/// Integer columns are written as numbers, empty cells are left blank.
pub fn write_xlsx(df: &DataFrame) -> ReportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(export::SHEET_NAME)?;

    for (c, column) in df.get_columns().iter().enumerate() {
        let col = u16::try_from(c)
            .map_err(|_| ReportError::InvalidData(format!("too many columns: {}", df.width())))?;
        sheet.write_string(0, col, column.name().as_str())?;

        for r in 0..df.height() {
            let row = u32::try_from(r + 1)
                .map_err(|_| ReportError::InvalidData(format!("too many rows: {}", df.height())))?;
            match column.get(r)? {
                AnyValue::Null => {}
                AnyValue::String(s) => {
                    if !s.is_empty() {
                        sheet.write_string(row, col, s)?;
                    }
                }
                AnyValue::StringOwned(s) => {
                    if !s.is_empty() {
                        sheet.write_string(row, col, s.as_str())?;
                    }
                }
                AnyValue::UInt32(n) => {
                    sheet.write_number(row, col, f64::from(n))?;
                }
                AnyValue::Int32(n) => {
                    sheet.write_number(row, col, f64::from(n))?;
                }
                other => {
                    sheet.write_string(row, col, &other.to_string())?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), "wrote xlsx workbook");
    Ok(bytes)
}

pub fn export(df: &DataFrame, options: &ExportOptions) -> ReportResult<ExportedFile> {
    let bytes = match options.format {
        ExportFormat::Xlsx => write_xlsx(df)?,
        ExportFormat::Csv => write_csv(df)?,
    };
    Ok(ExportedFile {
        file_name: options.file_name(),
        mime_type: options.format.mime_type(),
        bytes,
    })
}

/// Pivoted rows straight to a file, columns chosen by [`export_columns_for`].
pub fn export_rows(
    rows: &[EmployeeRow],
    query: Option<&TimeRangeQuery>,
    options: &ExportOptions,
) -> ReportResult<ExportedFile> {
    let columns = export_columns_for(rows, query);
    let df = build_export_table(rows, &columns)?;
    export(&df, options)
}

/// Re-encode a CSV export as XLSX. All cells are read as text.
pub fn convert_csv_to_xlsx(csv: &[u8]) -> ReportResult<Vec<u8>> {
    let body = csv.strip_prefix(UTF8_BOM.as_bytes()).unwrap_or(csv);
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ReportError::InvalidData("CSV is empty".to_string()));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .into_reader_with_file_handle(Cursor::new(body.to_vec()))
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    write_xlsx(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quarter::Quarter;
    use std::collections::BTreeMap;

    fn sparse_row() -> EmployeeRow {
        let mut performance_data = BTreeMap::new();
        performance_data.insert(
            PeriodColumn::Quarterly {
                year: 2024,
                quarter: Quarter::Q1,
            },
            "A".to_string(),
        );
        performance_data.insert(
            PeriodColumn::Quarterly {
                year: 2024,
                quarter: Quarter::Q3,
            },
            "B".to_string(),
        );
        EmployeeRow {
            employee_id: "001".into(),
            employee_number: "001".into(),
            employee_name: "张三".into(),
            departments: ["技术部".into(), String::new(), String::new(), String::new()],
            employment_date: "2020-01-01".into(),
            position: "工程师".into(),
            performance_data,
            ..Default::default()
        }
    }

    fn cell<'a>(df: &'a DataFrame, name: &str, row: usize) -> &'a str {
        df.column(name).unwrap().str().unwrap().get(row).unwrap()
    }

    #[test]
    fn sparse_rows_still_get_every_requested_column() {
        let query = TimeRangeQuery::years(2024, 2024).with_quarters(Quarter::Q1, Quarter::Q4);
        let rows = vec![sparse_row()];
        let df = build_export_table(&rows, &generate_columns(&query)).unwrap();

        let names = header(&df);
        assert_eq!(
            &names[13..],
            ["2024年度", "2024Q4", "2024Q3", "2024Q2", "2024Q1"]
        );
        assert_eq!(&names[..8], export::IDENTITY);
        assert_eq!(&names[8..13], export::COUNTS);

        assert_eq!(df.height(), 1);
        assert_eq!(cell(&df, "2024Q1", 0), "A");
        assert_eq!(cell(&df, "2024Q3", 0), "B");
        assert_eq!(cell(&df, "2024Q2", 0), "");
        assert_eq!(cell(&df, "2024Q4", 0), "");
        assert_eq!(cell(&df, "2024年度", 0), "");
        assert_eq!(cell(&df, export::EMPLOYEE_NAME, 0), "张三");
    }

    #[test]
    fn empty_rows_give_header_only_table() {
        let columns = generate_columns(&TimeRangeQuery::years(2024, 2024));
        let df = build_export_table(&[], &columns).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 13 + 5);

        let csv = String::from_utf8(write_csv(&df).unwrap()).unwrap();
        let csv = csv.strip_prefix(UTF8_BOM).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.trim_end().ends_with("2024年度,2024Q4,2024Q3,2024Q2,2024Q1"));
    }

    #[test]
    fn scan_mode_infers_full_years() {
        let rows = vec![sparse_row()];
        let columns = export_columns_for(&rows, None);
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["2024年度", "2024Q4", "2024Q3", "2024Q2", "2024Q1"]);
    }

    #[test]
    fn explicit_mode_ignores_data_years() {
        let rows = vec![sparse_row()];
        let query = TimeRangeQuery::years(2025, 2025).with_quarters(Quarter::Q4, Quarter::Q4);
        let names: Vec<String> = export_columns_for(&rows, Some(&query))
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, ["2025年度", "2025Q4"]);
    }

    #[test]
    fn tallies_are_numeric_columns() {
        let mut row = sparse_row();
        row.rating_counts.a = 3;
        let df = build_export_table(&[row], &[]).unwrap();
        let counts = df.column(export::COUNT_A).unwrap().u32().unwrap();
        assert_eq!(counts.get(0), Some(3));
    }

    #[test]
    fn formats_and_file_names() {
        assert_eq!(ExportFormat::parse("XLSX").unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::parse("csv").unwrap(), ExportFormat::Csv);
        let err = ExportFormat::parse("xls").unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedFormat(ref f) if f == "xls"));
        assert_eq!(
            err.to_string(),
            "Unsupported export format: xls (supported: xlsx, csv)"
        );

        let options = ExportOptions {
            base_name: "测试导出".into(),
            format: ExportFormat::Csv,
        };
        assert_eq!(options.file_name(), "测试导出.csv");
        assert_eq!(ExportOptions::default().file_name(), "绩效数据.xlsx");
    }

    #[test]
    fn xlsx_bytes_are_a_zip_container() {
        let df = build_export_table(&[sparse_row()], &[]).unwrap();
        let file = export(&df, &ExportOptions::default()).unwrap();
        assert_eq!(&file.bytes[..2], b"PK");
        assert_eq!(file.file_name, "绩效数据.xlsx");
    }

    #[test]
    fn record_export_has_fixed_header() {
        let record = PerformanceRecord {
            year: 2024,
            quarter: "Q2".into(),
            employee_name: "李四".into(),
            performance_rating: "B".into(),
            ..Default::default()
        };
        let df = build_record_export_table(&[record]).unwrap();
        assert_eq!(
            header(&df),
            ["年份", "季度", "员工姓名", "员工工号", "部门名称", "部门路径", "绩效评级", "最后同步时间", "创建时间", "更新时间"]
        );
        assert_eq!(cell(&df, record_export::PERFORMANCE_RATING, 0), "B");
    }

    #[test]
    fn csv_converts_to_xlsx() {
        let df = build_export_table(&[sparse_row()], &[]).unwrap();
        let csv = write_csv(&df).unwrap();
        let xlsx = convert_csv_to_xlsx(&csv).unwrap();
        assert_eq!(&xlsx[..2], b"PK");
    }

    #[test]
    fn empty_csv_is_rejected() {
        assert!(matches!(
            convert_csv_to_xlsx(b"\xEF\xBB\xBF \n"),
            Err(ReportError::InvalidData(_))
        ));
    }
}
