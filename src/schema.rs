/// Field names, header labels and key formats for performance reports.
/// Single source of truth - shared by the normaliser, the exporter and the Python bindings.

// ── Quarter bounds ──────────────────────────────────────────────────────────
pub mod bounds {
    pub const MIN_YEAR: i32 = 2000;
    pub const MAX_YEAR: i32 = 2100;
    pub const MIN_SPAN_YEARS: u32 = 1;
    pub const MAX_SPAN_YEARS: u32 = 10;
    /// Length of the default quarter axis when no range is queried.
    pub const DEFAULT_QUARTER_COUNT: usize = 12;
    /// Upper bound on a walked quarter axis.
    pub const MAX_QUARTER_AXIS: usize = 100;
}

// ── Period key formats ──────────────────────────────────────────────────────
pub mod period {
    /// Suffix of annual columns: "2025年度" (header) and "2025-年度" (data key).
    pub const ANNUAL_SUFFIX: &str = "年度";
    /// Prefix of annual fields in business-query records: "year2025".
    pub const ANNUAL_FIELD_PREFIX: &str = "year";
    /// Grid data-key prefix used by the table component.
    pub const DATA_KEY_PREFIX: &str = "performance_data.";
    /// Default width of an annual grid column in pixels.
    pub const ANNUAL_COLUMN_WIDTH: u32 = 100;
}

// ── Business-query (wide) record fields ─────────────────────────────────────
pub mod business_query {
    /// Present on every business-query record, absent from flat records.
    pub const EMPLOYEE_NO: &str = "employeeNo";
}

// ── Annual field object shapes ──────────────────────────────────────────────
pub mod annual_field {
    pub const RATING: &str = "rating";
    pub const PERFORMANCE_RATING: &str = "performance_rating";
}

// ── Export header labels (employee table) ───────────────────────────────────
pub mod export {
    pub const EMPLOYEE_NUMBER: &str = "员工工号";
    pub const EMPLOYEE_NAME: &str = "员工姓名";
    pub const DEPARTMENT_LEVEL1: &str = "一级部门";
    pub const DEPARTMENT_LEVEL2: &str = "二级部门";
    pub const DEPARTMENT_LEVEL3: &str = "三级部门";
    pub const DEPARTMENT_LEVEL4: &str = "四级部门";
    pub const EMPLOYMENT_DATE: &str = "入职日期";
    pub const POSITION: &str = "职务";

    pub const IDENTITY: [&str; 8] = [
        EMPLOYEE_NUMBER,
        EMPLOYEE_NAME,
        DEPARTMENT_LEVEL1,
        DEPARTMENT_LEVEL2,
        DEPARTMENT_LEVEL3,
        DEPARTMENT_LEVEL4,
        EMPLOYMENT_DATE,
        POSITION,
    ];

    pub const COUNT_S: &str = "S级次数";
    pub const COUNT_A: &str = "A级次数";
    pub const COUNT_B: &str = "B级次数";
    pub const COUNT_C: &str = "C级次数";
    pub const COUNT_D: &str = "D级次数";

    /// Same order as `Rating::ALL`.
    pub const COUNTS: [&str; 5] = [COUNT_S, COUNT_A, COUNT_B, COUNT_C, COUNT_D];

    pub const DEFAULT_BASE_NAME: &str = "绩效数据";
    pub const SHEET_NAME: &str = "Sheet1";
}

// ── Export header labels (flat record table) ────────────────────────────────
pub mod record_export {
    pub const YEAR: &str = "年份";
    pub const QUARTER: &str = "季度";
    pub const EMPLOYEE_NAME: &str = "员工姓名";
    pub const EMPLOYEE_NUMBER: &str = "员工工号";
    pub const DEPARTMENT_NAME: &str = "部门名称";
    pub const DEPARTMENT_PATH: &str = "部门路径";
    pub const PERFORMANCE_RATING: &str = "绩效评级";
    pub const LAST_SYNCED_AT: &str = "最后同步时间";
    pub const CREATED_AT: &str = "创建时间";
    pub const UPDATED_AT: &str = "更新时间";
}
