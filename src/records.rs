use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `null` and absent both become the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One employee x period row from the legacy per-period endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub batch_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employee_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employee_user_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employee_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employee_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub organization_full_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub year: i32,
    /// "Q1".."Q4"
    #[serde(deserialize_with = "null_as_default")]
    pub quarter: String,
    #[serde(deserialize_with = "null_as_default")]
    pub performance_rating: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_synced_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
}

impl PerformanceRecord {
    /// Stable internal id, else the external user id.
    pub fn employee_key(&self) -> Option<&str> {
        [self.employee_id.as_str(), self.employee_user_id.as_str()]
            .into_iter()
            .find(|id| !id.is_empty())
    }

    /// Slash-delimited department path: organization full name, else department path.
    pub fn department_source(&self) -> &str {
        if self.organization_full_name.is_empty() {
            &self.department_path
        } else {
            &self.organization_full_name
        }
    }
}

/// One pre-aggregated employee row from the business-query endpoint.
///
/// `2025Q3` and `year2025` style fields are kept raw in `periods`; they are
/// only interpreted by [`crate::pivot::rows_from_business_query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessQueryRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub employee_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "level1Department", deserialize_with = "null_as_default")]
    pub level1_department: String,
    #[serde(rename = "level2Department", deserialize_with = "null_as_default")]
    pub level2_department: String,
    #[serde(rename = "level3Department", deserialize_with = "null_as_default")]
    pub level3_department: String,
    #[serde(rename = "level4Department", deserialize_with = "null_as_default")]
    pub level4_department: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employment_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(rename = "ratingCountS", deserialize_with = "null_as_default")]
    pub rating_count_s: u32,
    #[serde(rename = "ratingCountA", deserialize_with = "null_as_default")]
    pub rating_count_a: u32,
    #[serde(rename = "ratingCountB", deserialize_with = "null_as_default")]
    pub rating_count_b: u32,
    #[serde(rename = "ratingCountC", deserialize_with = "null_as_default")]
    pub rating_count_c: u32,
    #[serde(rename = "ratingCountD", deserialize_with = "null_as_default")]
    pub rating_count_d: u32,
    #[serde(flatten)]
    pub periods: Map<String, Value>,
}

/// Side table for the flat path, keyed by employee id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeInfo {
    pub employment_date: String,
    pub position: String,
}

/// First four non-blank levels of "A/B/C/D", missing levels empty.
pub fn parse_department_path(path: &str) -> [String; 4] {
    let mut levels: [String; 4] = Default::default();
    for (slot, part) in levels
        .iter_mut()
        .zip(path.split('/').filter(|p| !p.trim().is_empty()))
    {
        *slot = part.to_string();
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn department_path_levels() {
        assert_eq!(parse_department_path("技术部/后端组/平台"), ["技术部", "后端组", "平台", ""]);
        assert_eq!(parse_department_path("/A//B/ /C/D/E"), ["A", "B", "C", "D"]);
        assert_eq!(parse_department_path(""), ["", "", "", ""]);
    }

    #[test]
    fn employee_key_prefers_internal_id() {
        let mut r = PerformanceRecord {
            employee_id: "e-1".into(),
            employee_user_id: "u-1".into(),
            ..Default::default()
        };
        assert_eq!(r.employee_key(), Some("e-1"));
        r.employee_id.clear();
        assert_eq!(r.employee_key(), Some("u-1"));
        r.employee_user_id.clear();
        assert_eq!(r.employee_key(), None);
    }

    #[test]
    fn business_query_record_keeps_dynamic_fields() {
        let r: BusinessQueryRecord = serde_json::from_value(json!({
            "employeeNo": "001",
            "name": "张三",
            "level1Department": "技术部",
            "level2Department": null,
            "ratingCountA": 2,
            "2024Q1": "A",
            "year2024": {"rating": "B"}
        }))
        .unwrap();

        assert_eq!(r.employee_no, "001");
        assert_eq!(r.level1_department, "技术部");
        assert_eq!(r.level2_department, "");
        assert_eq!(r.rating_count_a, 2);
        assert_eq!(r.rating_count_s, 0);
        assert_eq!(r.periods.len(), 2);
        assert_eq!(r.periods["2024Q1"], json!("A"));
    }

    #[test]
    fn flat_record_tolerates_nulls() {
        let r: PerformanceRecord = serde_json::from_value(json!({
            "employee_id": null,
            "employee_user_id": "u-9",
            "year": 2024,
            "quarter": "Q2",
            "performance_rating": null
        }))
        .unwrap();
        assert_eq!(r.employee_key(), Some("u-9"));
        assert_eq!(r.performance_rating, "");
    }
}
