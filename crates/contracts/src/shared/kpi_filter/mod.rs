use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Record cell values
// ---------------------------------------------------------------------------

/// One cell of a data-source record.
///
/// Deserialized untagged from plain JSON, so `{"status": "active",
/// "value": 100000, "closed_on": "2026-03-01"}` yields Text, Number and Date
/// cells without any type annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
    Null,
}

impl FieldValue {
    /// Numeric view of the cell. Numeric strings are coerced; non-finite
    /// numbers are treated as absent.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Date view of the cell. Accepts `YYYY-MM-DD` and RFC 3339 timestamps.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => {
                let s = s.trim();
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// Predicate operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Between,
}

impl FilterOperator {
    /// Display symbol for condition chips
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "=",
            FilterOperator::NotEquals => "≠",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThan => "<",
            FilterOperator::Contains => "~",
            FilterOperator::Between => "∈",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::Contains => "contains",
            FilterOperator::Between => "between",
        }
    }
}

/// Comparison value of a predicate: a single cell, or a list (`between`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<FieldValue>),
    Scalar(FieldValue),
}

impl FilterValue {
    pub fn as_scalar(&self) -> Option<&FieldValue> {
        match self {
            FilterValue::Scalar(v) => Some(v),
            FilterValue::List(_) => None,
        }
    }

    /// Inclusive bounds of a `between` value; `None` unless exactly two elements.
    pub fn as_range(&self) -> Option<(&FieldValue, &FieldValue)> {
        match self {
            FilterValue::List(items) if items.len() == 2 => Some((&items[0], &items[1])),
            _ => None,
        }
    }
}

/// A single predicate over a record field. Filters of a KPI are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl KpiFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::Equals, FilterValue::Scalar(value.into()))
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::NotEquals, FilterValue::Scalar(value.into()))
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, FilterValue::Scalar(value.into()))
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, FilterValue::Scalar(value.into()))
    }

    pub fn contains(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOperator::Contains,
            FilterValue::Scalar(FieldValue::Text(pattern.into())),
        )
    }

    pub fn between(
        field: impl Into<String>,
        from: impl Into<FieldValue>,
        to: impl Into<FieldValue>,
    ) -> Self {
        Self::new(
            field,
            FilterOperator::Between,
            FilterValue::List(vec![from.into(), to.into()]),
        )
    }

    /// Human-readable text for condition chips, e.g. `stage = closed-won`.
    pub fn display_text(&self) -> String {
        match (&self.operator, &self.value) {
            (FilterOperator::Between, value) => match value.as_range() {
                Some((from, to)) => format!("{}: {} to {}", self.field, from, to),
                None => format!("{}: invalid range", self.field),
            },
            (FilterOperator::Contains, FilterValue::Scalar(v)) => {
                format!("{} contains \"{}\"", self.field, v)
            }
            (op, FilterValue::Scalar(v)) => format!("{} {} {}", self.field, op.symbol(), v),
            (op, FilterValue::List(items)) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                format!("{} {} [{}]", self.field, op.symbol(), parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cells_deserialize_untagged() {
        let cells: Vec<FieldValue> =
            serde_json::from_str(r#"[true, 42, 1.5, "2026-03-01", "active", null]"#).unwrap();
        assert_eq!(cells[0], FieldValue::Bool(true));
        assert_eq!(cells[1], FieldValue::Number(42.0));
        assert_eq!(cells[2], FieldValue::Number(1.5));
        assert_eq!(
            cells[3],
            FieldValue::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        );
        assert_eq!(cells[4], FieldValue::Text("active".into()));
        assert!(cells[5].is_null());
    }

    #[test]
    fn test_coercions() {
        assert_eq!(FieldValue::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(FieldValue::from("abc").as_number(), None);
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
        assert_eq!(
            FieldValue::from("2026-01-15T10:00:00Z").as_date(),
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
        assert_eq!(FieldValue::from("TRUE").as_bool(), Some(true));
        assert_eq!(FieldValue::Number(300000.0).to_string(), "300000");
        assert_eq!(FieldValue::Number(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_filter_json_shape() {
        let filter: KpiFilter = serde_json::from_str(
            r#"{"field": "value", "operator": "between", "value": [100, 500]}"#,
        )
        .unwrap();
        assert_eq!(filter, KpiFilter::between("value", 100, 500));
        assert_eq!(filter.display_text(), "value: 100 to 500");

        let filter: KpiFilter = serde_json::from_str(
            r#"{"field": "stage", "operator": "equals", "value": "closed-won"}"#,
        )
        .unwrap();
        assert_eq!(filter.display_text(), "stage = closed-won");
    }

    #[test]
    fn test_malformed_range() {
        let filter = KpiFilter::new(
            "value",
            FilterOperator::Between,
            FilterValue::List(vec![FieldValue::Number(1.0)]),
        );
        assert!(filter.value.as_range().is_none());
        assert_eq!(filter.display_text(), "value: invalid range");
    }
}
