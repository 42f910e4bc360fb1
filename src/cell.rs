//! Loosely-typed cell values and the coercion rules shared by filtering and ordering.
//!
//! CSV cells arrive as strings, numbers, booleans or nulls. Filters and ordering never rely on
//! implicit conversions: every comparison goes through the explicit helpers in this module
//! (`as_number`, `as_text`, `as_timestamp`, [`compare_cells`]).

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One record: column name to cell value.
pub type Row = BTreeMap<String, CellValue>;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Naive datetime layouts accepted for timestamps, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp string into local wall-clock time.
///
/// Strings carrying an explicit offset (RFC 3339, e.g. `2024-01-01T08:00:00Z`) are converted to
/// the local timezone; naive strings are taken as local time already. Date-only strings resolve
/// to midnight. Anything else is `None`, never a sentinel such as the epoch.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Render a number the way it reads in the CSV: integral values without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl CellValue {
    /// Convert a JSON scalar into a cell. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// True for nulls and strings that are empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// String coercion used by `ilike`, `in` and the string tier of ordering. Null becomes `""`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Numeric coercion. Numbers pass through; text must parse as a finite number after
    /// trimming. Everything else is non-numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Date coercion. Only text cells can be dates; bare numbers never are.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Strict equality against a JSON value: same kind and same value, no coercion.
    pub fn matches_json(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (CellValue::Null, Value::Null) => true,
            (CellValue::Bool(a), Value::Bool(b)) => a == b,
            (CellValue::Number(a), Value::Number(b)) => b.as_f64() == Some(*a),
            (CellValue::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Collator-style string comparison: case-insensitive first, lowercase before uppercase on ties.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Compare two cells for ordering.
///
/// Tiers, tried in order for each pair:
/// 1. both parse as dates: chronological
/// 2. both parse as numbers: numeric
/// 3. otherwise: [`locale_compare`] on the string forms
///
/// Missing cells compare as null. The result is not guaranteed to be a total order across
/// mixed-type columns, so callers must not hand it to `slice::sort_by`.
pub fn compare_cells(a: Option<&CellValue>, b: Option<&CellValue>) -> Ordering {
    let null = CellValue::Null;
    let a = a.unwrap_or(&null);
    let b = b.unwrap_or(&null);

    if let (Some(x), Some(y)) = (a.as_timestamp(), b.as_timestamp()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    locale_compare(&a.as_text(), &b.as_text())
}
