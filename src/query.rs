//! Local query engine: evaluates a [`DeclarativeQuery`] against in-memory rows.
//!
//! Stages run in a fixed order: filter (conjunction), order (stable), limit, project. The
//! engine never fails; malformed or unknown predicates are ignored rather than rejected.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::cell::{compare_cells, CellValue, Row};

/// Row limit used when a query does not specify one.
pub const DEFAULT_LIMIT: i64 = 50;
/// Upper bound on rows returned by the local engine.
pub const MAX_LOCAL_LIMIT: i64 = 500;
/// Upper bound on rows requested from the remote backend.
pub const MAX_REMOTE_LIMIT: i64 = 200;

/// Anything the engine can read a row from.
pub trait AsRow {
    fn as_row(&self) -> &Row;
}

impl AsRow for Row {
    fn as_row(&self) -> &Row {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ilike,
    In,
    /// Operator name the engine does not understand; the filter always passes.
    Unknown(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Ilike => "ilike",
            FilterOperator::In => "in",
            FilterOperator::Unknown(name) => name,
        }
    }

    pub fn iterator() -> impl Iterator<Item = FilterOperator> {
        [
            FilterOperator::Eq,
            FilterOperator::Neq,
            FilterOperator::Gt,
            FilterOperator::Gte,
            FilterOperator::Lt,
            FilterOperator::Lte,
            FilterOperator::Ilike,
            FilterOperator::In,
        ]
        .into_iter()
    }
}

impl From<String> for FilterOperator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "eq" => FilterOperator::Eq,
            "neq" => FilterOperator::Neq,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "ilike" => FilterOperator::Ilike,
            "in" => FilterOperator::In,
            _ => FilterOperator::Unknown(name),
        }
    }
}

/// Non-string operators (numbers, null, objects) are kept as unknown and never fail a query.
impl From<Value> for FilterOperator {
    fn from(value: Value) -> Self {
        match value {
            Value::String(name) => FilterOperator::from(name),
            other => FilterOperator::Unknown(other.to_string()),
        }
    }
}

impl Default for FilterOperator {
    fn default() -> Self {
        FilterOperator::Unknown(String::new())
    }
}

impl From<&str> for FilterOperator {
    fn from(name: &str) -> Self {
        FilterOperator::from(name.to_string())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

/// One predicate: `column operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, operator: impl Into<FilterOperator>, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

fn deserialize_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
}

/// Projection, filters, ordering and limit. Shared verbatim by the local engine and the
/// remote adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(
        default,
        deserialize_with = "deserialize_limit",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<i64>,
}

impl DeclarativeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requested projection, treating an empty list as "all columns".
    pub fn projection(&self) -> Option<&[String]> {
        self.columns.as_deref().filter(|cols| !cols.is_empty())
    }
}

/// Clamp a requested limit into `[1, max]`, defaulting to [`DEFAULT_LIMIT`].
pub fn clamp_limit(limit: Option<i64>, max: i64) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max) as usize
}

/// Matcher for SQL `ILIKE` patterns where `%` matches any run of characters.
#[derive(Debug, Clone)]
pub enum LikeMatcher {
    Pattern(Regex),
    /// Used when the pattern cannot be compiled: case-insensitive substring, wildcards removed.
    Substring(String),
}

impl LikeMatcher {
    /// Compile an anchored, case-insensitive matcher for `pattern`.
    pub fn new(pattern: &str) -> Self {
        let body = pattern
            .split('%')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        match RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(re) => LikeMatcher::Pattern(re),
            Err(e) => {
                tracing::debug!(pattern, error = %e, "ilike pattern fell back to substring match");
                Self::substring(pattern)
            }
        }
    }

    pub fn substring(pattern: &str) -> Self {
        LikeMatcher::Substring(pattern.replace('%', "").to_lowercase())
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            LikeMatcher::Pattern(re) => re.is_match(text),
            LikeMatcher::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum NumericOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A filter compiled once per query.
enum Predicate<'q> {
    Eq(&'q str, &'q Value),
    Neq(&'q str, &'q Value),
    Numeric(&'q str, NumericOp, f64),
    Ilike(&'q str, LikeMatcher),
    In(&'q str, HashSet<String>),
    Ignore,
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => CellValue::from_json(other).as_text(),
    }
}

fn json_number(value: &Value) -> f64 {
    CellValue::from_json(value).as_number().unwrap_or(f64::NAN)
}

/// Members of an `in` filter: a JSON list, or a comma-separated string.
fn membership_set(value: &Value) -> HashSet<String> {
    match value {
        Value::Array(items) => items.iter().map(json_text).collect(),
        Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Value::Null => HashSet::new(),
        other => std::iter::once(json_text(other)).collect(),
    }
}

impl<'q> Predicate<'q> {
    fn compile(filter: &'q Filter) -> Self {
        let column = filter.column.as_str();
        if column.is_empty() {
            tracing::debug!(operator = %filter.operator.as_str(), "ignoring filter without a column");
            return Predicate::Ignore;
        }
        match &filter.operator {
            FilterOperator::Eq => Predicate::Eq(column, &filter.value),
            FilterOperator::Neq => Predicate::Neq(column, &filter.value),
            FilterOperator::Gt => Predicate::Numeric(column, NumericOp::Gt, json_number(&filter.value)),
            FilterOperator::Gte => {
                Predicate::Numeric(column, NumericOp::Gte, json_number(&filter.value))
            }
            FilterOperator::Lt => Predicate::Numeric(column, NumericOp::Lt, json_number(&filter.value)),
            FilterOperator::Lte => {
                Predicate::Numeric(column, NumericOp::Lte, json_number(&filter.value))
            }
            FilterOperator::Ilike => {
                Predicate::Ilike(column, LikeMatcher::new(&json_text(&filter.value)))
            }
            FilterOperator::In => Predicate::In(column, membership_set(&filter.value)),
            FilterOperator::Unknown(name) => {
                tracing::debug!(operator = %name, column, "ignoring filter with unknown operator");
                Predicate::Ignore
            }
        }
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Eq(column, value) => row.get(*column).is_some_and(|c| c.matches_json(value)),
            Predicate::Neq(column, value) => !row.get(*column).is_some_and(|c| c.matches_json(value)),
            Predicate::Numeric(column, op, rhs) => {
                let lhs = row
                    .get(*column)
                    .and_then(CellValue::as_number)
                    .unwrap_or(f64::NAN);
                // NaN on either side makes every comparison false
                match op {
                    NumericOp::Gt => lhs > *rhs,
                    NumericOp::Gte => lhs >= *rhs,
                    NumericOp::Lt => lhs < *rhs,
                    NumericOp::Lte => lhs <= *rhs,
                }
            }
            Predicate::Ilike(column, matcher) => {
                let text = row.get(*column).map(CellValue::as_text).unwrap_or_default();
                matcher.is_match(&text)
            }
            Predicate::In(column, set) => {
                let text = row.get(*column).map(CellValue::as_text).unwrap_or_default();
                set.contains(&text)
            }
            Predicate::Ignore => true,
        }
    }
}

/// Stable bottom-up merge sort. `slice::sort_by` may panic when the comparator is not a total
/// order, which mixed-type columns can produce under the date/number/string dispatch.
fn stable_sort_by<T, F>(items: &mut Vec<T>, mut compare: F)
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    let n = items.len();
    if n < 2 {
        return;
    }
    let mut buf = items.clone();
    let mut width = 1;
    while width < n {
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            for slot in buf.iter_mut().take(end).skip(start) {
                // take from the left run unless the right element is strictly smaller
                if j < end && (i >= mid || compare(&items[j], &items[i]) == Ordering::Less) {
                    *slot = items[j];
                    j += 1;
                } else {
                    *slot = items[i];
                    i += 1;
                }
            }
            start = end;
        }
        std::mem::swap(items, &mut buf);
        width *= 2;
    }
}

fn project(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        Some(columns) => columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
        None => row.clone(),
    }
}

/// Evaluate `query` against `rows`: filter, order, limit, project.
///
/// Pure and deterministic; running the same query twice over the same rows yields the same
/// sequence. An empty row set yields an empty result.
pub fn execute<R: AsRow>(query: &DeclarativeQuery, rows: &[R]) -> Vec<Row> {
    if rows.is_empty() {
        return Vec::new();
    }

    let predicates: Vec<Predicate> = query.filters.iter().map(Predicate::compile).collect();
    let mut matched: Vec<&Row> = rows
        .iter()
        .map(AsRow::as_row)
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .collect();
    let total_matched = matched.len();

    if let Some(order) = &query.order_by {
        let column = order.column.as_str();
        stable_sort_by(&mut matched, |a, b| {
            let ord = compare_cells(a.get(column), b.get(column));
            if order.ascending {
                ord
            } else {
                ord.reverse()
            }
        });
    }

    matched.truncate(clamp_limit(query.limit, MAX_LOCAL_LIMIT));

    tracing::debug!(
        filters = query.filters.len(),
        matched = total_matched,
        returned = matched.len(),
        "executed local query"
    );

    let projection = query.projection();
    matched.into_iter().map(|row| project(row, projection)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn station_rows() -> Vec<Row> {
        vec![
            row(&[("id", 1.0.into()), ("station", "123 Grove St".into())]),
            row(&[("id", 2.0.into()), ("station", "Grovesville Ave".into())]),
            row(&[("id", 3.0.into()), ("station", "Clark & Lake".into())]),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<f64> {
        rows.iter()
            .map(|r| r["id"].as_number().unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn test_operator_roundtrip_names() {
        for op in FilterOperator::iterator() {
            assert_eq!(FilterOperator::from(op.as_str()), op);
        }
        assert_eq!(
            FilterOperator::from("equals"),
            FilterOperator::Unknown("equals".to_string())
        );
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let q: DeclarativeQuery = serde_json::from_str(
            r#"{"columns":["ride_id"],
                "filters":[{"column":"member_casual","operator":"eq","value":"member"},
                           {"column":"x","operator":"bogus","value":1}],
                "orderBy":{"column":"started_at","ascending":false},
                "limit":10}"#,
        )
        .unwrap();
        assert_eq!(q.columns, Some(vec!["ride_id".to_string()]));
        assert_eq!(q.filters[0].operator, FilterOperator::Eq);
        assert_eq!(
            q.filters[1].operator,
            FilterOperator::Unknown("bogus".to_string())
        );
        assert_eq!(
            q.order_by,
            Some(OrderBy {
                column: "started_at".to_string(),
                ascending: false
            })
        );
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn test_fractional_limit_truncates() {
        let q: DeclarativeQuery = serde_json::from_str(r#"{"limit":7.9}"#).unwrap();
        assert_eq!(q.limit, Some(7));
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, MAX_LOCAL_LIMIT), 50);
        assert_eq!(clamp_limit(Some(0), MAX_LOCAL_LIMIT), 1);
        assert_eq!(clamp_limit(Some(-5), MAX_LOCAL_LIMIT), 1);
        assert_eq!(clamp_limit(Some(10_000), MAX_LOCAL_LIMIT), 500);
        assert_eq!(clamp_limit(Some(10_000), MAX_REMOTE_LIMIT), 200);
    }

    #[test]
    fn test_ilike_substring_wildcards() {
        let rows = station_rows();
        let q = DeclarativeQuery::new().with_filter(Filter::new("station", "ilike", "%Grove%"));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0, 2.0]);
    }

    #[test]
    fn test_ilike_prefix_is_anchored() {
        let rows = station_rows();
        let q = DeclarativeQuery::new().with_filter(Filter::new("station", "ilike", "grove%"));
        assert_eq!(ids(&execute(&q, &rows)), vec![2.0]);
    }

    #[test]
    fn test_ilike_without_wildcards_is_exact() {
        let rows = station_rows();
        let q = DeclarativeQuery::new().with_filter(Filter::new("station", "ilike", "clark & lake"));
        assert_eq!(ids(&execute(&q, &rows)), vec![3.0]);
        let q = DeclarativeQuery::new().with_filter(Filter::new("station", "ilike", "Clark"));
        assert!(execute(&q, &rows).is_empty());
    }

    #[test]
    fn test_ilike_escapes_regex_metacharacters() {
        let rows = vec![row(&[("id", 1.0.into()), ("name", "a.b (c)".into())])];
        let q = DeclarativeQuery::new().with_filter(Filter::new("name", "ilike", "A.B (%"));
        assert_eq!(execute(&q, &rows).len(), 1);
        let q = DeclarativeQuery::new().with_filter(Filter::new("name", "ilike", "a?b%"));
        assert!(execute(&q, &rows).is_empty());
    }

    #[test]
    fn test_like_substring_fallback() {
        let matcher = LikeMatcher::substring("%GROVE%");
        assert!(matcher.is_match("123 grove st"));
        assert!(!matcher.is_match("Clark"));
    }

    #[test]
    fn test_unknown_operator_is_ignored() {
        let rows = station_rows();
        let q = DeclarativeQuery::new().with_filter(Filter::new("station", "eqq", "nothing"));
        assert_eq!(execute(&q, &rows).len(), 3);
    }

    #[test]
    fn test_malformed_filters_are_ignored() {
        let rows = station_rows();
        let q: DeclarativeQuery = serde_json::from_str(
            r#"{"filters":[{"column":"station","value":"Clark & Lake"},
                           {"column":"station","operator":null,"value":"x"},
                           {"column":"id","operator":7,"value":1},
                           {"operator":"eq","value":"x"}],
                "limit":5}"#,
        )
        .unwrap();
        assert_eq!(q.filters[0].operator, FilterOperator::default());
        assert_eq!(
            q.filters[1].operator,
            FilterOperator::Unknown("null".to_string())
        );
        assert_eq!(q.filters[2].operator, FilterOperator::Unknown("7".to_string()));
        assert!(q.filters[3].column.is_empty());
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_eq_is_strict() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("n", 5.0.into())]),
            row(&[("id", 2.0.into()), ("n", "5".into())]),
        ];
        let q = DeclarativeQuery::new().with_filter(Filter::new("n", "eq", 5));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0]);
        let q = DeclarativeQuery::new().with_filter(Filter::new("n", "neq", 5));
        assert_eq!(ids(&execute(&q, &rows)), vec![2.0]);
    }

    #[test]
    fn test_neq_keeps_rows_missing_the_column() {
        let rows = vec![row(&[("id", 1.0.into())])];
        let q = DeclarativeQuery::new().with_filter(Filter::new("n", "neq", "x"));
        assert_eq!(execute(&q, &rows).len(), 1);
        let q = DeclarativeQuery::new().with_filter(Filter::new("n", "eq", Value::Null));
        assert!(execute(&q, &rows).is_empty());
    }

    #[test]
    fn test_numeric_comparisons_exclude_non_numeric() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("d", 12.5.into())]),
            row(&[("id", 2.0.into()), ("d", "30".into())]),
            row(&[("id", 3.0.into()), ("d", "n/a".into())]),
            row(&[("id", 4.0.into())]),
        ];
        let q = DeclarativeQuery::new().with_filter(Filter::new("d", "gt", 10));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0, 2.0]);
        let q = DeclarativeQuery::new().with_filter(Filter::new("d", "lte", "12.5"));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0]);
        let q = DeclarativeQuery::new().with_filter(Filter::new("d", "lt", "abc"));
        assert!(execute(&q, &rows).is_empty());
        let q = DeclarativeQuery::new().with_filter(Filter::new("d", "gte", 30));
        assert_eq!(ids(&execute(&q, &rows)), vec![2.0]);
    }

    #[test]
    fn test_in_with_list_and_comma_string() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("t", "electric_bike".into())]),
            row(&[("id", 2.0.into()), ("t", "classic_bike".into())]),
            row(&[("id", 3.0.into()), ("t", "docked_bike".into())]),
        ];
        let q = DeclarativeQuery::new()
            .with_filter(Filter::new("t", "in", json!(["electric_bike", "docked_bike"])));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0, 3.0]);
        let q = DeclarativeQuery::new()
            .with_filter(Filter::new("t", "in", "classic_bike, docked_bike"));
        assert_eq!(ids(&execute(&q, &rows)), vec![2.0, 3.0]);
    }

    #[test]
    fn test_in_coerces_cells_to_strings() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("n", 7.0.into())]),
            row(&[("id", 2.0.into()), ("n", "8".into())]),
        ];
        let q = DeclarativeQuery::new().with_filter(Filter::new("n", "in", json!([7, 8])));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0, 2.0]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("m", "member".into()), ("t", "electric_bike".into())]),
            row(&[("id", 2.0.into()), ("m", "member".into()), ("t", "classic_bike".into())]),
            row(&[("id", 3.0.into()), ("m", "casual".into()), ("t", "electric_bike".into())]),
        ];
        let q = DeclarativeQuery::new()
            .with_filter(Filter::new("m", "eq", "member"))
            .with_filter(Filter::new("t", "eq", "electric_bike"));
        assert_eq!(ids(&execute(&q, &rows)), vec![1.0]);
    }

    #[test]
    fn test_order_is_stable_both_directions() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("k", "b".into())]),
            row(&[("id", 2.0.into()), ("k", "a".into())]),
            row(&[("id", 3.0.into()), ("k", "b".into())]),
            row(&[("id", 4.0.into()), ("k", "a".into())]),
            row(&[("id", 5.0.into()), ("k", "b".into())]),
        ];
        let asc = DeclarativeQuery::new().with_order_by("k", true);
        assert_eq!(ids(&execute(&asc, &rows)), vec![2.0, 4.0, 1.0, 3.0, 5.0]);
        let desc = DeclarativeQuery::new().with_order_by("k", false);
        assert_eq!(ids(&execute(&desc, &rows)), vec![1.0, 3.0, 5.0, 2.0, 4.0]);
    }

    #[test]
    fn test_order_numeric_strings() {
        let rows = vec![
            row(&[("id", 1.0.into()), ("n", "10".into())]),
            row(&[("id", 2.0.into()), ("n", "9".into())]),
            row(&[("id", 3.0.into()), ("n", 100.0.into())]),
        ];
        let q = DeclarativeQuery::new().with_order_by("n", true);
        assert_eq!(ids(&execute(&q, &rows)), vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_order_mixed_types_does_not_panic() {
        let rows: Vec<Row> = (0..40)
            .map(|i| {
                let v: CellValue = match i % 4 {
                    0 => (i as f64).into(),
                    1 => format!("2024-01-{:02} 00:00:00", (i % 28) + 1).into(),
                    2 => "text".into(),
                    _ => CellValue::Null,
                };
                row(&[("id", (i as f64).into()), ("v", v)])
            })
            .collect();
        let q = DeclarativeQuery::new().with_order_by("v", true).with_limit(500);
        assert_eq!(execute(&q, &rows).len(), 40);
    }

    #[test]
    fn test_limit_and_projection() {
        let rows: Vec<Row> = (0..10)
            .map(|i| row(&[("id", (i as f64).into()), ("x", "y".into())]))
            .collect();
        let q = DeclarativeQuery::new()
            .with_columns(&["id", "missing"])
            .with_limit(3);
        let out = execute(&q, &rows);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].len(), 1);
        assert!(out[0].contains_key("id"));
        assert!(!out[0].contains_key("missing"));

        let q = DeclarativeQuery::new().with_limit(0);
        assert_eq!(execute(&q, &rows).len(), 1);
        let q = DeclarativeQuery::new().with_limit(-3);
        assert_eq!(execute(&q, &rows).len(), 1);
    }

    #[test]
    fn test_empty_columns_returns_full_record() {
        let rows = vec![row(&[("id", 1.0.into()), ("x", "y".into())])];
        let q = DeclarativeQuery {
            columns: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(execute(&q, &rows)[0].len(), 2);
    }

    #[test]
    fn test_empty_row_set() {
        let rows: Vec<Row> = Vec::new();
        let q = DeclarativeQuery::new().with_limit(10);
        assert!(execute(&q, &rows).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let rows = station_rows();
        let q = DeclarativeQuery::new().with_order_by("station", false);
        assert_eq!(execute(&q, &rows), execute(&q, &rows));
    }
}
