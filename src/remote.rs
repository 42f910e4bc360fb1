//! Remote query adapter and the remote-then-local fallback.
//!
//! The same [`DeclarativeQuery`] is sent to the remote backend when one is configured; when it
//! is not, or the call fails, the query is evaluated locally and the outcome is labelled as such
//! with the failure reason attached as a note.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::cell::{CellValue, Row};
use crate::query::{self, clamp_limit, AsRow, DeclarativeQuery, FilterOperator, MAX_REMOTE_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote backend is not configured")]
    NotConfigured,
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote backend returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("could not decode remote response: {0}")]
    Decode(String),
}

/// A backend that can evaluate a declarative query against a named table.
pub trait RemoteBackend {
    fn select(&self, table: &str, query: &DeclarativeQuery) -> Result<Vec<Row>, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Remote,
    Local,
}

/// Rows plus where they came from. Rendering never needs to know which path ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub source: QuerySource,
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QueryOutcome {
    pub fn local(rows: Vec<Row>) -> Self {
        Self {
            source: QuerySource::Local,
            rows,
            note: None,
        }
    }
}

/// Run `query` remotely, falling back to the retained rows when the backend is absent or fails.
///
/// The local evaluation receives the query unchanged.
pub fn select_with_fallback<R: AsRow>(
    remote: Option<&dyn RemoteBackend>,
    table: &str,
    query: &DeclarativeQuery,
    retained: &[R],
) -> QueryOutcome {
    let failure = match remote {
        Some(backend) => match backend.select(table, query) {
            Ok(rows) => {
                return QueryOutcome {
                    source: QuerySource::Remote,
                    rows,
                    note: None,
                }
            }
            Err(e) => e,
        },
        None => RemoteError::NotConfigured,
    };

    tracing::warn!(table, reason = %failure, "remote query unavailable, using loaded rows");
    QueryOutcome {
        source: QuerySource::Local,
        rows: query::execute(query, retained),
        note: Some(format!("{}; answered from the loaded CSV instead", failure)),
    }
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => CellValue::from_json(other).as_text(),
    }
}

fn in_list(value: &Value) -> String {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().map(param_value).collect(),
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        other => vec![param_value(other)],
    };
    let quoted: Vec<String> = items
        .iter()
        .map(|item| {
            if item.contains([',', '(', ')', '"']) {
                format!("\"{}\"", item.replace('"', "\\\""))
            } else {
                item.clone()
            }
        })
        .collect();
    format!("({})", quoted.join(","))
}

/// PostgREST query-string parameters for `query`, in a stable order:
/// `select`, one entry per supported filter, `order`, `limit`.
pub fn request_params(query: &DeclarativeQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();

    let select = query
        .projection()
        .map(|cols| cols.join(","))
        .unwrap_or_else(|| "*".to_string());
    params.push(("select".to_string(), select));

    for filter in &query.filters {
        if filter.column.is_empty() {
            continue;
        }
        let value = match &filter.operator {
            FilterOperator::Ilike => param_value(&filter.value).replace('%', "*"),
            FilterOperator::In => in_list(&filter.value),
            FilterOperator::Unknown(_) => continue,
            _ => param_value(&filter.value),
        };
        params.push((
            filter.column.clone(),
            format!("{}.{}", filter.operator.as_str(), value),
        ));
    }

    if let Some(order) = &query.order_by {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    params.push((
        "limit".to_string(),
        clamp_limit(query.limit, MAX_REMOTE_LIMIT).to_string(),
    ));
    params
}

/// Decode a JSON array of objects into rows.
pub fn rows_from_json(body: &str) -> Result<Vec<Row>, RemoteError> {
    let value: Value = serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(RemoteError::Decode("expected a JSON array of rows".into()));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), CellValue::from_json(v)))
                .collect()),
            _ => Err(RemoteError::Decode("expected each row to be an object".into())),
        })
        .collect()
}

#[cfg(feature = "http")]
pub use http::PostgrestBackend;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::RemoteConfig;
    use std::time::Duration;

    /// Talks to a PostgREST-compatible REST endpoint (`{url}/rest/v1/{table}`).
    pub struct PostgrestBackend {
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    }

    impl PostgrestBackend {
        pub fn new(base_url: &str, api_key: Option<String>) -> Self {
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                timeout: Duration::from_secs(15),
            }
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        /// `None` when no url is configured.
        pub fn from_config(config: &RemoteConfig) -> Option<Self> {
            if !config.is_configured() {
                return None;
            }
            let url = config.url.as_deref()?;
            Some(
                Self::new(url, config.api_key.clone())
                    .with_timeout(Duration::from_secs(config.timeout_secs)),
            )
        }

        pub fn endpoint(&self, table: &str) -> String {
            format!("{}/rest/v1/{}", self.base_url, table)
        }
    }

    impl RemoteBackend for PostgrestBackend {
        fn select(&self, table: &str, query: &DeclarativeQuery) -> Result<Vec<Row>, RemoteError> {
            let mut request = ureq::get(&self.endpoint(table))
                .timeout(self.timeout)
                .set("Accept", "application/json");
            if let Some(key) = &self.api_key {
                request = request
                    .set("apikey", key)
                    .set("Authorization", &format!("Bearer {}", key));
            }
            for (name, value) in request_params(query) {
                request = request.query(&name, &value);
            }

            tracing::debug!(table, "sending remote select");
            let response = match request.call() {
                Ok(response) => response,
                Err(ureq::Error::Status(code, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(RemoteError::Status { code, body });
                }
                Err(e) => return Err(RemoteError::Transport(e.to_string())),
            };
            let body = response
                .into_string()
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
            rows_from_json(&body)
        }
    }
}
