//! The session owns what one load produced and is the single entry point for queries and
//! agent actions.

use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::actions::AgentAction;
use crate::aggregate::{aggregate_with, AggregateOptions, AggregateResult};
use crate::cache::QueryHistory;
use crate::config::AppConfig;
use crate::dashboard::{catalog, Dashboard, WidgetInfo, WidgetKind};
use crate::loader::{load_trips, LoadOptions};
use crate::query::{self, DeclarativeQuery};
use crate::remote::{select_with_fallback, QueryOutcome, RemoteBackend};
use crate::sanitize::TripRecord;

/// Counts from the most recent load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub parsed_rows: usize,
    pub rejected_rows: usize,
    pub retained_rows: usize,
    pub truncated_rows: usize,
}

/// What dispatching an action produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    WidgetAdded {
        widget: WidgetInfo,
        /// Dashboard widget ids after the add, in order.
        dashboard: Vec<&'static str>,
    },
    Preview {
        widget: WidgetInfo,
        data: Value,
    },
    Menu {
        widgets: Vec<WidgetInfo>,
    },
    Query(QueryOutcome),
    /// The action was understood but could not be carried out; nothing changed.
    Rejected {
        reason: String,
    },
}

pub struct Session {
    load_options: LoadOptions,
    aggregate_options: AggregateOptions,
    remote: Option<Box<dyn RemoteBackend>>,
    history: Option<QueryHistory>,
    dashboard: Dashboard,
    result: Option<Arc<AggregateResult>>,
    report: Option<LoadReport>,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            load_options: LoadOptions::from_config(config),
            aggregate_options: AggregateOptions::from_config(config),
            remote: None,
            history: None,
            dashboard: Dashboard::new(),
            result: None,
            report: None,
        }
    }

    pub fn with_remote(mut self, remote: Box<dyn RemoteBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_history(mut self, history: QueryHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn with_aggregate_options(mut self, options: AggregateOptions) -> Self {
        self.aggregate_options = options;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Load, sanitize and aggregate `path`, then publish the result.
    ///
    /// On failure the previously published result stays in place.
    pub fn load(&mut self, path: &Path) -> Result<&LoadReport> {
        tracing::info!(path = %path.display(), "loading trips");
        let loaded = load_trips(path, &self.load_options)?;
        let result = aggregate_with(loaded.records, &self.aggregate_options)
            .with_columns(loaded.columns);

        let report = LoadReport {
            source: path.display().to_string(),
            parsed_rows: loaded.parsed_rows,
            rejected_rows: loaded.rejected,
            retained_rows: result.rows.len(),
            truncated_rows: result.truncated,
        };
        tracing::info!(
            parsed = report.parsed_rows,
            retained = report.retained_rows,
            rejected = report.rejected_rows,
            truncated = report.truncated_rows,
            "trips loaded"
        );

        self.publish(result);
        Ok(&*self.report.insert(report))
    }

    /// Replace the published result wholesale.
    pub fn publish(&mut self, result: AggregateResult) -> Arc<AggregateResult> {
        let result = Arc::new(result);
        self.result = Some(Arc::clone(&result));
        result
    }

    pub fn result(&self) -> Option<Arc<AggregateResult>> {
        self.result.clone()
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Retained rows of the published result; empty before the first load.
    fn retained(&self) -> &[TripRecord] {
        self.result
            .as_deref()
            .map(|r| r.rows.as_slice())
            .unwrap_or(&[])
    }

    /// Remote-preferred select with local fallback.
    pub fn select(&mut self, table: &str, query: &DeclarativeQuery) -> QueryOutcome {
        self.record(Some(table), query);
        select_with_fallback(self.remote.as_deref(), table, query, self.retained())
    }

    /// Select against the loaded rows only.
    pub fn select_local(&mut self, query: &DeclarativeQuery) -> QueryOutcome {
        self.record(None, query);
        QueryOutcome::local(query::execute(query, self.retained()))
    }

    fn record(&mut self, table: Option<&str>, query: &DeclarativeQuery) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        let entry = serde_json::json!({ "table": table, "query": query });
        if let Err(e) = history.add(&entry.to_string()) {
            tracing::warn!("Could not save query history: {}", e);
        }
    }

    pub fn dispatch(&mut self, action: AgentAction) -> ActionOutcome {
        tracing::debug!(action = action.name(), "dispatching action");
        match action {
            AgentAction::AddWidget { widget_id } => match WidgetKind::from_id(&widget_id) {
                Some(kind) => {
                    self.dashboard.add(kind);
                    ActionOutcome::WidgetAdded {
                        widget: kind.into(),
                        dashboard: self.dashboard.widgets().iter().map(|w| w.id()).collect(),
                    }
                }
                None => unknown_widget(&widget_id),
            },
            AgentAction::PreviewWidget { widget_id } => {
                let Some(kind) = WidgetKind::from_id(&widget_id) else {
                    return unknown_widget(&widget_id);
                };
                let Some(result) = self.result.as_deref() else {
                    return ActionOutcome::Rejected {
                        reason: "no trip data loaded yet".to_string(),
                    };
                };
                match kind.dataset(result) {
                    Ok(data) => ActionOutcome::Preview {
                        widget: kind.into(),
                        data,
                    },
                    Err(e) => ActionOutcome::Rejected {
                        reason: e.to_string(),
                    },
                }
            }
            AgentAction::ShowMenu => ActionOutcome::Menu { widgets: catalog() },
            AgentAction::Supabase { table, request } => {
                ActionOutcome::Query(self.select(&table, &request.query))
            }
            AgentAction::LocalSelect { request } => {
                ActionOutcome::Query(self.select_local(&request.query))
            }
        }
    }
}

fn unknown_widget(id: &str) -> ActionOutcome {
    let known: Vec<&str> = WidgetKind::iterator().map(|k| k.id()).collect();
    ActionOutcome::Rejected {
        reason: format!("unknown widget '{}'; available: {}", id, known.join(", ")),
    }
}
