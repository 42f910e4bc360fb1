//! Actions an external agent can emit, decoded from their JSON form.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::query::DeclarativeQuery;

/// Only `select` exists today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectVerb {
    #[default]
    Select,
}

/// A query request as carried by `supabase` and `local_select` actions: the verb plus the
/// declarative query fields inlined next to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub action: SelectVerb,
    #[serde(flatten)]
    pub query: DeclarativeQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    AddWidget {
        #[serde(rename = "widgetId")]
        widget_id: String,
    },
    PreviewWidget {
        #[serde(rename = "widgetId")]
        widget_id: String,
    },
    ShowMenu,
    /// Remote-preferred select against `table`.
    Supabase {
        table: String,
        #[serde(flatten)]
        request: SelectRequest,
    },
    /// Select evaluated against the loaded rows only.
    LocalSelect {
        #[serde(flatten)]
        request: SelectRequest,
    },
}

impl AgentAction {
    /// Decode one action from JSON.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| eyre!("Invalid action: {}", e))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentAction::AddWidget { .. } => "add_widget",
            AgentAction::PreviewWidget { .. } => "preview_widget",
            AgentAction::ShowMenu => "show_menu",
            AgentAction::Supabase { .. } => "supabase",
            AgentAction::LocalSelect { .. } => "local_select",
        }
    }
}
