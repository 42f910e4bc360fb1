//! Widget catalog and the ordered set of widgets currently on the dashboard.

use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::AggregateResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Kpis,
    Hourly,
    Weekday,
    Monthly,
    Duration,
    Rideable,
    TopStartStations,
    TopEndStations,
    TopRoutes,
    MemberCasualWeekday,
}

impl WidgetKind {
    pub fn iterator() -> impl Iterator<Item = WidgetKind> {
        [
            WidgetKind::Kpis,
            WidgetKind::Hourly,
            WidgetKind::Weekday,
            WidgetKind::Monthly,
            WidgetKind::Duration,
            WidgetKind::Rideable,
            WidgetKind::TopStartStations,
            WidgetKind::TopEndStations,
            WidgetKind::TopRoutes,
            WidgetKind::MemberCasualWeekday,
        ]
        .into_iter()
    }

    pub fn id(&self) -> &'static str {
        match self {
            WidgetKind::Kpis => "kpis",
            WidgetKind::Hourly => "hourly",
            WidgetKind::Weekday => "weekday",
            WidgetKind::Monthly => "monthly",
            WidgetKind::Duration => "duration",
            WidgetKind::Rideable => "rideable",
            WidgetKind::TopStartStations => "top_start_stations",
            WidgetKind::TopEndStations => "top_end_stations",
            WidgetKind::TopRoutes => "top_routes",
            WidgetKind::MemberCasualWeekday => "member_casual_weekday",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WidgetKind::Kpis => "Key figures",
            WidgetKind::Hourly => "Trips by hour",
            WidgetKind::Weekday => "Trips by day of week",
            WidgetKind::Monthly => "Trips by month",
            WidgetKind::Duration => "Trip duration (minutes)",
            WidgetKind::Rideable => "Vehicle types",
            WidgetKind::TopStartStations => "Top start stations",
            WidgetKind::TopEndStations => "Top end stations",
            WidgetKind::TopRoutes => "Top routes",
            WidgetKind::MemberCasualWeekday => "Members vs casual riders by day",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::iterator().find(|kind| kind.id().eq_ignore_ascii_case(id))
    }

    /// The derived dataset this widget renders, as JSON.
    pub fn dataset(&self, result: &AggregateResult) -> Result<Value> {
        let value = match self {
            WidgetKind::Kpis => serde_json::to_value(&result.summary)?,
            WidgetKind::Hourly => serde_json::to_value(&result.hourly)?,
            WidgetKind::Weekday => serde_json::to_value(&result.weekday)?,
            WidgetKind::Monthly => serde_json::to_value(&result.monthly)?,
            WidgetKind::Duration => serde_json::to_value(&result.duration)?,
            WidgetKind::Rideable => serde_json::to_value(&result.rideable)?,
            WidgetKind::TopStartStations => serde_json::to_value(&result.top_start_stations)?,
            WidgetKind::TopEndStations => serde_json::to_value(&result.top_end_stations)?,
            WidgetKind::TopRoutes => serde_json::to_value(&result.top_routes)?,
            WidgetKind::MemberCasualWeekday => {
                serde_json::to_value(&result.member_casual_weekday)?
            }
        };
        Ok(value)
    }
}

/// Catalog entry shown by `show_menu`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetInfo {
    pub id: &'static str,
    pub title: &'static str,
}

impl From<WidgetKind> for WidgetInfo {
    fn from(kind: WidgetKind) -> Self {
        Self {
            id: kind.id(),
            title: kind.title(),
        }
    }
}

pub fn catalog() -> Vec<WidgetInfo> {
    WidgetKind::iterator().map(WidgetInfo::from).collect()
}

/// Widgets on the dashboard, in the order they were added. Each kind appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    widgets: Vec<WidgetKind>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `kind`; returns false when it is already present.
    pub fn add(&mut self, kind: WidgetKind) -> bool {
        if self.contains(kind) {
            return false;
        }
        self.widgets.push(kind);
        true
    }

    pub fn contains(&self, kind: WidgetKind) -> bool {
        self.widgets.contains(&kind)
    }

    pub fn widgets(&self) -> &[WidgetKind] {
        &self.widgets
    }
}
