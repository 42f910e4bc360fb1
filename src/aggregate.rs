//! Aggregation pipeline: turns the sanitized trips into the derived datasets the dashboard
//! renders, and keeps the capped row set for the query engine.

use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::AppConfig;
use crate::sanitize::{columns, TripRecord, UNKNOWN_STATION};

pub const DEFAULT_MAX_ROWS: usize = 50_000;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_STATION_LABEL_WIDTH: usize = 16;
pub const DEFAULT_ROUTE_LABEL_WIDTH: usize = 26;

pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Upper edges of the duration histogram, in minutes. Bucket `i` covers
/// `[DURATION_EDGES[i], DURATION_EDGES[i + 1])`; the last bucket includes its upper edge.
const DURATION_EDGES: [f64; 9] = [0.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0, 240.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Retained row cap; the first `max_rows` trips in file order are kept.
    pub max_rows: usize,
    pub top_n: usize,
    pub station_label_width: usize,
    pub route_label_width: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            top_n: DEFAULT_TOP_N,
            station_label_width: DEFAULT_STATION_LABEL_WIDTH,
            route_label_width: DEFAULT_ROUTE_LABEL_WIDTH,
        }
    }
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_rows: config.retention.max_rows,
            top_n: config.rankings.top_n,
            station_label_width: config.rankings.station_label_width,
            route_label_width: config.rankings.route_label_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataPoint {
    pub label: String,
    pub value: u64,
}

/// Member and casual counts for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPoint {
    pub label: String,
    pub member: u64,
    pub casual: u64,
}

/// One entry of a top-N ranking. `name` is the grouping key; `short_name` is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub short_name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub index: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_trips: u64,
    pub member_trips: u64,
    pub casual_trips: u64,
    /// Percentage of member trips, one decimal.
    pub member_ratio: f64,
    pub mean_duration_minutes: f64,
    pub peak_hour: Slot,
    pub busiest_day: Slot,
}

/// Everything derived from one load. Built once and never patched; a reload produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub summary: Summary,
    pub hourly: Vec<DataPoint>,
    pub weekday: Vec<DataPoint>,
    pub monthly: Vec<DataPoint>,
    pub duration: Vec<DataPoint>,
    pub rideable: Vec<DataPoint>,
    pub top_start_stations: Vec<RankedEntry>,
    pub top_end_stations: Vec<RankedEntry>,
    pub top_routes: Vec<RankedEntry>,
    pub member_casual_weekday: Vec<SplitPoint>,
    /// Column names of the retained rows, in source order when known.
    pub columns: Vec<String>,
    /// Trips dropped by the row cap.
    pub truncated: usize,
    #[serde(skip)]
    pub rows: Vec<TripRecord>,
}

impl AggregateResult {
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Truncate a display label to `width` characters, marking the cut with an ellipsis.
pub fn short_label(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let mut short: String = name.chars().take(width).collect();
        short.push('…');
        short
    } else {
        name.to_string()
    }
}

pub fn hour_label(hour: usize) -> String {
    format!("{:02}:00", hour)
}

/// Weekday index with Monday as 0, remapped from the Sunday-first numbering.
pub fn weekday_index(trip: &TripRecord) -> usize {
    (trip.started_at.weekday().num_days_from_sunday() as usize + 6) % 7
}

fn duration_bucket(minutes: f64) -> Option<usize> {
    let last = DURATION_EDGES.len() - 2;
    (0..=last).find(|&i| {
        let (lo, hi) = (DURATION_EDGES[i], DURATION_EDGES[i + 1]);
        minutes >= lo && (minutes < hi || (i == last && minutes <= hi))
    })
}

fn duration_label(i: usize) -> String {
    format!("{}-{}", DURATION_EDGES[i], DURATION_EDGES[i + 1])
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Index of the first maximum.
fn first_max(counts: &[u64]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

/// Counts keyed by label, remembering first-encounter order so ties rank stably.
#[derive(Default)]
struct Tally {
    order: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.order.len());
                self.order.push((key.to_string(), 1));
            }
        }
    }

    /// Descending by count; `sort_by` is stable so equal counts keep encounter order.
    fn ranked(mut self) -> Vec<(String, u64)> {
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order
    }
}

fn top_n(tally: Tally, n: usize, width: usize) -> Vec<RankedEntry> {
    tally
        .ranked()
        .into_iter()
        .take(n)
        .map(|(name, value)| RankedEntry {
            short_name: short_label(&name, width),
            name,
            value,
        })
        .collect()
}

fn is_member(trip: &TripRecord) -> bool {
    trip.member_casual.eq_ignore_ascii_case("member")
}

fn is_casual(trip: &TripRecord) -> bool {
    trip.member_casual.eq_ignore_ascii_case("casual")
}

/// Aggregate with default options.
pub fn aggregate(rows: Vec<TripRecord>) -> AggregateResult {
    aggregate_with(rows, &AggregateOptions::default())
}

/// Cap the row set, then derive every dataset from the capped rows.
///
/// Never fails: an empty input yields zeroed fixed-slot datasets and empty rankings.
pub fn aggregate_with(mut rows: Vec<TripRecord>, options: &AggregateOptions) -> AggregateResult {
    let truncated = rows.len().saturating_sub(options.max_rows);
    rows.truncate(options.max_rows);

    let mut hourly = [0u64; 24];
    let mut weekday = [0u64; 7];
    let mut duration = [0u64; 8];
    let mut split = [(0u64, 0u64); 7];
    let mut monthly: BTreeMap<String, u64> = BTreeMap::new();
    let mut rideable = Tally::default();
    let mut starts = Tally::default();
    let mut ends = Tally::default();
    let mut routes = Tally::default();
    let (mut members, mut casuals) = (0u64, 0u64);
    let mut total_minutes = 0.0;

    for trip in &rows {
        let day = weekday_index(trip);
        hourly[trip.started_at.hour() as usize] += 1;
        weekday[day] += 1;
        *monthly
            .entry(trip.started_at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        if let Some(bucket) = duration_bucket(trip.duration_minutes) {
            duration[bucket] += 1;
        }
        total_minutes += trip.duration_minutes;

        if is_member(trip) {
            members += 1;
            split[day].0 += 1;
        } else if is_casual(trip) {
            casuals += 1;
            split[day].1 += 1;
        }

        rideable.add(&trip.rideable_type);

        let start_known = trip.start_station_name != UNKNOWN_STATION;
        let end_known = trip.end_station_name != UNKNOWN_STATION;
        if start_known {
            starts.add(&trip.start_station_name);
        }
        if end_known {
            ends.add(&trip.end_station_name);
        }
        if start_known && end_known {
            routes.add(&format!(
                "{} → {}",
                trip.start_station_name, trip.end_station_name
            ));
        }
    }

    let total = rows.len() as u64;
    let (member_ratio, mean_duration_minutes) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            round1(members as f64 / total as f64 * 100.0),
            round1(total_minutes / total as f64),
        )
    };
    let peak = first_max(&hourly);
    let busiest = first_max(&weekday);

    let columns = rows
        .first()
        .map(|trip| trip.fields.keys().cloned().collect())
        .unwrap_or_else(|| vec![columns::DURATION_MINUTES.to_string()]);

    tracing::debug!(
        retained = rows.len(),
        truncated,
        months = monthly.len(),
        "aggregated trips"
    );

    AggregateResult {
        summary: Summary {
            total_trips: total,
            member_trips: members,
            casual_trips: casuals,
            member_ratio,
            mean_duration_minutes,
            peak_hour: Slot {
                index: peak,
                label: hour_label(peak),
            },
            busiest_day: Slot {
                index: busiest,
                label: WEEKDAY_LABELS[busiest].to_string(),
            },
        },
        hourly: hourly
            .iter()
            .enumerate()
            .map(|(h, &value)| DataPoint {
                label: hour_label(h),
                value,
            })
            .collect(),
        weekday: WEEKDAY_LABELS
            .iter()
            .zip(weekday)
            .map(|(label, value)| DataPoint {
                label: label.to_string(),
                value,
            })
            .collect(),
        monthly: monthly
            .into_iter()
            .map(|(label, value)| DataPoint { label, value })
            .collect(),
        duration: duration
            .iter()
            .enumerate()
            .map(|(i, &value)| DataPoint {
                label: duration_label(i),
                value,
            })
            .collect(),
        rideable: rideable
            .ranked()
            .into_iter()
            .map(|(label, value)| DataPoint { label, value })
            .collect(),
        top_start_stations: top_n(starts, options.top_n, options.station_label_width),
        top_end_stations: top_n(ends, options.top_n, options.station_label_width),
        top_routes: top_n(routes, options.top_n, options.route_label_width),
        member_casual_weekday: WEEKDAY_LABELS
            .iter()
            .zip(split)
            .map(|(label, (member, casual))| SplitPoint {
                label: label.to_string(),
                member,
                casual,
            })
            .collect(),
        columns,
        truncated,
        rows,
    }
}
