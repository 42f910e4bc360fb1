//! Row sanitizer: turns a raw parsed CSV record into a validated [`TripRecord`].

use chrono::NaiveDateTime;

use crate::cell::{CellValue, Row};
use crate::query::AsRow;

/// Column names of the trip CSV.
pub mod columns {
    pub const RIDE_ID: &str = "ride_id";
    pub const RIDEABLE_TYPE: &str = "rideable_type";
    pub const STARTED_AT: &str = "started_at";
    pub const ENDED_AT: &str = "ended_at";
    pub const START_STATION_NAME: &str = "start_station_name";
    pub const END_STATION_NAME: &str = "end_station_name";
    pub const MEMBER_CASUAL: &str = "member_casual";
    /// Synthetic column added by the sanitizer; not present in the source CSV.
    pub const DURATION_MINUTES: &str = "duration_minutes";
}

/// Station name used when the source cell is blank.
pub const UNKNOWN_STATION: &str = "Unknown";

/// Category used for blank rider or vehicle categories.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Longest trip kept, in minutes (inclusive).
pub const MAX_TRIP_MINUTES: f64 = 240.0;

/// Why a raw record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingRideId,
    InvalidStart,
    InvalidEnd,
    DurationOutOfRange,
}

/// A sanitized trip. `fields` holds every original column plus `duration_minutes`, with blank
/// station names replaced by [`UNKNOWN_STATION`].
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub ride_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_minutes: f64,
    pub member_casual: String,
    pub rideable_type: String,
    pub start_station_name: String,
    pub end_station_name: String,
    pub fields: Row,
}

impl AsRow for TripRecord {
    fn as_row(&self) -> &Row {
        &self.fields
    }
}

fn text_field(raw: &Row, column: &str) -> Option<String> {
    raw.get(column)
        .filter(|cell| !cell.is_blank())
        .map(|cell| cell.as_text().trim().to_string())
}

fn timestamp_field(raw: &Row, column: &str) -> Option<NaiveDateTime> {
    raw.get(column).and_then(CellValue::as_timestamp)
}

/// Validate and clean one raw record.
///
/// Rejects records without a ride id, with an unparseable start or end time, or whose
/// duration is not in `(0, 240]` minutes.
pub fn sanitize(mut raw: Row) -> Result<TripRecord, Rejection> {
    let ride_id = text_field(&raw, columns::RIDE_ID).ok_or(Rejection::MissingRideId)?;
    let started_at = timestamp_field(&raw, columns::STARTED_AT).ok_or(Rejection::InvalidStart)?;
    let ended_at = timestamp_field(&raw, columns::ENDED_AT).ok_or(Rejection::InvalidEnd)?;

    let duration_minutes = (ended_at - started_at).num_milliseconds() as f64 / 60_000.0;
    if !(duration_minutes > 0.0 && duration_minutes <= MAX_TRIP_MINUTES) {
        return Err(Rejection::DurationOutOfRange);
    }

    let member_casual =
        text_field(&raw, columns::MEMBER_CASUAL).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
    let rideable_type =
        text_field(&raw, columns::RIDEABLE_TYPE).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

    let mut station = |column: &str| match text_field(&raw, column) {
        Some(name) => name,
        None => {
            raw.insert(column.to_string(), CellValue::from(UNKNOWN_STATION));
            UNKNOWN_STATION.to_string()
        }
    };
    let start_station_name = station(columns::START_STATION_NAME);
    let end_station_name = station(columns::END_STATION_NAME);

    // Two decimals in the queryable column; the typed field keeps full precision.
    raw.insert(
        columns::DURATION_MINUTES.to_string(),
        CellValue::Number((duration_minutes * 100.0).round() / 100.0),
    );

    Ok(TripRecord {
        ride_id,
        started_at,
        ended_at,
        duration_minutes,
        member_casual,
        rideable_type,
        start_station_name,
        end_station_name,
        fields: raw,
    })
}

/// Records that survived sanitization plus the count of rejected ones.
#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub records: Vec<TripRecord>,
    pub rejected: usize,
}

/// Sanitize every raw record in order. Rejections are counted, not reported per row.
pub fn sanitize_all<I>(raw_records: I) -> SanitizeReport
where
    I: IntoIterator<Item = Row>,
{
    let mut report = SanitizeReport::default();
    for (index, raw) in raw_records.into_iter().enumerate() {
        match sanitize(raw) {
            Ok(record) => report.records.push(record),
            Err(reason) => {
                tracing::trace!(row = index, ?reason, "rejected trip row");
                report.rejected += 1;
            }
        }
    }
    report
}
