#![allow(dead_code)]

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One fixture trip: (ride_id, started_at, ended_at, member_casual, start, end)
pub type TripFixture<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, &'a str);

/// Write `trips` as a CSV with the usual trip columns (plus `start_lat`) into `dir`.
pub fn write_trip_csv(dir: &Path, name: &str, trips: &[TripFixture]) -> PathBuf {
    let path = dir.join(name);
    let mut df = df! (
        "ride_id" => trips.iter().map(|t| t.0).collect::<Vec<&str>>(),
        "rideable_type" => trips
            .iter()
            .enumerate()
            .map(|(i, _)| if i % 2 == 0 { "electric_bike" } else { "classic_bike" })
            .collect::<Vec<&str>>(),
        "started_at" => trips.iter().map(|t| t.1).collect::<Vec<&str>>(),
        "ended_at" => trips.iter().map(|t| t.2).collect::<Vec<&str>>(),
        "start_station_name" => trips.iter().map(|t| t.4).collect::<Vec<&str>>(),
        "end_station_name" => trips.iter().map(|t| t.5).collect::<Vec<&str>>(),
        "member_casual" => trips.iter().map(|t| t.3).collect::<Vec<&str>>(),
        "start_lat" => (0..trips.len()).map(|i| 41.8 + i as f64 / 100.0).collect::<Vec<f64>>()
    )
    .unwrap();
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

/// `n` valid ten-minute trips, one per hour starting 2024-03-01 00:00, all members.
pub fn write_many_trips(dir: &Path, name: &str, n: usize) -> PathBuf {
    let path = dir.join(name);
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let starts: Vec<chrono::NaiveDateTime> = (0..n)
        .map(|i| start + chrono::Duration::hours(i as i64))
        .collect();
    let fmt = "%Y-%m-%d %H:%M:%S";
    let mut df = df! (
        "ride_id" => (0..n).map(|i| format!("R{}", i)).collect::<Vec<String>>(),
        "rideable_type" => vec!["classic_bike"; n],
        "started_at" => starts.iter().map(|s| s.format(fmt).to_string()).collect::<Vec<String>>(),
        "ended_at" => starts
            .iter()
            .map(|s| (*s + chrono::Duration::minutes(10)).format(fmt).to_string())
            .collect::<Vec<String>>(),
        "start_station_name" => vec!["Clark St"; n],
        "end_station_name" => vec!["Wells St"; n],
        "member_casual" => vec!["member"; n]
    )
    .unwrap();
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}
