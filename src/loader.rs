//! CSV loading: reads a trip file with polars and turns every line into a raw [`Row`], then runs
//! the sanitizer over them.

use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cell::{CellValue, Row};
use crate::config::AppConfig;
use crate::error_display::user_message_from_polars;
use crate::sanitize::{columns, sanitize_all, TripRecord};
use crate::source::{self, InputSource};
use crate::CompressionFormat;

/// Load-time failures. Each one ends the load attempt; nothing is published.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Could not parse CSV: {0}")]
    Parse(String),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("No valid trips found ({rejected} rows rejected)")]
    Empty { rejected: usize },
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub ignore_errors: bool,
    /// Forced compression; detected from the extension when `None`.
    pub compression: Option<CompressionFormat>,
    /// Where http(s) downloads are staged; the system temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            ignore_errors: false,
            compression: None,
            temp_dir: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        let loading = &config.file_loading;
        Self {
            delimiter: loading.delimiter.unwrap_or(defaults.delimiter),
            has_header: loading.has_header.unwrap_or(defaults.has_header),
            ignore_errors: loading.ignore_errors.unwrap_or(defaults.ignore_errors),
            compression: loading.compression.as_deref().and_then(|c| match c {
                "gzip" => Some(CompressionFormat::Gzip),
                "zstd" => Some(CompressionFormat::Zstd),
                _ => None,
            }),
            temp_dir: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    fn csv_read_options(&self) -> CsvReadOptions {
        let mut read_options = CsvReadOptions::default();
        read_options.has_header = self.has_header;
        // every column is read as text; numbers are recognised per cell
        read_options.infer_schema_length = Some(0);
        read_options.ignore_errors = self.ignore_errors;
        let delimiter = self.delimiter;
        // timestamps stay text; the sanitizer owns date parsing
        read_options.map_parse_options(|opts| {
            opts.with_separator(delimiter)
                .with_try_parse_dates(false)
        })
    }
}

/// Result of reading and sanitizing one file.
#[derive(Debug, Clone)]
pub struct LoadedTrips {
    /// Header order plus the synthetic `duration_minutes` column.
    pub columns: Vec<String>,
    /// Raw records read from the file.
    pub parsed_rows: usize,
    pub rejected: usize,
    pub records: Vec<TripRecord>,
}

fn parse_error(e: PolarsError) -> LoadError {
    LoadError::Parse(user_message_from_polars(&e))
}

/// Best-effort typing of one CSV field: finite numbers become [`CellValue::Number`], blanks
/// become [`CellValue::Null`], everything else stays text.
fn cell_from_text(s: &str) -> CellValue {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(s.to_string()),
    }
}

/// Convert one polars value into a cell. Text goes through per-cell number recognition;
/// integer and float types become numbers; types with no direct counterpart are rendered as
/// text.
pub fn cell_from_any(value: AnyValue<'_>) -> CellValue {
    match value {
        AnyValue::Null => CellValue::Null,
        AnyValue::Boolean(b) => CellValue::Bool(b),
        AnyValue::String(s) => cell_from_text(s),
        AnyValue::StringOwned(s) => cell_from_text(s.as_str()),
        AnyValue::Int32(n) => CellValue::Number(n as f64),
        AnyValue::Int64(n) => CellValue::Number(n as f64),
        AnyValue::UInt32(n) => CellValue::Number(n as f64),
        AnyValue::UInt64(n) => CellValue::Number(n as f64),
        AnyValue::Float32(n) => CellValue::Number(n as f64),
        AnyValue::Float64(n) => CellValue::Number(n),
        other => CellValue::Text(other.to_string()),
    }
}

/// Turn every DataFrame row into a [`Row`], in row order.
pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<Row>> {
    let columns = df.get_columns();
    let names: Vec<String> = columns
        .iter()
        .map(|c| c.name().as_str().trim().to_string())
        .collect();

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = Row::new();
        for (name, column) in names.iter().zip(columns) {
            let value = column.get(i).map_err(parse_error)?;
            row.insert(name.clone(), cell_from_any(value));
        }
        records.push(row);
    }
    Ok(records)
}

fn decompress(path: &Path, compression: CompressionFormat) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader: Box<dyn Read> = match compression {
        CompressionFormat::Gzip => Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file))),
        CompressionFormat::Zstd => Box::new(zstd::Decoder::new(BufReader::new(file))?),
    };
    let mut decompressed = Vec::new();
    reader.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Read a local CSV (optionally compressed) into a DataFrame.
pub fn read_dataframe(path: &Path, options: &LoadOptions) -> Result<DataFrame> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()).into());
    }

    let compression = options
        .compression
        .or_else(|| CompressionFormat::from_extension(path));

    let df = match compression {
        Some(compression) => {
            let decompressed = decompress(path, compression)?;
            CsvReader::new(std::io::Cursor::new(decompressed))
                .with_options(options.csv_read_options())
                .finish()
                .map_err(parse_error)?
        }
        None => options
            .csv_read_options()
            .try_into_reader_with_file_path(Some(path.into()))
            .and_then(|reader| reader.finish())
            .map_err(parse_error)?,
    };
    Ok(df)
}

#[cfg(feature = "http")]
fn download_http_to_temp(url: &str, options: &LoadOptions) -> Result<tempfile::NamedTempFile> {
    let dir = options
        .temp_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let (_, ext) = source::url_path_extension(url);
    let suffix = ext
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| ".csv".to_string());
    let mut temp = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile_in(&dir)
        .map_err(|_| LoadError::Download("could not create a temporary file".into()))?;

    tracing::info!(url, "downloading trip file");
    let response = ureq::get(url)
        .timeout(std::time::Duration::from_secs(300))
        .call()
        .map_err(|e| LoadError::Download(e.to_string()))?;
    std::io::copy(&mut response.into_reader(), &mut temp)
        .map_err(|e| LoadError::Download(format!("could not save the file: {e}")))?;
    Ok(temp)
}

#[cfg(not(feature = "http"))]
fn download_http_to_temp(url: &str, _options: &LoadOptions) -> Result<tempfile::NamedTempFile> {
    Err(LoadError::Download(format!(
        "{url}: built without http support (enable the `http` feature)"
    ))
    .into())
}

/// Column names in header order, with the synthetic duration column appended.
fn header_columns(df: &DataFrame) -> Vec<String> {
    let mut names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.as_str().trim().to_string())
        .collect();
    if !names.iter().any(|n| n == columns::DURATION_MINUTES) {
        names.push(columns::DURATION_MINUTES.to_string());
    }
    names
}

/// Read `path` (local file or http(s) URL) and sanitize every record.
///
/// Fails with [`LoadError::Empty`] when no record survives sanitization.
pub fn load_trips(path: &Path, options: &LoadOptions) -> Result<LoadedTrips> {
    let df = match source::input_source(path) {
        InputSource::Local(local) => read_dataframe(&local, options)?,
        InputSource::Http(url) => {
            let temp = download_http_to_temp(&url, options)?;
            let mut options = options.clone();
            if options.compression.is_none() {
                options.compression = CompressionFormat::from_extension(temp.path());
            }
            read_dataframe(temp.path(), &options)?
        }
    };

    let raw = dataframe_to_records(&df)?;
    let parsed_rows = raw.len();
    let report = sanitize_all(raw);

    if report.records.is_empty() {
        return Err(LoadError::Empty {
            rejected: report.rejected,
        }
        .into());
    }

    Ok(LoadedTrips {
        columns: header_columns(&df),
        parsed_rows,
        rejected: report.rejected,
        records: report.records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const CSV: &str = "ride_id,rideable_type,started_at,ended_at,start_station_name,end_station_name,member_casual,start_lat
A1,electric_bike,2024-01-01 08:00:00,2024-01-01 08:10:00,Clark St,Wells St,member,41.9
A2,classic_bike,2024-01-02 09:00:00,2024-01-02 09:30:00,,Wells St,casual,41.8
A3,classic_bike,not a date,2024-01-02 09:30:00,Clark St,Wells St,casual,41.8
";

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_load_plain_csv() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "trips.csv", CSV.as_bytes());
        let loaded = load_trips(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.parsed_rows, 3);
        assert_eq!(loaded.rejected, 1);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1].start_station_name, "Unknown");
        // numeric-looking column inferred as a number
        assert_eq!(
            loaded.records[0].fields["start_lat"],
            CellValue::Number(41.9)
        );
        assert_eq!(loaded.columns.first().map(String::as_str), Some("ride_id"));
        assert_eq!(
            loaded.columns.last().map(String::as_str),
            Some("duration_minutes")
        );
    }

    #[test]
    fn test_load_gzip_csv() {
        let dir = TempDir::new().unwrap();
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        let path = write(&dir, "trips.csv.gz", &encoder.finish().unwrap());
        let loaded = load_trips(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.records.len(), 2);
    }

    #[test]
    fn test_load_zstd_csv() {
        let dir = TempDir::new().unwrap();
        let compressed = zstd::encode_all(CSV.as_bytes(), 0).unwrap();
        let path = write(&dir, "trips.csv.zst", &compressed);
        let loaded = load_trips(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.records.len(), 2);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "trips.csv", CSV.replace(',', ";").as_bytes());
        let loaded = load_trips(&path, &LoadOptions::default().with_delimiter(b';')).unwrap();
        assert_eq!(loaded.records.len(), 2);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_trips(Path::new("/definitely/not/here.csv"), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn test_all_rows_rejected_is_empty() {
        let dir = TempDir::new().unwrap();
        let csv = "ride_id,started_at,ended_at\n,2024-01-01 08:00:00,2024-01-01 08:10:00\nB,x,y\n";
        let path = write(&dir, "bad.csv", csv.as_bytes());
        let err = load_trips(&path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::Empty { rejected: 2 })
        ));
    }

    #[test]
    fn test_cell_from_any() {
        assert_eq!(cell_from_any(AnyValue::Null), CellValue::Null);
        assert_eq!(cell_from_any(AnyValue::Int64(3)), CellValue::Number(3.0));
        assert_eq!(cell_from_any(AnyValue::Boolean(true)), CellValue::Bool(true));
        assert_eq!(
            cell_from_any(AnyValue::String("x")),
            CellValue::Text("x".into())
        );
    }

    #[test]
    fn test_text_cells_typed_per_record() {
        assert_eq!(cell_from_any(AnyValue::String(" 13022 ")), CellValue::Number(13022.0));
        assert_eq!(cell_from_any(AnyValue::String("-87.6")), CellValue::Number(-87.6));
        assert_eq!(cell_from_any(AnyValue::String("")), CellValue::Null);
        assert_eq!(cell_from_any(AnyValue::String("   ")), CellValue::Null);
        assert_eq!(
            cell_from_any(AnyValue::String("TA1307000039")),
            CellValue::Text("TA1307000039".into())
        );
        assert_eq!(cell_from_any(AnyValue::String("inf")), CellValue::Text("inf".into()));
        assert_eq!(cell_from_any(AnyValue::String("NaN")), CellValue::Text("NaN".into()));
    }

    #[test]
    fn test_mixed_column_after_first_thousand_rows() {
        let dir = TempDir::new().unwrap();
        let mut csv = String::from(
            "ride_id,rideable_type,started_at,ended_at,start_station_name,start_station_id,end_station_name,member_casual\n",
        );
        for i in 0..1200 {
            let station_id = if i < 1100 {
                format!("{}", 13000 + i)
            } else {
                format!("TA13070{:05}", i)
            };
            csv.push_str(&format!(
                "R{i},classic_bike,2024-01-01 08:00:00,2024-01-01 08:10:00,Clark St,{station_id},Wells St,member\n"
            ));
        }
        let path = write(&dir, "mixed.csv", csv.as_bytes());
        let loaded = load_trips(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.parsed_rows, 1200);
        assert_eq!(loaded.records.len(), 1200);
        assert_eq!(
            loaded.records[0].fields["start_station_id"],
            CellValue::Number(13000.0)
        );
        assert_eq!(
            loaded.records[1150].fields["start_station_id"],
            CellValue::Text("TA1307001150".into())
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.file_loading.delimiter = Some(b'\t');
        config.file_loading.compression = Some("zstd".into());
        let options = LoadOptions::from_config(&config);
        assert_eq!(options.delimiter, b'\t');
        assert_eq!(options.compression, Some(CompressionFormat::Zstd));
        assert!(options.has_header);
    }
}
