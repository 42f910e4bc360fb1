//! Shared CLI definitions for tripdash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::Path;

/// Compression format for CSV files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz) - Most common, good balance of speed and compression
    Gzip,
    /// Zstandard compression (.zst) - Modern, fast compression with good ratios
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                _ => None,
            }
        } else {
            None
        }
    }
}

/// Command-line arguments for tripdash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tripdash",
    version,
    about = "Bike-share trip dashboard: aggregate a trip CSV and query it locally or remotely"
)]
pub struct Args {
    /// Path or http(s) URL of the trip CSV to load (not required with --generate-config or --clear-cache)
    #[arg(required_unless_present_any = ["generate_config", "clear_cache"], value_name = "PATH")]
    pub path: Option<std::path::PathBuf>,

    /// Specify that the file has no header
    #[arg(long = "no-header")]
    pub no_header: Option<bool>,

    /// Specify the delimiter to use when reading the CSV
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Specify the compression format explicitly (gzip, zstd)
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Directory for downloaded files (default: system temp, e.g. TMPDIR)
    #[arg(long = "temp-dir", value_name = "DIR")]
    pub temp_dir: Option<std::path::PathBuf>,

    /// Maximum number of trips retained after cleaning (default: 50000). The first N rows in file order are kept.
    #[arg(long = "max-rows", value_name = "N")]
    pub max_rows: Option<usize>,

    /// Print every derived dataset as JSON instead of the summary
    #[arg(long = "datasets", action, conflicts_with_all = ["query", "action"])]
    pub datasets: bool,

    /// Run a declarative query given as JSON, e.g. '{"filters":[{"column":"member_casual","operator":"eq","value":"member"}],"limit":5}'
    #[arg(long = "query", value_name = "JSON", conflicts_with = "action")]
    pub query: Option<String>,

    /// Dispatch one agent action given as JSON, e.g. '{"type":"add_widget","widgetId":"hourly"}'
    #[arg(long = "action", value_name = "JSON")]
    pub action: Option<String>,

    /// Remote backend base URL (overrides config and TRIPDASH_REMOTE_URL)
    #[arg(long = "remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Remote backend API key (overrides config and TRIPDASH_REMOTE_KEY)
    #[arg(long = "remote-key", value_name = "KEY")]
    pub remote_key: Option<String>,

    /// Remote table queried by --query (default: trips)
    #[arg(long = "remote-table", value_name = "TABLE")]
    pub remote_table: Option<String>,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/tripdash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,

    /// Clear all cache data (query history) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if placeholder.is_empty() || !arg.get_action().takes_values() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
