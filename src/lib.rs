//! Bike-share trip dashboard core: loads a trip CSV, cleans it, derives the dashboard datasets,
//! and answers declarative queries against a remote backend or the loaded rows.

pub mod actions;
pub mod aggregate;
pub mod cache;
pub mod cell;
pub mod config;
pub mod dashboard;
pub mod error_display;
pub mod loader;
pub mod query;
pub mod remote;
pub mod sanitize;
pub mod session;
pub mod source;

pub use actions::AgentAction;
pub use aggregate::{aggregate, aggregate_with, AggregateOptions, AggregateResult};
pub use cache::{CacheManager, QueryHistory};
pub use cell::{CellValue, Row};
pub use config::{AppConfig, ConfigManager};
pub use loader::{load_trips, LoadError, LoadOptions};
pub use query::{execute, DeclarativeQuery, Filter, FilterOperator, OrderBy};
#[cfg(feature = "http")]
pub use remote::PostgrestBackend;
pub use remote::{select_with_fallback, QueryOutcome, QuerySource, RemoteBackend, RemoteError};
pub use sanitize::{sanitize, TripRecord};
pub use session::{ActionOutcome, LoadReport, Session};

/// Re-export CLI types from the shared definitions crate
pub use tripdash_cli::{Args, CompressionFormat};

/// Application name used for config and cache directories
pub const APP_NAME: &str = "tripdash";
