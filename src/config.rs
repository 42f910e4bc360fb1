use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregate::{
    DEFAULT_MAX_ROWS, DEFAULT_ROUTE_LABEL_WIDTH, DEFAULT_STATION_LABEL_WIDTH, DEFAULT_TOP_N,
};

/// Environment variable overriding `[remote] url`
pub const ENV_REMOTE_URL: &str = "TRIPDASH_REMOTE_URL";
/// Environment variable overriding `[remote] api_key`
pub const ENV_REMOTE_KEY: &str = "TRIPDASH_REMOTE_KEY";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration template, every option commented out
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub retention: RetentionConfig,
    pub rankings: RankingsConfig,
    pub remote: RemoteConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingsConfig {
    pub top_n: usize,
    pub station_label_width: usize,
    pub route_label_width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the backend. The remote path is only used when this is set.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub history_limit: usize,
    pub enable_history: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            retention: RetentionConfig::default(),
            rankings: RankingsConfig::default(),
            remote: RemoteConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl Default for RankingsConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            station_label_width: DEFAULT_STATION_LABEL_WIDTH,
            route_label_width: DEFAULT_ROUTE_LABEL_WIDTH,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "trips".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            enable_history: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user → environment)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        let mut config = Self::load_from(&manager)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with the config file managed by `manager`, if one exists.
    /// An unreadable or malformed file is reported and skipped.
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();

        match Self::load_user_config(manager) {
            Ok(user_config) => config.merge(user_config),
            Err(e) => tracing::warn!("Ignoring user config: {}", e),
        }

        config.validate()?;
        Ok(config)
    }

    fn load_user_config(manager: &ConfigManager) -> Result<AppConfig> {
        let config_path = manager.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_REMOTE_URL).filter(|s| !s.trim().is_empty()) {
            self.remote.url = Some(url);
        }
        if let Some(key) = lookup(ENV_REMOTE_KEY).filter(|s| !s.trim().is_empty()) {
            self.remote.api_key = Some(key);
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.file_loading.merge(other.file_loading);
        self.retention.merge(other.retention);
        self.rankings.merge(other.rankings);
        self.remote.merge(other.remote);
        self.query.merge(other.query);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.retention.max_rows == 0 {
            return Err(eyre!("max_rows must be greater than 0"));
        }

        if self.rankings.top_n == 0 {
            return Err(eyre!("top_n must be greater than 0"));
        }

        if self.rankings.station_label_width == 0 || self.rankings.route_label_width == 0 {
            return Err(eyre!("label widths must be greater than 0"));
        }

        if self.remote.timeout_secs == 0 {
            return Err(eyre!("timeout_secs must be greater than 0"));
        }

        if self.remote.table.trim().is_empty() {
            return Err(eyre!("remote table must not be empty"));
        }

        if let Some(url) = &self.remote.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(eyre!(
                    "Invalid remote url: {}. Must start with http:// or https://",
                    url
                ));
            }
        }

        if let Some(compression) = &self.file_loading.compression {
            match compression.as_str() {
                "gzip" | "zstd" => {}
                _ => {
                    return Err(eyre!(
                        "Invalid compression: {}. Must be 'gzip' or 'zstd'",
                        compression
                    ))
                }
            }
        }

        Ok(())
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.ignore_errors.is_some() {
            self.ignore_errors = other.ignore_errors;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
    }
}

impl RetentionConfig {
    pub fn merge(&mut self, other: Self) {
        let default = RetentionConfig::default();
        if other.max_rows != default.max_rows {
            self.max_rows = other.max_rows;
        }
    }
}

impl RankingsConfig {
    pub fn merge(&mut self, other: Self) {
        let default = RankingsConfig::default();
        if other.top_n != default.top_n {
            self.top_n = other.top_n;
        }
        if other.station_label_width != default.station_label_width {
            self.station_label_width = other.station_label_width;
        }
        if other.route_label_width != default.route_label_width {
            self.route_label_width = other.route_label_width;
        }
    }
}

impl RemoteConfig {
    pub fn merge(&mut self, other: Self) {
        let default = RemoteConfig::default();
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.table != default.table {
            self.table = other.table;
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

impl QueryConfig {
    pub fn merge(&mut self, other: Self) {
        let default = QueryConfig::default();
        if other.history_limit != default.history_limit {
            self.history_limit = other.history_limit;
        }
        if other.enable_history != default.enable_history {
            self.enable_history = other.enable_history;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention.max_rows, 50_000);
        assert_eq!(config.rankings.top_n, 10);
        assert_eq!(config.remote.table, "trips");
        assert!(!config.remote.is_configured());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = AppConfig::default();
        let mut other = AppConfig::default();
        other.retention.max_rows = 100;
        other.remote.url = Some("https://example.supabase.co".into());
        other.file_loading.delimiter = Some(b';');
        base.merge(other);
        assert_eq!(base.retention.max_rows, 100);
        assert_eq!(base.file_loading.delimiter, Some(b';'));
        assert!(base.remote.is_configured());
        // untouched sections keep defaults
        assert_eq!(base.rankings, RankingsConfig::default());
    }

    #[test]
    fn test_env_overrides_remote() {
        let mut config = AppConfig::default();
        config.apply_env(|name| match name {
            ENV_REMOTE_URL => Some("https://db.example.com".to_string()),
            ENV_REMOTE_KEY => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.remote.url.as_deref(), Some("https://db.example.com"));
        assert_eq!(config.remote.api_key.as_deref(), Some("secret"));

        let mut config = AppConfig::default();
        config.apply_env(|_| Some("   ".to_string()));
        assert!(config.remote.url.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.retention.max_rows = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.remote.url = Some("ftp://nope".into());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.file_loading.compression = Some("bzip2".into());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.version = "2.0".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let parsed: AppConfig = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [retention]
            max_rows = 1234

            [remote]
            table = "rides"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.retention.max_rows, 1234);
        assert_eq!(parsed.remote.table, "rides");
        assert_eq!(parsed.remote.timeout_secs, 15);
        assert_eq!(parsed.query, QueryConfig::default());
    }
}
