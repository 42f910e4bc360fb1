use color_eyre::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File holding one compact JSON query per line, oldest first
pub const QUERY_HISTORY_FILE: &str = "query_history.txt";

/// Registry of known cache files
const CACHE_FILES: &[&str] = &[QUERY_HISTORY_FILE];

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Create a CacheManager with a custom cache directory (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Ensure the cache directory exists
    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    tracing::warn!("Could not remove cache file {}: {}", filename, e);
                }
            }
        }

        Ok(())
    }
}

/// Persistent, bounded list of executed queries.
pub struct QueryHistory {
    cache: CacheManager,
    limit: usize,
    entries: Vec<String>,
}

impl QueryHistory {
    /// Read existing history. A missing file is an empty history; an unreadable one is logged
    /// and treated as empty.
    pub fn load(cache: CacheManager, limit: usize) -> Self {
        let history_file = cache.cache_file(QUERY_HISTORY_FILE);

        let mut entries: Vec<String> = match fs::read_to_string(&history_file) {
            Ok(content) => content
                .lines()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Could not read query history: {}", e);
                Vec::new()
            }
        };
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }

        Self {
            cache,
            limit,
            entries,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append one entry and persist. Blank entries and immediate repeats are skipped.
    pub fn add(&mut self, entry: &str) -> Result<()> {
        let entry = entry.trim().replace(['\n', '\r'], " ");
        if entry.is_empty() || self.entries.last() == Some(&entry) {
            return Ok(());
        }

        self.entries.push(entry);
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }

        self.save()
    }

    /// Rewrite the history file. Truncation happens only once the exclusive lock is held; when
    /// another writer holds it the file is left as is.
    fn save(&self) -> Result<()> {
        self.cache.ensure_cache_dir()?;

        let history_file = self.cache.cache_file(QUERY_HISTORY_FILE);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&history_file)?;

        if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
            tracing::warn!("History file is locked, not saving: {}", e);
            return Ok(());
        }

        file.set_len(0)?;
        for entry in &self.entries {
            writeln!(file, "{}", entry)?;
        }
        file.flush()?;

        Ok(())
    }
}
