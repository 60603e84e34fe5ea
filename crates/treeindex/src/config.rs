//! Engine configuration.

use std::path::PathBuf;

/// Maximum age of a cache record before it is ignored.
pub const DEFAULT_CACHE_MAX_AGE_HOURS: u64 = 24;

/// Entries discovered between two progress publishes.
pub const DEFAULT_PROGRESS_BATCH: usize = 500;

/// Result limit when the caller does not give one.
pub const DEFAULT_SEARCH_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Flat directory holding one cache record per root.
    pub cache_dir: PathBuf,
    pub cache_max_age_hours: u64,
    pub progress_batch: usize,
    pub default_search_limit: usize,
}

impl IndexConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            cache_max_age_hours: DEFAULT_CACHE_MAX_AGE_HOURS,
            progress_batch: DEFAULT_PROGRESS_BATCH,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_cache_max_age_hours(mut self, hours: u64) -> Self {
        self.cache_max_age_hours = hours;
        self
    }

    pub fn with_progress_batch(mut self, batch: usize) -> Self {
        self.progress_batch = batch.max(1);
        self
    }
}
