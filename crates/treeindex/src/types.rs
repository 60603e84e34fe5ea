//! Core result and state types.
//!
//! These are the types the engine works with internally. The server crate
//! converts them to API payload types for serialization.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SEARCH_LIMIT;
use crate::error::{IndexError, Result};
use crate::root_key::RootKey;

/// One filesystem object discovered during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Case-folded base name, used for matching.
    pub name_lower: String,
    /// Original base name, used for display.
    pub name: String,
    /// Slash-joined path from the root, original case.
    pub relative_path: String,
    pub is_dir: bool,
    /// Bytes; 0 for directories and files whose size could not be read.
    pub size: u64,
}

impl Entry {
    pub fn new(name: String, relative_path: String, is_dir: bool, size: u64) -> Self {
        Self {
            name_lower: name.to_lowercase(),
            name,
            relative_path,
            is_dir,
            size: if is_dir { 0 } else { size },
        }
    }
}

/// Immutable, point-in-time listing of a tree.
#[derive(Debug)]
pub struct Snapshot {
    pub root: RootKey,
    /// Walk discovery order.
    pub entries: Vec<Entry>,
    pub error_count: usize,
    pub build_duration_secs: f64,
}

impl Snapshot {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Where the current snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Walk,
    Cache,
}

impl SnapshotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Cache => "cache",
        }
    }
}

/// Index build state.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum IndexBuildState {
    #[default]
    Idle,
    Indexing,
    Ready,
    Error,
}

impl IndexBuildState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// Index status as seen by pollers.
#[derive(Debug, Clone)]
pub struct IndexStatusReport {
    pub status: IndexBuildState,
    pub indexed_so_far: usize,
    pub errors_so_far: usize,
    pub elapsed_secs: f64,
    /// Root being indexed, or last indexed.
    pub root: Option<String>,
    /// Message of the last root-unreachable failure.
    pub last_error: Option<String>,
    /// Source of the current snapshot.
    pub source: Option<SnapshotSource>,
}

/// Reply to a start-index request.
#[derive(Debug, Clone, PartialEq)]
pub struct StartReport {
    pub status: IndexBuildState,
    pub indexed_so_far: usize,
    /// A build was already in flight; this request joined it.
    pub already_running: bool,
}

/// Reply to a clear-cache request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearReport {
    /// A persisted record existed and was removed.
    pub cleared: bool,
}

/// Which text a query term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Name,
    Path,
}

impl MatchMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "name" => Ok(Self::Name),
            "path" => Ok(Self::Path),
            other => Err(IndexError::InvalidInput(format!(
                "unsupported match mode: {other} (expected one of: name, path)"
            ))),
        }
    }
}

/// Type filter for entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    File,
    Dir,
}

impl TypeFilter {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "all" => Ok(Self::All),
            "file" => Ok(Self::File),
            "dir" | "directory" => Ok(Self::Dir),
            other => Err(IndexError::InvalidInput(format!(
                "unsupported type: {other} (expected one of: all, file, dir)"
            ))),
        }
    }

    pub fn matches(self, is_dir: bool) -> bool {
        match self {
            Self::All => true,
            Self::File => !is_dir,
            Self::Dir => is_dir,
        }
    }
}

/// Search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    pub match_mode: MatchMode,
    pub type_filter: TypeFilter,
    /// Whole-word matching.
    pub exact: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            match_mode: MatchMode::default(),
            type_filter: TypeFilter::default(),
            exact: false,
        }
    }
}

/// Where search results were drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    Index,
    Live,
}

impl SearchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Live => "live",
        }
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

impl From<&Entry> for SearchHit {
    fn from(entry: &Entry) -> Self {
        Self {
            name: entry.name.clone(),
            path: entry.relative_path.clone(),
            is_dir: entry.is_dir,
            size: entry.size,
        }
    }
}

impl From<Entry> for SearchHit {
    fn from(entry: Entry) -> Self {
        Self {
            name: entry.name,
            path: entry.relative_path,
            is_dir: entry.is_dir,
            size: entry.size,
        }
    }
}

/// Search results.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchHit>,
    /// The limit was reached. Does not promise that more matches exist.
    pub truncated: bool,
    pub source: SearchSource,
    /// Index state at search time; only set for index-backed searches.
    pub index_status: Option<IndexBuildState>,
    /// Size of the searched snapshot; only set for index-backed searches.
    pub indexed_count: Option<usize>,
}
