//! File-tree indexing and search library.
//!
//! This crate provides:
//! - Root locator normalization into case-insensitive keys
//! - A one-shot, fault-tolerant tree walk producing an in-memory snapshot
//! - A compressed on-disk cache of snapshots with age-based expiry
//! - Multi-term search against the snapshot, or a bounded live walk

pub mod builder;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod matcher;
pub mod root_key;
pub mod search;
pub mod service;
pub mod source;
pub mod state;
pub mod types;
pub mod walk;

// Re-export main types
pub use cache::CacheStore;
pub use cancel::{CancellationToken, VersionTracker};
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use root_key::RootKey;
pub use service::IndexService;
pub use source::{ChildEntry, LocalFileSystem, TreeSource};
pub use types::{
    ClearReport, Entry, IndexBuildState, IndexStatusReport, MatchMode, SearchHit, SearchOptions,
    SearchOutcome, SearchSource, SnapshotSource, StartReport, TypeFilter,
};
