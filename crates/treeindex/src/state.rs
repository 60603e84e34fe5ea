//! Shared index state.
//!
//! One mutex guards status, counters and the current snapshot. It is held
//! only while fields are copied in or out, never across filesystem I/O.
//! The snapshot is published as an `Arc`, so readers clone the pointer under
//! the lock and scan it after releasing it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::root_key::RootKey;
use crate::types::{IndexBuildState, IndexStatusReport, Snapshot, SnapshotSource};

/// Pending cache bypasses kept at once; the oldest request is dropped first.
pub const MAX_PENDING_CACHE_BYPASS: usize = 64;

/// Result of trying to enter the `indexing` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A build is in flight; the request joins it.
    AlreadyRunning { indexed_so_far: usize },
}

#[derive(Debug, Default)]
struct StateInner {
    status: IndexBuildState,
    root: Option<RootKey>,
    indexed: usize,
    errors: usize,
    started_at: Option<Instant>,
    elapsed: Duration,
    last_error: Option<String>,
    snapshot: Option<Arc<Snapshot>>,
    snapshot_source: Option<SnapshotSource>,
    cache_bypass: VecDeque<RootKey>,
}

impl StateInner {
    fn finish_timing(&mut self) {
        if let Some(started_at) = self.started_at {
            self.elapsed = started_at.elapsed();
        }
    }
}

/// Holder of the current snapshot and build progress.
#[derive(Debug, Default)]
pub struct IndexState {
    inner: Mutex<StateInner>,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `indexing` for `root` unless a build is already in flight.
    ///
    /// Resets counters and the last error. The previous snapshot stays
    /// searchable until a new one is published.
    pub fn try_begin(&self, root: RootKey) -> StartOutcome {
        let mut inner = self.inner.lock();
        if inner.status == IndexBuildState::Indexing {
            return StartOutcome::AlreadyRunning {
                indexed_so_far: inner.indexed,
            };
        }
        inner.status = IndexBuildState::Indexing;
        inner.root = Some(root);
        inner.indexed = 0;
        inner.errors = 0;
        inner.started_at = Some(Instant::now());
        inner.elapsed = Duration::ZERO;
        inner.last_error = None;
        StartOutcome::Started
    }

    /// Publishes live walk counters.
    pub fn publish_progress(&self, indexed: usize, errors: usize) {
        let mut inner = self.inner.lock();
        inner.indexed = indexed;
        inner.errors = errors;
        inner.finish_timing();
    }

    /// Replaces the current snapshot and marks the index `ready`.
    pub fn publish_snapshot(&self, snapshot: Arc<Snapshot>, source: SnapshotSource) {
        let mut inner = self.inner.lock();
        inner.indexed = snapshot.entry_count();
        inner.errors = snapshot.error_count;
        inner.root = Some(snapshot.root.clone());
        inner.snapshot = Some(snapshot);
        inner.snapshot_source = Some(source);
        inner.status = IndexBuildState::Ready;
        inner.finish_timing();
    }

    /// Marks the build failed. Counters keep what was accumulated.
    pub fn mark_error(&self, message: String, indexed: usize, errors: usize) {
        let mut inner = self.inner.lock();
        inner.status = IndexBuildState::Error;
        inner.indexed = indexed;
        inner.errors = errors;
        inner.last_error = Some(message);
        inner.finish_timing();
    }

    /// Returns to `idle` after a cancelled build.
    pub fn mark_cancelled(&self, indexed: usize, errors: usize) {
        let mut inner = self.inner.lock();
        inner.status = IndexBuildState::Idle;
        inner.indexed = indexed;
        inner.errors = errors;
        inner.finish_timing();
    }

    pub fn build_state(&self) -> IndexBuildState {
        self.inner.lock().status
    }

    pub fn status(&self) -> IndexStatusReport {
        let inner = self.inner.lock();
        let elapsed = match (inner.status, inner.started_at) {
            (IndexBuildState::Indexing, Some(started_at)) => started_at.elapsed(),
            _ => inner.elapsed,
        };
        IndexStatusReport {
            status: inner.status,
            indexed_so_far: inner.indexed,
            errors_so_far: inner.errors,
            elapsed_secs: elapsed.as_secs_f64(),
            root: inner.root.as_ref().map(|root| root.to_string()),
            last_error: inner.last_error.clone(),
            source: inner.snapshot_source,
        }
    }

    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.lock().snapshot.clone()
    }

    /// Snapshot for `root`, if the current one belongs to it, with the build state.
    pub fn snapshot_for(&self, root: &RootKey) -> (Option<Arc<Snapshot>>, IndexBuildState) {
        let inner = self.inner.lock();
        let snapshot = inner
            .snapshot
            .as_ref()
            .filter(|snapshot| snapshot.root == *root)
            .cloned();
        (snapshot, inner.status)
    }

    /// Makes the next build of `root` skip the cache lookup.
    pub fn request_cache_bypass(&self, root: RootKey) {
        let mut inner = self.inner.lock();
        if inner.cache_bypass.contains(&root) {
            return;
        }
        if inner.cache_bypass.len() >= MAX_PENDING_CACHE_BYPASS {
            inner.cache_bypass.pop_front();
        }
        inner.cache_bypass.push_back(root);
    }

    pub fn has_cache_bypass(&self, root: &RootKey) -> bool {
        self.inner.lock().cache_bypass.contains(root)
    }

    /// Consumes a pending cache bypass for `root`.
    pub fn take_cache_bypass(&self, root: &RootKey) -> bool {
        let mut inner = self.inner.lock();
        match inner.cache_bypass.iter().position(|pending| pending == root) {
            Some(index) => {
                inner.cache_bypass.remove(index);
                true
            }
            None => false,
        }
    }
}
