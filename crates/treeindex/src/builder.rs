//! One-shot index build: cache lookup, walk, publish, persist.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::CacheStore;
use crate::cancel::CancellationToken;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::root_key::RootKey;
use crate::source::TreeSource;
use crate::state::IndexState;
use crate::types::{Snapshot, SnapshotSource};
use crate::walk::TreeWalker;

/// How a build ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Published {
        source: SnapshotSource,
        entries: usize,
    },
    Cancelled,
}

/// Builds a snapshot for one root and publishes it into [`IndexState`].
///
/// The caller is expected to have entered `indexing` through
/// [`IndexState::try_begin`]; `run` always leaves the state in `ready`,
/// `error` or (when cancelled) `idle`.
#[derive(Clone)]
pub struct IndexBuilder {
    state: Arc<IndexState>,
    cache: Arc<CacheStore>,
    source: Arc<dyn TreeSource>,
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(
        state: Arc<IndexState>,
        cache: Arc<CacheStore>,
        source: Arc<dyn TreeSource>,
        config: IndexConfig,
    ) -> Self {
        Self {
            state,
            cache,
            source,
            config,
        }
    }

    pub fn run(&self, root: RootKey, token: CancellationToken) -> Result<BuildOutcome> {
        let started = Instant::now();

        if self.state.take_cache_bypass(&root) {
            log::info!("cache bypass requested for {root}, rescanning");
        } else if let Some(cached) = self.cache.load(&root, self.config.cache_max_age_hours) {
            let entries = cached.entries.len();
            let snapshot = Snapshot {
                root: root.clone(),
                entries: cached.entries,
                error_count: 0,
                build_duration_secs: cached.build_duration_secs,
            };
            self.state.publish_snapshot(Arc::new(snapshot), SnapshotSource::Cache);
            log::info!(
                "index for {root} loaded from cache: {entries} entries in {:.2}s",
                started.elapsed().as_secs_f64()
            );
            return Ok(BuildOutcome::Published {
                source: SnapshotSource::Cache,
                entries,
            });
        }

        let mut walker = match TreeWalker::open(self.source.as_ref(), root.as_path(), token) {
            Ok(walker) => walker,
            Err(source) => {
                let error = IndexError::RootUnreachable {
                    root: root.to_string(),
                    source,
                };
                log::warn!("index build failed: {error}");
                self.state.mark_error(error.to_string(), 0, 1);
                return Err(error);
            }
        };

        let batch = self.config.progress_batch.max(1);
        let mut entries = Vec::new();
        while let Some(entry) = walker.next() {
            entries.push(entry);
            if entries.len() % batch == 0 {
                self.state.publish_progress(entries.len(), walker.errors());
            }
        }

        let errors = walker.errors();
        if walker.is_cancelled() {
            log::info!(
                "index build for {root} cancelled after {} entries",
                entries.len()
            );
            self.state.mark_cancelled(entries.len(), errors);
            return Ok(BuildOutcome::Cancelled);
        }

        let duration = started.elapsed().as_secs_f64();
        let count = entries.len();
        let snapshot = Arc::new(Snapshot {
            root: root.clone(),
            entries,
            error_count: errors,
            build_duration_secs: duration,
        });
        self.state.publish_snapshot(snapshot.clone(), SnapshotSource::Walk);
        log::info!("index built for {root}: {count} entries in {duration:.1}s ({errors} errors)");

        self.cache.save(&root, &snapshot.entries, duration);

        Ok(BuildOutcome::Published {
            source: SnapshotSource::Walk,
            entries: count,
        })
    }
}
