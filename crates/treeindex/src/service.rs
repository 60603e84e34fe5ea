//! IndexService - the entry point tying state, cache, builder and search together.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::builder::IndexBuilder;
use crate::cache::CacheStore;
use crate::cancel::VersionTracker;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::root_key::RootKey;
use crate::search::SearchEngine;
use crate::source::{LocalFileSystem, TreeSource};
use crate::state::{IndexState, StartOutcome};
use crate::types::{
    ClearReport, IndexBuildState, IndexStatusReport, SearchOptions, SearchOutcome, StartReport,
};

/// Owns the index state and runs at most one background build at a time.
pub struct IndexService {
    config: IndexConfig,
    state: Arc<IndexState>,
    cache: Arc<CacheStore>,
    source: Arc<dyn TreeSource>,
    engine: SearchEngine,
    build_versions: VersionTracker,
    search_versions: VersionTracker,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl IndexService {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_source(config, Arc::new(LocalFileSystem))
    }

    /// Builds a service that enumerates trees through `source`.
    pub fn with_source(config: IndexConfig, source: Arc<dyn TreeSource>) -> Self {
        let state = Arc::new(IndexState::new());
        let cache = Arc::new(CacheStore::new(config.cache_dir.clone()));
        let engine = SearchEngine::new(state.clone(), source.clone());
        Self {
            config,
            state,
            cache,
            source,
            engine,
            build_versions: VersionTracker::new(),
            search_versions: VersionTracker::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<IndexState> {
        &self.state
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Starts building the index for `locator` in the background.
    ///
    /// Returns once the build is underway. While a build is in flight the
    /// request joins it and reports `already_running` with the current
    /// progress. A root that has to be walked is opened first, so an
    /// unreachable one fails here with [`IndexError::RootUnreachable`].
    pub fn start_index(&self, locator: &str) -> Result<StartReport> {
        let root = RootKey::normalize(locator)?;
        if let StartOutcome::AlreadyRunning { indexed_so_far } = self.state.try_begin(root.clone())
        {
            log::debug!("index build already running, {root} joins it");
            return Ok(StartReport {
                status: IndexBuildState::Indexing,
                indexed_so_far,
                already_running: true,
            });
        }

        let cached = self.cache.has_fresh_record(&root, self.config.cache_max_age_hours);
        if self.state.has_cache_bypass(&root) || !cached {
            if let Err(source) = self.source.check_access(root.as_path()) {
                let error = IndexError::RootUnreachable {
                    root: root.to_string(),
                    source,
                };
                log::warn!("index build not started: {error}");
                self.state.mark_error(error.to_string(), 0, 1);
                return Err(error);
            }
        }

        let builder = IndexBuilder::new(
            self.state.clone(),
            self.cache.clone(),
            self.source.clone(),
            self.config.clone(),
        );
        let token = self.build_versions.current_token();
        let state = self.state.clone();
        log::info!("starting index build for {root}");

        let spawned = thread::Builder::new()
            .name("treeindex-build".to_string())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    builder.run(root, token)
                }));
                if let Err(panic_info) = result {
                    let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "build thread panicked".to_string()
                    };
                    log::error!("index build panicked: {message}");
                    let status = state.status();
                    state.mark_error(
                        format!("panic during build: {message}"),
                        status.indexed_so_far,
                        status.errors_so_far,
                    );
                }
            });

        match spawned {
            Ok(handle) => {
                let mut workers = self.workers.lock();
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
                Ok(StartReport {
                    status: IndexBuildState::Indexing,
                    indexed_so_far: 0,
                    already_running: false,
                })
            }
            Err(error) => {
                let message = format!("failed to spawn index build thread: {error}");
                self.state.mark_error(message.clone(), 0, 0);
                Err(IndexError::Internal(message))
            }
        }
    }

    pub fn index_status(&self) -> IndexStatusReport {
        self.state.status()
    }

    /// Deletes the persisted record for `locator` and makes its next build
    /// walk the tree. The in-memory snapshot is left alone.
    pub fn clear_cache(&self, locator: &str) -> Result<ClearReport> {
        let root = RootKey::normalize(locator)?;
        self.state.request_cache_bypass(root.clone());
        let cleared = self.cache.delete(&root)?;
        Ok(ClearReport { cleared })
    }

    pub fn search(
        &self,
        locator: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        self.engine
            .search(locator, query, options, self.search_versions.current_token())
    }

    /// Cancels the in-flight build, if any. Returns whether one was running.
    pub fn cancel_build(&self) -> bool {
        if self.state.build_state() != IndexBuildState::Indexing {
            return false;
        }
        self.build_versions.next_version();
        log::info!("index build cancellation requested");
        true
    }

    /// Blocks until every background build thread has exited.
    pub fn wait_for_build(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("index build thread terminated abnormally");
            }
        }
    }

    /// Cancels running work and waits for the build thread to exit.
    pub fn shutdown(&self) {
        self.build_versions.next_version();
        self.search_versions.next_version();
        self.wait_for_build();
    }
}

impl Drop for IndexService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
