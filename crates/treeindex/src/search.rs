//! Query evaluation against a snapshot, or a bounded live walk.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::{IndexError, Result};
use crate::matcher::TermMatcher;
use crate::root_key::RootKey;
use crate::source::TreeSource;
use crate::state::IndexState;
use crate::types::{SearchHit, SearchOptions, SearchOutcome, SearchSource, Snapshot};
use crate::walk::TreeWalker;

/// Answers search queries for any root.
///
/// A snapshot for the requested root is used when the state holds one;
/// otherwise the tree is walked live, without publishing or caching.
#[derive(Clone)]
pub struct SearchEngine {
    state: Arc<IndexState>,
    source: Arc<dyn TreeSource>,
}

impl SearchEngine {
    pub fn new(state: Arc<IndexState>, source: Arc<dyn TreeSource>) -> Self {
        Self { state, source }
    }

    pub fn search(
        &self,
        locator: &str,
        query: &str,
        options: &SearchOptions,
        token: CancellationToken,
    ) -> Result<SearchOutcome> {
        if options.limit == 0 {
            return Err(IndexError::InvalidInput(
                "limit must be at least 1".to_string(),
            ));
        }
        let root = RootKey::normalize(locator)?;
        let matcher = TermMatcher::compile(query, options)?;

        // The lock is released here; the snapshot is immutable once published.
        let (snapshot, index_status) = self.state.snapshot_for(&root);
        match snapshot {
            Some(snapshot) => {
                let results = search_snapshot(&snapshot, &matcher, options.limit);
                Ok(SearchOutcome {
                    truncated: results.len() >= options.limit,
                    results,
                    source: SearchSource::Index,
                    index_status: Some(index_status),
                    indexed_count: Some(snapshot.entry_count()),
                })
            }
            None => {
                let results = self.search_live(&root, &matcher, options.limit, token);
                Ok(SearchOutcome {
                    truncated: results.len() >= options.limit,
                    results,
                    source: SearchSource::Live,
                    index_status: None,
                    indexed_count: None,
                })
            }
        }
    }

    fn search_live(
        &self,
        root: &RootKey,
        matcher: &TermMatcher,
        limit: usize,
        token: CancellationToken,
    ) -> Vec<SearchHit> {
        let mut results = Vec::new();
        let walker = match TreeWalker::open(self.source.as_ref(), root.as_path(), token) {
            Ok(walker) => walker,
            Err(error) => {
                log::debug!("live search could not open {root}: {error}");
                return results;
            }
        };
        for entry in walker {
            if matcher.matches(&entry) {
                results.push(SearchHit::from(entry));
                if results.len() >= limit {
                    break;
                }
            }
        }
        results
    }
}

/// Scans `snapshot` in stored order, stopping at `limit` matches.
pub fn search_snapshot(
    snapshot: &Snapshot,
    matcher: &TermMatcher,
    limit: usize,
) -> Vec<SearchHit> {
    snapshot
        .entries
        .iter()
        .filter(|entry| matcher.matches(entry))
        .take(limit)
        .map(SearchHit::from)
        .collect()
}
