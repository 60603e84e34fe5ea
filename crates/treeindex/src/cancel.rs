//! Cancellation tokens for index builds and live walks.
//!
//! A [`VersionTracker`] hands out tokens bound to a version number. Bumping
//! the tracker's active version cancels every token issued for an older
//! version. Walks check their token between directories, never between
//! individual entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks the active version for a class of cancellable operations.
#[derive(Debug, Default)]
pub struct VersionTracker {
    active_version: Arc<AtomicU64>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the active version and returns the new version number.
    ///
    /// Every token issued for an older version reports as cancelled afterwards.
    pub fn next_version(&self) -> u64 {
        self.active_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the current active version without incrementing.
    pub fn current_version(&self) -> u64 {
        self.active_version.load(Ordering::SeqCst)
    }

    /// Creates a token that stays active until the tracker moves past `version`.
    pub fn token_for_version(&self, version: u64) -> CancellationToken {
        CancellationToken {
            active_version: Some(self.active_version.clone()),
            version,
        }
    }

    /// Creates a token for the current version.
    pub fn current_token(&self) -> CancellationToken {
        self.token_for_version(self.current_version())
    }
}

/// A cancellation token for terminating long-running walks.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    active_version: Option<Arc<AtomicU64>>,
    version: u64,
}

impl CancellationToken {
    /// Creates a token that is never cancelled.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Returns `Some(())` while the token is active, `None` once cancelled.
    ///
    /// Shaped for `?` early returns.
    #[inline]
    pub fn check(&self) -> Option<()> {
        if self.is_cancelled() {
            None
        } else {
            Some(())
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.active_version {
            Some(active) => active.load(Ordering::Relaxed) != self.version,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_token_is_never_cancelled() {
        let token = CancellationToken::noop();
        assert!(token.check().is_some());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn bumping_the_tracker_cancels_older_tokens() {
        let tracker = VersionTracker::new();
        let version = tracker.next_version();
        let token = tracker.token_for_version(version);
        assert!(!token.is_cancelled());

        let newer = tracker.next_version();
        assert!(token.is_cancelled());
        assert!(tracker.token_for_version(newer).check().is_some());
    }

    #[test]
    fn current_token_follows_active_version() {
        let tracker = VersionTracker::new();
        let token = tracker.current_token();
        assert!(!token.is_cancelled());
        tracker.next_version();
        assert!(token.is_cancelled());
        assert!(!tracker.current_token().is_cancelled());
    }
}
