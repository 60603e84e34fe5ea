//! Depth-first tree walking over a [`TreeSource`].
//!
//! The walk uses an explicit stack of open directories instead of recursion,
//! so pathologically deep trees cannot exhaust the call stack. Entries come
//! out in pre-order: a directory is yielded right before its children.
//!
//! Failure policy:
//! - a child that cannot be classified is skipped and counted
//! - a directory that cannot be opened has its subtree skipped and is counted
//! - only the root failing to open is fatal ([`TreeWalker::open`])

use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use crate::cancel::CancellationToken;
use crate::source::{ChildEntry, TreeSource};
use crate::types::Entry;

/// A directory whose children are being yielded.
struct DirFrame {
    path: PathBuf,
    relative_prefix: String,
    children: vec::IntoIter<io::Result<ChildEntry>>,
}

/// Iterator over every entry below a root.
///
/// Symlinks are never followed: [`TreeSource`] classifies them by the link,
/// so they are yielded as non-directories and not descended into.
pub struct TreeWalker<'a> {
    source: &'a dyn TreeSource,
    token: CancellationToken,
    stack: Vec<DirFrame>,
    errors: usize,
    cancelled: bool,
}

impl<'a> TreeWalker<'a> {
    /// Opens the root directory.
    ///
    /// Fails only if the root itself cannot be enumerated. A token that is
    /// already cancelled yields an empty, cancelled walk.
    pub fn open(
        source: &'a dyn TreeSource,
        root: &Path,
        token: CancellationToken,
    ) -> io::Result<Self> {
        let mut walker = Self {
            source,
            token,
            stack: Vec::new(),
            errors: 0,
            cancelled: false,
        };
        if walker.token.check().is_none() {
            walker.cancelled = true;
            return Ok(walker);
        }
        let children = source.read_dir(root)?;
        walker.stack.push(DirFrame {
            path: root.to_path_buf(),
            relative_prefix: String::new(),
            children: children.into_iter(),
        });
        Ok(walker)
    }

    /// Per-entry and per-subtree failures so far.
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Whether the walk stopped because its token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn descend(&mut self, path: PathBuf, relative_prefix: String) {
        if self.token.check().is_none() {
            self.cancelled = true;
            self.stack.clear();
            return;
        }
        match self.source.read_dir(&path) {
            Ok(children) => self.stack.push(DirFrame {
                path,
                relative_prefix,
                children: children.into_iter(),
            }),
            Err(error) => {
                self.errors += 1;
                log::debug!("skipping unreadable directory {}: {error}", path.display());
            }
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            let child = match child {
                Ok(child) => child,
                Err(error) => {
                    self.errors += 1;
                    log::debug!(
                        "skipping unreadable entry in {}: {error}",
                        frame.path.display()
                    );
                    continue;
                }
            };

            let relative_path = if frame.relative_prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{}/{}", frame.relative_prefix, child.name)
            };
            let child_path = frame.path.join(&child.file_name);
            let entry = Entry::new(child.name, relative_path, child.is_dir, child.size);
            if entry.is_dir {
                self.descend(child_path, entry.relative_path.clone());
            }
            return Some(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use tempfile::TempDir;

    use super::*;
    use crate::cancel::VersionTracker;
    use crate::source::testing::ScriptedSource;
    use crate::source::LocalFileSystem;

    fn paths(walker: TreeWalker<'_>) -> Vec<String> {
        let mut paths: Vec<String> = walker.map(|entry| entry.relative_path).collect();
        paths.sort();
        paths
    }

    #[test]
    fn walk_empty_directory() {
        let temp = TempDir::new().unwrap();
        let walker = TreeWalker::open(&LocalFileSystem, temp.path(), CancellationToken::noop())
            .expect("open root");
        assert!(paths(walker).is_empty());
    }

    #[test]
    fn walk_with_subdirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("aaa/deep")).unwrap();
        fs::create_dir(temp.path().join("bbb")).unwrap();
        File::create(temp.path().join("aaa/file.txt")).unwrap();
        File::create(temp.path().join("aaa/deep/leaf.txt")).unwrap();

        let walker =
            TreeWalker::open(&LocalFileSystem, temp.path(), CancellationToken::noop()).unwrap();
        assert_eq!(
            paths(walker),
            vec!["aaa", "aaa/deep", "aaa/deep/leaf.txt", "aaa/file.txt", "bbb"]
        );
    }

    #[test]
    fn directories_precede_their_children() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        File::create(temp.path().join("a/b/c/d.txt")).unwrap();

        let walker =
            TreeWalker::open(&LocalFileSystem, temp.path(), CancellationToken::noop()).unwrap();
        let order: Vec<String> = walker.map(|entry| entry.relative_path).collect();
        assert_eq!(order, vec!["a", "a/b", "a/b/c", "a/b/c/d.txt"]);
    }

    #[test]
    fn unreadable_subtree_is_skipped_and_counted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("locked")).unwrap();
        File::create(temp.path().join("locked/secret.txt")).unwrap();
        File::create(temp.path().join("open.txt")).unwrap();

        let source = ScriptedSource::new().unreadable(temp.path().join("locked"));
        let mut walker =
            TreeWalker::open(&source, temp.path(), CancellationToken::noop()).unwrap();
        let mut seen: Vec<String> = walker.by_ref().map(|entry| entry.relative_path).collect();
        seen.sort();

        // The directory itself is listed by its parent; only its contents vanish.
        assert_eq!(seen, vec!["locked", "open.txt"]);
        assert_eq!(walker.errors(), 1);
    }

    #[test]
    fn broken_entry_is_skipped_and_counted() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("good.txt")).unwrap();
        File::create(temp.path().join("bad.txt")).unwrap();

        let source = ScriptedSource::new().broken("bad.txt");
        let mut walker =
            TreeWalker::open(&source, temp.path(), CancellationToken::noop()).unwrap();
        let seen: Vec<String> = walker.by_ref().map(|entry| entry.relative_path).collect();
        assert_eq!(seen, vec!["good.txt"]);
        assert_eq!(walker.errors(), 1);
    }

    #[test]
    fn missing_root_fails_to_open() {
        let temp = TempDir::new().unwrap();
        let result = TreeWalker::open(
            &LocalFileSystem,
            &temp.path().join("missing"),
            CancellationToken::noop(),
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_not_followed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("dir/loop")).unwrap();

        let walker =
            TreeWalker::open(&LocalFileSystem, temp.path(), CancellationToken::noop()).unwrap();
        let entries: Vec<Entry> = walker.collect();
        assert_eq!(entries.len(), 2);
        let link = entries.iter().find(|entry| entry.name == "loop").unwrap();
        assert!(!link.is_dir);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_directory_is_descended() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let raw = temp.path().join(OsStr::from_bytes(b"caf\xe9"));
        if fs::create_dir(&raw).is_err() {
            // Some filesystems refuse names that are not valid UTF-8.
            return;
        }
        File::create(raw.join("inside.txt")).unwrap();

        let mut walker =
            TreeWalker::open(&LocalFileSystem, temp.path(), CancellationToken::noop()).unwrap();
        let seen: Vec<String> = walker.by_ref().map(|entry| entry.relative_path).collect();
        assert_eq!(seen, vec!["caf\u{fffd}", "caf\u{fffd}/inside.txt"]);
        assert_eq!(walker.errors(), 0);
    }

    #[test]
    fn cancelled_token_stops_at_next_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        File::create(temp.path().join("a/b/c.txt")).unwrap();

        let tracker = VersionTracker::new();
        let version = tracker.next_version();
        let mut walker = TreeWalker::open(
            &LocalFileSystem,
            temp.path(),
            tracker.token_for_version(version),
        )
        .unwrap();
        tracker.next_version();

        let seen: Vec<String> = walker.by_ref().map(|entry| entry.relative_path).collect();
        assert_eq!(seen, vec!["a"]);
        assert!(walker.is_cancelled());
    }

    #[test]
    fn pre_cancelled_walk_is_empty() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("file.txt")).unwrap();

        let tracker = VersionTracker::new();
        let token = tracker.current_token();
        tracker.next_version();

        let mut walker = TreeWalker::open(&LocalFileSystem, temp.path(), token).unwrap();
        assert!(walker.next().is_none());
        assert!(walker.is_cancelled());
    }
}
