//! Root locator normalization.
//!
//! A root locator is whatever the client typed: a local path, a mounted
//! share, a `file://` URI, with either slash style and any number of
//! trailing separators. [`RootKey::normalize`] turns it into a stable key
//! without touching the filesystem.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use crate::error::{IndexError, Result};

const FILE_URI_PREFIX: &str = "file://";

/// Normalized identity of an indexed tree root.
///
/// The original-case path is kept for filesystem access. Equality and
/// hashing use the case-folded form, matching shared-filesystem semantics.
#[derive(Debug, Clone)]
pub struct RootKey {
    path: String,
    folded: String,
}

impl RootKey {
    /// Normalizes a root locator.
    pub fn normalize(locator: &str) -> Result<Self> {
        let trimmed = locator.trim();
        let stripped = trimmed.strip_prefix(FILE_URI_PREFIX).unwrap_or(trimmed);
        if stripped.is_empty() {
            return Err(IndexError::InvalidInput(
                "root locator must not be empty".to_string(),
            ));
        }

        let separated = stripped.replace('/', MAIN_SEPARATOR_STR);
        let mut base = separated.trim_end_matches(MAIN_SEPARATOR);
        if base.is_empty() {
            // Only separators: keep them so the filesystem root survives.
            base = separated.as_str();
        }

        let path = if cfg!(windows) {
            let unc = format!(
                "{MAIN_SEPARATOR}{MAIN_SEPARATOR}{}",
                base.trim_start_matches(MAIN_SEPARATOR)
            );
            lexical_normalize(&unc)
        } else {
            lexical_normalize(base)
        };

        Ok(Self::from_normalized(path))
    }

    fn from_normalized(path: String) -> Self {
        let folded = path.to_lowercase();
        Self { path, folded }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    /// Case-folded comparison form.
    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for RootKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for RootKey {}

impl Hash for RootKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Resolves `.` and `..` and collapses separator runs, purely on the string.
///
/// Leading separators follow the platform convention: two are kept on
/// Windows (UNC) and on POSIX when exactly two are given; otherwise one.
fn lexical_normalize(path: &str) -> String {
    let leading = path.chars().take_while(|c| *c == MAIN_SEPARATOR).count();
    let prefix_len = if cfg!(windows) {
        leading.min(2)
    } else if leading == 2 {
        2
    } else {
        leading.min(1)
    };
    // `\\server\share` cannot be climbed out of with `..`.
    let pinned = if cfg!(windows) && prefix_len == 2 { 2 } else { 0 };

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(MAIN_SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.len() > pinned && parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if prefix_len == 0 {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let mut normalized = MAIN_SEPARATOR_STR.repeat(prefix_len);
    normalized.push_str(&parts.join(MAIN_SEPARATOR_STR));
    if normalized.is_empty() {
        normalized.push('.');
    }
    normalized
}
