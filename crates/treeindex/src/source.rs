//! Directory enumeration seam.
//!
//! The engine never calls `std::fs` directly for walking; it goes through a
//! [`TreeSource`] so that mounted shares, local disks and test doubles are
//! interchangeable.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

/// A classified child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Display name; lossy when the raw name is not valid UTF-8.
    pub name: String,
    /// Raw name, used to build the child's path.
    pub file_name: OsString,
    /// Classified by the link itself; a symlink to a directory is not a directory.
    pub is_dir: bool,
    /// 0 when the size could not be read.
    pub size: u64,
}

/// Directory enumeration with symlink-aware classification.
pub trait TreeSource: Send + Sync {
    /// Lists the children of `dir`.
    ///
    /// The outer error means the directory itself could not be opened. An
    /// inner error means one child could not be read or classified.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<io::Result<ChildEntry>>>;

    /// Checks that `dir` can be opened, without listing it.
    fn check_access(&self, dir: &Path) -> io::Result<()> {
        self.read_dir(dir).map(|_| ())
    }
}

/// [`TreeSource`] backed by the local filesystem, including mounted shares.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl TreeSource for LocalFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<io::Result<ChildEntry>>> {
        let children = fs::read_dir(dir)?
            .map(|entry| {
                let entry = entry?;
                // DirEntry::file_type does not traverse symlinks.
                let file_type = entry.file_type()?;
                let is_dir = file_type.is_dir();
                let size = if is_dir {
                    0
                } else {
                    entry.metadata().map(|metadata| metadata.len()).unwrap_or(0)
                };
                let file_name = entry.file_name();
                Ok(ChildEntry {
                    name: file_name.to_string_lossy().into_owned(),
                    file_name,
                    is_dir,
                    size,
                })
            })
            .collect();
        Ok(children)
    }

    fn check_access(&self, dir: &Path) -> io::Result<()> {
        fs::read_dir(dir).map(|_| ())
    }
}


#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn sorted_children(dir: &Path) -> Vec<ChildEntry> {
        let mut children: Vec<ChildEntry> = LocalFileSystem
            .read_dir(dir)
            .expect("read dir")
            .into_iter()
            .map(|child| child.expect("child"))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    #[test]
    fn classifies_files_and_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("docs")).unwrap();
        let mut file = File::create(temp.path().join("a.txt")).unwrap();
        file.write_all(b"hello").unwrap();

        let children = sorted_children(temp.path());
        assert_eq!(
            children,
            vec![
                ChildEntry {
                    name: "a.txt".to_string(),
                    file_name: "a.txt".into(),
                    is_dir: false,
                    size: 5,
                },
                ChildEntry {
                    name: "docs".to_string(),
                    file_name: "docs".into(),
                    is_dir: true,
                    size: 0,
                },
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

        let children = sorted_children(temp.path());
        let link = children.iter().find(|child| child.name == "link").unwrap();
        assert!(!link.is_dir);
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let temp = TempDir::new().unwrap();
        assert!(LocalFileSystem.read_dir(&temp.path().join("nope")).is_err());
        assert!(LocalFileSystem.check_access(&temp.path().join("nope")).is_err());
        assert!(LocalFileSystem.check_access(temp.path()).is_ok());
    }
}
