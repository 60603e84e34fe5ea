//! Index persistence: cache read/write operations.
//!
//! One record per root, stored flat in the cache directory. Records are
//! postcard-encoded and zstd-compressed, and written through a temporary
//! file that is atomically renamed into place so a concurrent reader never
//! sees a partial record.
//!
//! Caching is an optimization only. Every read failure is a miss and every
//! write failure is logged and swallowed.

use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;
use std::time::{SystemTime, UNIX_EPOCH};

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::root_key::RootKey;
use crate::types::Entry;

/// Cache format version - increment when changing the record layout.
pub const CACHE_FORMAT_VERSION: u32 = 1;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Record as read back from disk.
#[derive(Deserialize)]
struct CacheRecord {
    version: u32,
    root: String,
    written_at: u64,
    build_duration_secs: f64,
    entries: Vec<Entry>,
}

/// Borrowed twin of [`CacheRecord`] used for writing; field order must match.
#[derive(Serialize)]
struct CacheRecordRef<'a> {
    version: u32,
    root: &'a str,
    written_at: u64,
    build_duration_secs: f64,
    entries: &'a [Entry],
}

/// A fresh record loaded from the cache.
#[derive(Debug)]
pub struct CachedIndex {
    pub entries: Vec<Entry>,
    pub build_duration_secs: f64,
}

/// Flat, file-per-root cache of walk results.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Storage location of the record for `root`.
    pub fn record_path(&self, root: &RootKey) -> PathBuf {
        self.dir.join(format!("tree-index-{}.bin.zst", root_fingerprint(root)))
    }

    /// Whether a record for `root` exists and was modified within
    /// `max_age_hours`. Reads file metadata only; [`CacheStore::load`] may
    /// still reject the record.
    pub fn has_fresh_record(&self, root: &RootKey, max_age_hours: u64) -> bool {
        let metadata = fs::metadata(self.record_path(root));
        let Ok(modified) = metadata.and_then(|meta| meta.modified()) else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age.as_secs() <= max_age_hours.saturating_mul(SECS_PER_HOUR),
            // Modified in the future; let `load` judge it.
            Err(_) => true,
        }
    }

    /// Loads the record for `root` if it is no older than `max_age_hours`.
    pub fn load(&self, root: &RootKey, max_age_hours: u64) -> Option<CachedIndex> {
        self.load_at(root, max_age_hours, unix_now_secs())
    }

    fn load_at(&self, root: &RootKey, max_age_hours: u64, now: u64) -> Option<CachedIndex> {
        let path = self.record_path(root);
        let input = match File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                log::debug!("no index cache for {root}");
                return None;
            }
            Err(error) => {
                log::warn!("index cache read failed for {}: {error}", path.display());
                return None;
            }
        };

        let bytes = match zstd::decode_all(BufReader::new(input)) {
            Ok(bytes) => bytes,
            Err(error) => {
                log::warn!(
                    "index cache decompress failed for {}: {error}",
                    path.display()
                );
                return None;
            }
        };

        let record: CacheRecord = match postcard::from_bytes(&bytes) {
            Ok(record) => record,
            Err(error) => {
                log::warn!("index cache decode failed for {}: {error}", path.display());
                return None;
            }
        };

        if record.version != CACHE_FORMAT_VERSION {
            log::debug!(
                "index cache version mismatch: {} != {}",
                record.version,
                CACHE_FORMAT_VERSION
            );
            return None;
        }

        if record.root.to_lowercase() != root.folded() {
            log::debug!("index cache root mismatch: {:?} != {:?}", record.root, root.as_str());
            return None;
        }

        let age = now.saturating_sub(record.written_at);
        if age > max_age_hours.saturating_mul(SECS_PER_HOUR) {
            log::info!(
                "index cache stale for {root} (age={:.1}h), will rescan",
                age as f64 / SECS_PER_HOUR as f64
            );
            return None;
        }

        log::info!(
            "loaded index cache for {root} ({} entries, age={:.1}h)",
            record.entries.len(),
            age as f64 / SECS_PER_HOUR as f64
        );

        Some(CachedIndex {
            entries: record.entries,
            build_duration_secs: record.build_duration_secs,
        })
    }

    /// Persists `entries` for `root`. Returns whether the write succeeded.
    pub fn save(&self, root: &RootKey, entries: &[Entry], build_duration_secs: f64) -> bool {
        match self.write_record(root, entries, build_duration_secs, unix_now_secs()) {
            Ok(path) => {
                log::info!("index cached to {} ({} entries)", path.display(), entries.len());
                true
            }
            Err(error) => {
                log::warn!("failed to save index cache for {root}: {error}");
                false
            }
        }
    }

    /// Removes the record for `root`. Returns whether one existed.
    pub fn delete(&self, root: &RootKey) -> Result<bool> {
        let path = self.record_path(root);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("cleared index cache {}", path.display());
                Ok(true)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(IndexError::Io(error)),
        }
    }

    fn write_record(
        &self,
        root: &RootKey,
        entries: &[Entry],
        build_duration_secs: f64,
        written_at: u64,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|error| {
            IndexError::Internal(format!(
                "failed to create index cache directory {}: {error}",
                self.dir.display()
            ))
        })?;

        let record = CacheRecordRef {
            version: CACHE_FORMAT_VERSION,
            root: root.as_str(),
            written_at,
            build_duration_secs,
            entries,
        };

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let output = BufWriter::new(temp.as_file_mut());
            let mut encoder = zstd::Encoder::new(output, 6).map_err(|error| {
                IndexError::Internal(format!("failed to create zstd encoder: {error}"))
            })?;

            let threads = available_parallelism().map(|x| x.get() as u32).unwrap_or(4);
            encoder.multithread(threads).map_err(|error| {
                IndexError::Internal(format!("failed to enable multi-threaded zstd: {error}"))
            })?;

            postcard::to_io(&record, &mut encoder).map_err(|error| {
                IndexError::Serialization(format!("failed to encode index cache: {error}"))
            })?;
            encoder.finish()?.flush()?;
        }

        let path = self.record_path(root);
        temp.persist(&path).map_err(|error| {
            IndexError::Internal(format!(
                "failed to finalize index cache file {}: {}",
                path.display(),
                error.error
            ))
        })?;
        Ok(path)
    }
}

/// Stable storage name for a root: FNV-1a over the case-folded key.
fn root_fingerprint(root: &RootKey) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(root.folded().as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Returns the current Unix timestamp in seconds.
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn root(locator: &str) -> RootKey {
        RootKey::normalize(locator).unwrap()
    }

    fn sample_entries() -> Vec<Entry> {
        vec![
            Entry::new("docs".to_string(), "docs".to_string(), true, 0),
            Entry::new("Report.txt".to_string(), "docs/Report.txt".to_string(), false, 120),
            Entry::new("notes.txt".to_string(), "docs/notes.txt".to_string(), false, 40),
        ]
    }

    #[test]
    fn fingerprint_is_stable_and_case_insensitive() {
        let fp = root_fingerprint(&root("/srv/Share"));
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, root_fingerprint(&root("/SRV/share/")));
        assert_ne!(fp, root_fingerprint(&root("/srv/other")));
        // FNV-1a of the empty input is the offset basis.
        let mut hasher = FnvHasher::default();
        hasher.write(b"");
        assert_eq!(hasher.finish(), 0xcbf29ce484222325);
    }

    #[test]
    fn save_then_load_round_trips_entries_in_order() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path().join("cache"));
        let key = root("/srv/share");
        let entries = sample_entries();

        assert!(store.save(&key, &entries, 1.5));
        let loaded = store.load(&key, 24).expect("fresh record");
        assert_eq!(loaded.entries, entries);
        assert_eq!(loaded.build_duration_secs, 1.5);
    }

    #[test]
    fn differently_cased_root_finds_same_record() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        assert!(store.save(&root("/srv/Share"), &sample_entries(), 0.1));
        assert!(store.load(&root("/SRV/share/"), 24).is_some());
    }

    #[test]
    fn expired_record_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        let now = unix_now_secs();
        let written_at = now - 25 * SECS_PER_HOUR;
        store
            .write_record(&key, &sample_entries(), 1.0, written_at)
            .unwrap();

        assert!(store.load_at(&key, 24, now).is_none());
        assert!(store.load_at(&key, 26, now).is_some());
    }

    #[test]
    fn record_exactly_at_max_age_is_still_fresh() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        store.write_record(&key, &sample_entries(), 1.0, 1_000).unwrap();
        assert!(store.load_at(&key, 1, 1_000 + SECS_PER_HOUR).is_some());
        assert!(store.load_at(&key, 1, 1_001 + SECS_PER_HOUR).is_none());
    }

    #[test]
    fn fresh_record_check_uses_file_metadata() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        assert!(!store.has_fresh_record(&key, 24));
        assert!(store.save(&key, &sample_entries(), 1.0));
        assert!(store.has_fresh_record(&key, 24));
        assert!(store.has_fresh_record(&root("/SRV/Share"), 24));
        assert!(!store.has_fresh_record(&root("/srv/other"), 24));
    }

    #[test]
    fn missing_record_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        assert!(store.load(&root("/srv/share"), 24).is_none());
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        fs::write(store.record_path(&key), b"definitely not zstd").unwrap();
        assert!(store.load(&key, 24).is_none());
    }

    #[test]
    fn record_for_another_root_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        let other = root("/srv/other");
        store.write_record(&other, &sample_entries(), 1.0, unix_now_secs()).unwrap();
        // Simulate a fingerprint collision.
        fs::rename(store.record_path(&other), store.record_path(&key)).unwrap();
        assert!(store.load(&key, 24).is_none());
    }

    #[test]
    fn delete_reports_whether_record_existed() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(temp.path());
        let key = root("/srv/share");
        assert!(!store.delete(&key).unwrap());
        assert!(store.save(&key, &sample_entries(), 1.0));
        assert!(store.delete(&key).unwrap());
        assert!(store.load(&key, 24).is_none());
    }

    #[test]
    fn save_failure_is_swallowed() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"a file where the cache dir should be").unwrap();
        let store = CacheStore::new(blocker.join("cache"));
        assert!(!store.save(&root("/srv/share"), &sample_entries(), 1.0));
    }
}
