//! File fingerprints
//!
//! A fingerprint records a file's modification time, size and content hash.
//! Testing a fingerprint compares the cheap metadata first and only hashes
//! the contents when the metadata changed.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NodeResult;
use crate::hash::hash_file;

/// Modification time, size and content hash of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Milliseconds since the epoch
    time: i64,
    size: i64,
    hash: u64,
}

/// Outcome of comparing a stored fingerprint with the file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintTest {
    /// Metadata matches; contents were not read
    Unchanged,
    /// Metadata changed but the contents hash the same
    Touched(FileFingerprint),
    /// Contents changed; the file must be reindexed
    Changed(FileFingerprint),
}

impl FingerprintTest {
    pub fn is_changed(&self) -> bool {
        matches!(self, FingerprintTest::Changed(_))
    }

    /// The fingerprint to store, when it differs from the old one
    pub fn new_fingerprint(&self) -> Option<&FileFingerprint> {
        match self {
            FingerprintTest::Unchanged => None,
            FingerprintTest::Touched(f) | FingerprintTest::Changed(f) => Some(f),
        }
    }
}

impl FileFingerprint {
    pub const fn new(time: i64, size: i64, hash: u64) -> Self {
        Self { time, size, hash }
    }

    /// Fingerprint of a file that does not exist
    pub const fn missing() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_missing(&self) -> bool {
        *self == Self::missing()
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Computes the fingerprint of `path`. A missing file yields
    /// [`FileFingerprint::missing`].
    pub fn of_file(path: &Path) -> NodeResult<Self> {
        match Self::metadata_of(path)? {
            Some((time, size)) => Ok(Self::new(time, size, Self::hash_contents(path)?)),
            None => Ok(Self::missing()),
        }
    }

    /// Compares this fingerprint with the current state of `path`.
    pub fn test(&self, path: &Path) -> NodeResult<FingerprintTest> {
        let Some((time, size)) = Self::metadata_of(path)? else {
            return Ok(if self.is_missing() {
                FingerprintTest::Unchanged
            } else {
                FingerprintTest::Changed(Self::missing())
            });
        };
        if time == self.time && size == self.size {
            return Ok(FingerprintTest::Unchanged);
        }

        let current = Self::new(time, size, Self::hash_contents(path)?);
        if current.hash == self.hash && size == self.size {
            Ok(FingerprintTest::Touched(current))
        } else {
            Ok(FingerprintTest::Changed(current))
        }
    }

    fn metadata_of(path: &Path) -> NodeResult<Option<(i64, i64)>> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);
        Ok(Some((modified.timestamp_millis(), size)))
    }

    fn hash_contents(path: &Path) -> NodeResult<u64> {
        Ok(hash_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fingerprint_of_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "class A {{}}").unwrap();
        let fingerprint = FileFingerprint::of_file(file.path()).unwrap();
        assert_eq!(fingerprint.size(), 10);
        assert_eq!(fingerprint.hash(), crate::hash::hash("class A {}"));
        assert!(!fingerprint.is_missing());
    }

    #[test]
    fn test_unchanged_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "same").unwrap();
        let fingerprint = FileFingerprint::of_file(file.path()).unwrap();
        assert_eq!(
            fingerprint.test(file.path()).unwrap(),
            FingerprintTest::Unchanged
        );
    }

    #[test]
    fn test_changed_contents() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "before").unwrap();
        let stale = FileFingerprint::new(0, 6, 1);
        let result = stale.test(file.path()).unwrap();
        assert!(result.is_changed());
        assert_eq!(
            result.new_fingerprint().unwrap().hash(),
            crate::hash::hash("before")
        );
    }

    #[test]
    fn test_touched_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "body").unwrap();
        let current = FileFingerprint::of_file(file.path()).unwrap();
        let older = FileFingerprint::new(current.time() - 1000, current.size(), current.hash());
        let result = older.test(file.path()).unwrap();
        assert_eq!(result, FingerprintTest::Touched(current));
        assert!(!result.is_changed());
    }

    #[test]
    fn test_binary_rewrite_is_changed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xca, 0xfe, 0xba, 0xbe, 0x80]).unwrap();
        let first = FileFingerprint::of_file(file.path()).unwrap();
        let older = FileFingerprint::new(first.time() - 1000, first.size(), first.hash());

        fs::write(file.path(), [0xca, 0xfe, 0xba, 0xbe, 0x81]).unwrap();
        let result = older.test(file.path()).unwrap();
        assert!(result.is_changed());
        assert_ne!(result.new_fingerprint().unwrap().hash(), first.hash());
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/nonexistent/nodedb/fingerprint");
        assert!(FileFingerprint::of_file(path).unwrap().is_missing());
        assert_eq!(
            FileFingerprint::missing().test(path).unwrap(),
            FingerprintTest::Unchanged
        );
        assert!(FileFingerprint::new(1, 2, 3).test(path).unwrap().is_changed());
    }
}
