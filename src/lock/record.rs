//! Lock sidecar records and the lock error type.

use crate::error::{AccessKind, StoreError};
use crate::types::OwnerId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Metadata persisted in a sidecar once its OS lock is held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Section title
    pub section: String,
    /// When the lock was taken
    pub timestamp: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// Document the section belongs to
    pub file: PathBuf,
    /// Owner id
    pub agent: OwnerId,
}

impl LockRecord {
    pub fn new(section: &str, file: &Path, agent: &OwnerId, ttl: Duration) -> Self {
        let timestamp = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Self {
            section: section.to_string(),
            timestamp,
            expires: timestamp
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            file: file.to_path_buf(),
            agent: agent.clone(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("section lock already held at {path:?}")]
    Held {
        path: PathBuf,
        record: Option<Box<LockRecord>>,
        record_error: Option<String>,
    },
    #[error("lock path is a symlink: {path:?}")]
    Symlink { path: PathBuf },
    #[error("lock metadata corrupted at {path:?}: {source}")]
    MetadataCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("timed out after {waited_ms}ms waiting for {path:?}")]
    Timeout { path: PathBuf, waited_ms: u64 },
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        LockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Owner of a live competing lock, when known.
    pub fn holder(&self) -> Option<&OwnerId> {
        match self {
            LockError::Held {
                record: Some(record),
                ..
            } => Some(&record.agent),
            _ => None,
        }
    }

    /// Attach the document and section this lock protects.
    pub fn into_store_error(self, document: &Path, section: &str) -> StoreError {
        let holder = self.holder().map(|owner| owner.to_string());
        match self {
            LockError::Held { .. } | LockError::Timeout { .. } => StoreError::Lock {
                path: document.to_path_buf(),
                section: section.to_string(),
                holder,
            },
            LockError::Symlink { path } => StoreError::access(path, AccessKind::NotAFile),
            LockError::MetadataCorrupt { path, source } => {
                StoreError::io(path, io::Error::new(io::ErrorKind::InvalidData, source))
            }
            LockError::Io { path, source } => StoreError::io(path, source),
        }
    }
}

/// Replace characters that cannot appear in a file name.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `.<title>.lock`, next to the document.
pub fn sidecar_path(document: &Path, section: &str) -> PathBuf {
    let dir = document.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(".{}.lock", sanitize_title(section)))
}

/// `.<file name>.write`, the per-document commit lock.
pub fn commit_lock_path(document: &Path) -> PathBuf {
    let dir = document.parent().unwrap_or_else(|| Path::new("."));
    let name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{}.write", name))
}

pub fn is_sidecar_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".lock") && name.len() > ".lock".len() + 1
}

/// Record stored in an open sidecar. `Ok(None)` for an empty file.
pub fn read_record(file: &mut File, path: &Path) -> Result<Option<LockRecord>, LockError> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut text))
        .map_err(|e| LockError::io(path, e))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| LockError::MetadataCorrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Overwrite an open sidecar with `record` and flush it to disk.
pub fn write_record(file: &mut File, path: &Path, record: &LockRecord) -> Result<(), LockError> {
    let json = serde_json::to_vec_pretty(record).map_err(|source| LockError::MetadataCorrupt {
        path: path.to_path_buf(),
        source,
    })?;
    file.set_len(0)
        .and_then(|_| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(&json))
        .and_then(|_| file.sync_all())
        .map_err(|e| LockError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_naming() {
        let doc = Path::new("/data/drafts/a.md");
        assert_eq!(
            sidecar_path(doc, "Intro"),
            PathBuf::from("/data/drafts/.Intro.lock")
        );
        assert_eq!(
            sidecar_path(doc, "a/b: c?"),
            PathBuf::from("/data/drafts/.a_b_ c_.lock")
        );
        assert_eq!(
            commit_lock_path(doc),
            PathBuf::from("/data/drafts/.a.md.write")
        );
        assert!(is_sidecar_name(".Intro.lock"));
        assert!(!is_sidecar_name(".a.md.write"));
        assert!(!is_sidecar_name("notes.lock"));
    }

    #[test]
    fn test_record_json_shape() {
        let record = LockRecord::new(
            "Intro",
            Path::new("a.md"),
            &OwnerId::new("agent-1"),
            Duration::from_secs(60),
        );
        let value = serde_json::to_value(&record).unwrap();
        for key in ["section", "timestamp", "expires", "file", "agent"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["agent"], "agent-1");
        assert!(!record.is_expired());
        assert!(record.is_expired_at(record.expires));
    }

    #[test]
    fn test_read_write_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".Intro.lock");
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        assert!(read_record(&mut file, &path).unwrap().is_none());

        let record = LockRecord::new("Intro", &path, &OwnerId::new("a"), Duration::from_secs(5));
        write_record(&mut file, &path, &record).unwrap();
        assert_eq!(read_record(&mut file, &path).unwrap(), Some(record));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            read_record(&mut file, &path),
            Err(LockError::MetadataCorrupt { .. })
        ));
    }
}
