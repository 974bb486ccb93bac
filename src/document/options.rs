//! Per-operation option structs and listing types.

use crate::fsio::ErrorPolicy;
use crate::types::OwnerId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Section locking for a single mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Hold the section lock for the duration of the call. Default: true.
    pub lock: bool,
    /// Lock lifetime. Default: `locking.ttl_secs`.
    pub ttl: Option<Duration>,
    /// Recorded lock owner. Default: the store's owner.
    pub owner: Option<OwnerId>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lock: true,
            ttl: None,
            owner: None,
        }
    }
}

impl LockOptions {
    pub fn unlocked() -> Self {
        Self {
            lock: false,
            ..Self::default()
        }
    }
}

/// Options for `append_section`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Header level 1..=6. Default: one deeper than the header preceding the
    /// insertion point, or 1.
    pub level: Option<usize>,
    /// Insert directly after this section instead of at the end.
    pub insert_after: Option<String>,
    /// Append to the body of an existing section instead of failing.
    pub allow_append: bool,
    pub lock: LockOptions,
}

/// Options for `edit_section`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOptions {
    pub lock: LockOptions,
}

/// Options for `search_and_replace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Treat the search text as a regular expression; `$1`-style references in
    /// the replacement are expanded. Default: false (literal on both sides).
    pub regex: bool,
    /// Default: true.
    pub case_sensitive: bool,
    /// Restrict replacement to this section's body. Default: whole document.
    pub section: Option<String>,
    /// Section locking, applied only when `section` is set.
    pub lock: LockOptions,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            regex: false,
            case_sensitive: true,
            section: None,
            lock: LockOptions::default(),
        }
    }
}

/// Options for `stream_append_section`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Default: `stream.chunk_size`.
    pub chunk_size: Option<usize>,
    /// Default: `stream.error_policy`.
    pub error_policy: Option<ErrorPolicy>,
    pub lock: LockOptions,
}

/// One markdown file in the drafts directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// One snapshot created by `save_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub number: u64,
    pub path: PathBuf,
}
