//! Error types for the document store.
//!
//! Every public operation returns [`StoreError`]. Variants carry the context the
//! failing layer knows about (path, section, offending line) as typed fields so
//! callers can branch on them without parsing messages.

use crate::validate::Violation;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a document name was refused by the path validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    TooLong { len: usize, max: usize },
    PathTooLong { len: usize, max: usize },
    Separator,
    Traversal,
    ReservedName(String),
    ForbiddenChar(char),
    TrailingSpaceOrDot,
    /// Dot-prefixed names are reserved for lock files
    Hidden,
    OutsideRoot,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Empty => write!(f, "name is empty"),
            PathRejection::TooLong { len, max } => {
                write!(f, "name is {} characters, maximum is {}", len, max)
            }
            PathRejection::PathTooLong { len, max } => write!(
                f,
                "full path exceeds maximum length of {} characters ({})",
                max, len
            ),
            PathRejection::Separator => write!(f, "name contains a path separator"),
            PathRejection::Traversal => write!(f, "name is a directory traversal sequence"),
            PathRejection::ReservedName(name) => write!(f, "'{}' is a reserved device name", name),
            PathRejection::ForbiddenChar(c) => write!(f, "forbidden character {:?}", c),
            PathRejection::TrailingSpaceOrDot => write!(f, "name ends with a space or dot"),
            PathRejection::Hidden => write!(f, "name starts with a dot"),
            PathRejection::OutsideRoot => write!(f, "path resolves outside the document root"),
        }
    }
}

/// What kind of access failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    NotFound,
    AlreadyExists,
    ReadDenied,
    WriteDenied,
    NotAFile,
    TooLarge,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccessKind::NotFound => "File not found",
            AccessKind::AlreadyExists => "File already exists",
            AccessKind::ReadDenied => "No read permission",
            AccessKind::WriteDenied => "No write permission",
            AccessKind::NotAFile => "Not a regular file",
            AccessKind::TooLarge => "File exceeds the configured maximum size",
        };
        f.write_str(text)
    }
}

/// Coarse error classes, used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Access,
    Structural,
    SectionNotFound,
    Lock,
    Io,
    Config,
    Conversion,
    Precondition,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid filename '{name}': {reason}")]
    InvalidPath { name: String, reason: PathRejection },

    #[error("{0}")]
    Validation(String),

    #[error("{kind}: {path:?}")]
    Access { path: PathBuf, kind: AccessKind },

    #[error("{path:?} failed structural validation ({} violations)", .violations.len())]
    Structural {
        path: PathBuf,
        violations: Vec<Violation>,
    },

    #[error("Section '{section}' not found in document {path:?}")]
    SectionNotFound { path: PathBuf, section: String },

    #[error("Section '{section}' in {path:?} is locked{}", holder_suffix(.holder))]
    Lock {
        path: PathBuf,
        section: String,
        holder: Option<String>,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {path:?} as {encoding}")]
    Decode { path: PathBuf, encoding: String },

    #[error("Failed to encode text for {path:?} as {encoding}")]
    Encode { path: PathBuf, encoding: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversion failed ({status}): {stderr}")]
    Conversion { status: String, stderr: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),
}

fn holder_suffix(holder: &Option<String>) -> String {
    holder
        .as_ref()
        .map(|h| format!(" by {}", h))
        .unwrap_or_default()
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn access(path: impl AsRef<Path>, kind: AccessKind) -> Self {
        StoreError::Access {
            path: path.as_ref().to_path_buf(),
            kind,
        }
    }

    /// Map an io error onto the access taxonomy where one applies.
    pub fn from_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => StoreError::access(path, AccessKind::NotFound),
            io::ErrorKind::AlreadyExists => StoreError::access(path, AccessKind::AlreadyExists),
            io::ErrorKind::PermissionDenied => StoreError::access(path, AccessKind::WriteDenied),
            _ => StoreError::io(path, source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidPath { .. } | StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Metadata(_) => ErrorKind::Validation,
            StoreError::Access { .. } => ErrorKind::Access,
            StoreError::Structural { .. } => ErrorKind::Structural,
            StoreError::SectionNotFound { .. } => ErrorKind::SectionNotFound,
            StoreError::Lock { .. } => ErrorKind::Lock,
            StoreError::Io { .. } | StoreError::Decode { .. } | StoreError::Encode { .. } => {
                ErrorKind::Io
            }
            StoreError::Config(_) => ErrorKind::Config,
            StoreError::Conversion { .. } => ErrorKind::Conversion,
            StoreError::Precondition(_) => ErrorKind::Precondition,
        }
    }

    /// Lock contention and transient permission problems may clear on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Lock { .. } => true,
            StoreError::Access { kind, .. } => {
                matches!(kind, AccessKind::ReadDenied | AccessKind::WriteDenied)
            }
            _ => false,
        }
    }

    /// Structural violations, if this is a structural failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            StoreError::Structural { violations, .. } => violations,
            _ => &[],
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::Config(err.to_string())
    }
}
