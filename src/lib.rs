//! Marksmith: Section-Addressable Markdown Store
//!
//! Documents are Markdown files in a drafts directory. Sections are addressed
//! by a hidden marker comment under their header, so callers edit by title
//! rather than by line. Every write goes through a validator and an atomic
//! replace; concurrent writers coordinate through per-section sidecar locks.

pub mod access;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod fsio;
pub mod lock;
pub mod logging;
pub mod markdown;
pub mod metadata;
pub mod tooling;
pub mod types;
pub mod validate;
pub mod version;

pub use config::{ConfigLoader, StoreConfig};
pub use convert::OutputFormat;
pub use document::{
    AppendOptions, DocumentInfo, DocumentStore, EditOptions, LockOptions, ReplaceOptions,
    StreamOptions, StreamOutcome, VersionInfo,
};
pub use error::{AccessKind, ErrorKind, PathRejection, StoreError};
pub use lock::{LockError, LockRecord};
pub use markdown::section::Section;
pub use types::{Metadata, OwnerId};
pub use validate::{Severity, ValidationReport, Violation, ViolationKind};
