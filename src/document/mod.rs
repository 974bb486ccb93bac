//! Document operations
//!
//! Every mutation follows one path: resolve the name, take the section lock
//! when asked to, take the document's commit lock, read, transform in memory,
//! validate, replace the file atomically, release both locks. A failure at any
//! step leaves the file as it was.

mod metadata;
mod ops;
pub mod options;
mod store;
pub mod transform;

pub use ops::StreamOutcome;
pub use options::{
    AppendOptions, DocumentInfo, EditOptions, LockOptions, ReplaceOptions, StreamOptions,
    VersionInfo,
};
pub use store::DocumentStore;
