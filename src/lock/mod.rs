//! Section locks
//!
//! Per-(document, section) advisory mutual exclusion through sidecar files,
//! plus the short per-document commit lock that serialises read-modify-write
//! cycles.

pub mod manager;
pub mod os;
pub mod record;

pub use manager::{CommitLock, LockManager, SectionLockGuard};
pub use record::{sidecar_path, LockError, LockRecord};
