//! Core types shared across the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered frontmatter mapping.
pub type Metadata = serde_yaml::Mapping;

/// Deepest header level Markdown allows.
pub const MAX_HEADER_LEVEL: usize = 6;

/// Identifies whoever holds a section lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<user>-<pid>` for callers that do not name themselves.
    pub fn for_process() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "agent".to_string());
        Self(format!("{}-{}", user, std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
