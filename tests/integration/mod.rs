//! Integration tests for the marksmith document store

mod cli;
mod document_ops;
mod locking;
mod metadata;
mod validation;
mod versions;

use marksmith::{DocumentStore, Metadata, StoreConfig};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test config rooted in `dir`, with lazy reclamation off so sidecar counts
/// are deterministic.
pub fn test_config(dir: &TempDir) -> StoreConfig {
    let mut config = StoreConfig::rooted_at(dir.path());
    config.locking.reclaim_probability = 0.0;
    config
}

pub fn open_store(dir: &TempDir) -> DocumentStore {
    DocumentStore::open(dir.path(), test_config(dir))
        .unwrap()
        .with_owner("tester")
}

pub fn sample_metadata() -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(Value::from("title"), Value::from("Report"));
    meta.insert(Value::from("author"), Value::from("Ada"));
    meta.insert(Value::from("date"), Value::from("2024-01-01"));
    meta
}

/// Create `name` with the sample frontmatter and return its path.
pub fn create_doc(store: &DocumentStore, name: &str) -> PathBuf {
    store.create_document(name, &sample_metadata()).unwrap()
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
