use super::{create_doc, open_store, read, sample_metadata, test_config};
use marksmith::metadata::FieldRule;
use marksmith::{AppendOptions, DocumentStore, ErrorKind, Metadata};
use serde_yaml::Value;
use std::fs;
use tempfile::TempDir;

fn with_body(store: &DocumentStore) -> std::path::PathBuf {
    let path = create_doc(store, "a.md");
    store
        .append_section("a.md", "Intro", "body text", &AppendOptions::default())
        .unwrap();
    path
}

fn body_of(content: &str) -> &str {
    let after_open = &content[4..];
    let close = after_open.find("\n---\n").unwrap();
    &after_open[close + 5..]
}

#[test]
fn test_get_metadata_returns_frontmatter() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    with_body(&store);

    let meta = store.get_metadata("a.md").unwrap();
    assert_eq!(meta.get("title"), Some(&Value::from("Report")));
    assert_eq!(meta.get("author"), Some(&Value::from("Ada")));
}

#[test]
fn test_document_without_frontmatter_has_empty_metadata() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    fs::write(
        store.dirs().drafts.join("plain.md"),
        "# Intro\n<!-- Section: Intro -->\ntext\n",
    )
    .unwrap();

    assert!(store.get_metadata("plain.md").unwrap().is_empty());
}

#[test]
fn test_update_metadata_keeps_body() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = with_body(&store);
    let before = read(&path);

    let mut meta = sample_metadata();
    meta.insert(Value::from("title"), Value::from("Renamed"));
    meta.insert(Value::from("tags"), Value::Sequence(vec![Value::from("a")]));
    store.update_metadata("a.md", &meta).unwrap();

    let after = read(&path);
    assert_eq!(body_of(&after), body_of(&before));
    let stored = store.get_metadata("a.md").unwrap();
    assert_eq!(stored.get("title"), Some(&Value::from("Renamed")));
    assert!(stored.contains_key("tags"));
}

#[test]
fn test_update_missing_required_field_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = with_body(&store);
    let before = read(&path);

    let mut meta = Metadata::new();
    meta.insert(Value::from("title"), Value::from("Only a title"));
    let err = store.update_metadata("a.md", &meta).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("Missing required metadata fields"));
    assert_eq!(read(&path), before);
}

#[test]
fn test_merge_metadata_overlays() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    with_body(&store);

    let mut updates = Metadata::new();
    updates.insert(Value::from("status"), Value::from("draft"));
    updates.insert(Value::from("author"), Value::from("Grace"));
    let merged = store.merge_metadata("a.md", &updates).unwrap();

    assert_eq!(merged.get("title"), Some(&Value::from("Report")));
    assert_eq!(merged.get("author"), Some(&Value::from("Grace")));
    assert_eq!(merged.get("status"), Some(&Value::from("draft")));
    assert_eq!(store.get_metadata("a.md").unwrap(), merged);
}

#[test]
fn test_configured_rules_apply_on_merge() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    let rule: FieldRule = serde_yaml::from_str("type: integer\nmin: 1").unwrap();
    config.metadata.rules.insert("version".to_string(), rule);
    let store = DocumentStore::open(dir.path(), config).unwrap();
    with_body(&store);

    let mut bad = Metadata::new();
    bad.insert(Value::from("version"), Value::from(0));
    let err = store.merge_metadata("a.md", &bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut wrong_type = Metadata::new();
    wrong_type.insert(Value::from("version"), Value::from("one"));
    assert!(store.merge_metadata("a.md", &wrong_type).is_err());

    let mut good = Metadata::new();
    good.insert(Value::from("version"), Value::from(2));
    store.merge_metadata("a.md", &good).unwrap();
    assert_eq!(
        store.get_metadata("a.md").unwrap().get("version"),
        Some(&Value::from(2))
    );
}
