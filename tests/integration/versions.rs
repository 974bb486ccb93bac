use super::{create_doc, open_store, read, sample_metadata};
use marksmith::{AppendOptions, ErrorKind};
use std::fs;
use serde_yaml::Value;
use tempfile::TempDir;

#[test]
fn test_successive_versions_without_version_field() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = create_doc(&store, "a.md");
    store
        .append_section("a.md", "Intro", "hello", &AppendOptions::default())
        .unwrap();
    let original = read(&source);

    let first = store.save_version("a.md").unwrap();
    let second = store.save_version("a.md").unwrap();

    assert!(first.ends_with("a_v1.md"));
    assert!(second.ends_with("a_v2.md"));
    assert_eq!(read(&first), original);
    assert_eq!(read(&source), original);

    let numbers: Vec<u64> = store
        .list_versions("a.md")
        .unwrap()
        .into_iter()
        .map(|v| v.number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn test_version_field_is_bumped_in_source() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut meta = sample_metadata();
    meta.insert(Value::from("version"), Value::from(3));
    store.create_document("a.md", &meta).unwrap();
    store
        .append_section("a.md", "Intro", "hello", &AppendOptions::default())
        .unwrap();

    let snapshot = store.save_version("a.md").unwrap();

    assert!(snapshot.ends_with("a_v4.md"));
    assert_eq!(
        store.get_metadata("a.md").unwrap().get("version"),
        Some(&Value::from(4))
    );
    assert_eq!(
        store.get_metadata("a_v4.md").unwrap().get("version"),
        Some(&Value::from(3))
    );
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "hello\n");
}

#[test]
fn test_snapshots_are_independent_documents() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    store
        .append_section("a.md", "Intro", "v1 text", &AppendOptions::default())
        .unwrap();
    store.save_version("a.md").unwrap();

    store
        .edit_section("a.md", "Intro", "v2 text", &Default::default())
        .unwrap();

    assert_eq!(store.get_section("a_v1.md", "Intro").unwrap(), "v1 text\n");
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "v2 text\n");
}

#[test]
fn test_list_versions_empty() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");

    assert!(store.list_versions("a.md").unwrap().is_empty());
}

#[test]
fn test_rejected_version_bump_leaves_no_snapshot() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = store.dirs().drafts.join("b.md");
    let original = "---\nversion: 1\n---\n## A\n<!-- Section: A -->\nbody\n";
    fs::write(&source, original).unwrap();

    let err = store.save_version("b.md").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(!store.dirs().drafts.join("b_v2.md").exists());
    assert!(store.list_versions("b.md").unwrap().is_empty());
    assert_eq!(read(&source), original);
}
