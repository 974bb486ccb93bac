use super::{create_doc, open_store, read, test_config};
use marksmith::{AppendOptions, DocumentStore, ErrorKind, ViolationKind};
use std::fs;
use tempfile::TempDir;

fn write_raw(store: &DocumentStore, name: &str, content: &str) {
    fs::write(store.dirs().drafts.join(name), content).unwrap();
}

#[test]
fn test_header_jump_reported_with_line() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    write_raw(
        &store,
        "jump.md",
        "# A\n<!-- Section: A -->\ntext\n### C\n<!-- Section: C -->\nmore\n",
    );

    let report = store.validate_document("jump.md").unwrap();

    assert!(!report.is_valid());
    let jump = report
        .errors()
        .find(|v| v.kind == ViolationKind::HeaderLevelJump)
        .unwrap();
    assert_eq!(jump.line, 4);
    assert!(jump.message.contains("from 1 to 3"));
}

#[test]
fn test_duplicate_marker_reported() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    write_raw(
        &store,
        "dup.md",
        "# X\n<!-- Section: X -->\none\n# X\n<!-- Section: X -->\ntwo\n",
    );

    let report = store.validate_document("dup.md").unwrap();

    assert!(!report.is_valid());
    assert!(report
        .errors()
        .any(|v| v.kind == ViolationKind::DuplicateMarker
            && v.message == "Duplicate section marker found: 'X'"));
}

#[test]
fn test_headers_in_code_fences_ignored() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    write_raw(
        &store,
        "fenced.md",
        "# A\n<!-- Section: A -->\n```bash\n### not a header\n```\n",
    );

    assert!(store.validate_document("fenced.md").unwrap().is_valid());
}

#[test]
fn test_quality_findings_warn_by_default() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");

    store
        .append_section(
            "a.md",
            "Intro",
            "See ![diagram](missing.png)",
            &AppendOptions::default(),
        )
        .unwrap();

    let report = store.validate_document("a.md").unwrap();
    assert!(report
        .errors()
        .any(|v| v.kind == ViolationKind::BrokenLink));
}

#[test]
fn test_quality_on_write_blocks() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.validation.quality_on_write = true;
    let store = DocumentStore::open(dir.path(), config).unwrap();
    let path = create_doc(&store, "a.md");
    let before = read(&path);

    let err = store
        .append_section(
            "a.md",
            "Intro",
            "See ![diagram](missing.png)",
            &AppendOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(err
        .violations()
        .iter()
        .any(|v| v.kind == ViolationKind::BrokenLink));
    assert_eq!(read(&path), before);
}

#[test]
fn test_existing_local_links_pass() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    fs::write(store.dirs().drafts.join("diagram.png"), b"png").unwrap();

    store
        .append_section(
            "a.md",
            "Intro",
            "See ![diagram](diagram.png) and [site](https://example.com)",
            &AppendOptions::default(),
        )
        .unwrap();

    let report = store.validate_document("a.md").unwrap();
    assert!(report
        .violations
        .iter()
        .all(|v| v.kind != ViolationKind::BrokenLink));
}

#[test]
fn test_empty_document_is_invalid() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    write_raw(&store, "empty.md", "");

    let report = store.validate_document("empty.md").unwrap();
    assert!(!report.is_valid());
    assert!(report
        .errors()
        .any(|v| v.kind == ViolationKind::EmptyDocument));
}
