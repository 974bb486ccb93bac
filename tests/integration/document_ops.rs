use super::{create_doc, open_store, read};
use marksmith::{
    AccessKind, AppendOptions, EditOptions, ErrorKind, ReplaceOptions, StoreError, StreamOptions,
};
use std::fs;
use std::io::Cursor;
use std::thread;
use tempfile::TempDir;

fn append(store: &marksmith::DocumentStore, name: &str, title: &str, body: &str) {
    store
        .append_section(name, title, body, &AppendOptions::default())
        .unwrap();
}

#[test]
fn test_append_then_get_section() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");

    append(&store, "a.md", "Intro", "hello");

    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "hello\n");
    assert!(store.section_exists("a.md", "Intro").unwrap());
    assert!(!store.section_exists("a.md", "Outro").unwrap());
}

#[test]
fn test_name_without_extension_gets_default() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = create_doc(&store, "report");

    assert!(path.ends_with("report.md"));
    append(&store, "report", "Intro", "hi");
    assert_eq!(store.get_section("report.md", "Intro").unwrap(), "hi\n");
}

#[test]
fn test_duplicate_append_rejected_and_file_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "hello");
    let before = read(&path);

    let err = store
        .append_section("a.md", "Intro", "again", &AppendOptions::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(read(&path), before);
}

#[test]
fn test_allow_append_extends_body() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "hello");

    let options = AppendOptions {
        allow_append: true,
        ..AppendOptions::default()
    };
    store
        .append_section("a.md", "Intro", "world", &options)
        .unwrap();

    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "hello\nworld\n");
}

#[test]
fn test_edit_section_keeps_neighbours() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "one");
    append(&store, "a.md", "Details", "two");

    store
        .edit_section("a.md", "Intro", "rewritten\nbody", &EditOptions::default())
        .unwrap();

    assert_eq!(
        store.get_section("a.md", "Intro").unwrap(),
        "rewritten\nbody\n"
    );
    assert_eq!(store.get_section("a.md", "Details").unwrap(), "two\n");
    assert!(store.validate_document("a.md").unwrap().is_valid());
}

#[test]
fn test_insert_after_places_section() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "one");
    append(&store, "a.md", "End", "three");

    let options = AppendOptions {
        insert_after: Some("Intro".to_string()),
        ..AppendOptions::default()
    };
    store
        .append_section("a.md", "Middle", "two", &options)
        .unwrap();

    let titles: Vec<String> = store
        .list_sections("a.md")
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, vec!["Intro", "Middle", "End"]);
    assert_eq!(store.get_section("a.md", "Middle").unwrap(), "two\n");
    assert_eq!(store.get_section("a.md", "End").unwrap(), "three\n");
}

#[test]
fn test_zero_match_replace_does_not_write() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "hello");
    let before = read(&path);
    let modified = fs::metadata(&path).unwrap().modified().unwrap();

    let count = store
        .search_and_replace("a.md", "absent", "x", &ReplaceOptions::default())
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(read(&path), before);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_replace_scoped_to_section() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "cat cat");
    append(&store, "a.md", "Details", "cat");

    let options = ReplaceOptions {
        section: Some("Intro".to_string()),
        ..ReplaceOptions::default()
    };
    let count = store
        .search_and_replace("a.md", "cat", "dog", &options)
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "dog dog\n");
    assert_eq!(store.get_section("a.md", "Details").unwrap(), "cat\n");
}

#[test]
fn test_regex_replace_with_groups() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "v1.2 and v3.4");

    let options = ReplaceOptions {
        regex: true,
        ..ReplaceOptions::default()
    };
    let count = store
        .search_and_replace("a.md", r"v(\d)\.(\d)", "$1-$2", &options)
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "1-2 and 3-4\n");
}

#[test]
fn test_missing_section_errors() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");

    let err = store.get_section("a.md", "Nope").unwrap_err();
    assert!(matches!(err, StoreError::SectionNotFound { ref section, .. } if section == "Nope"));

    let err = store
        .edit_section("a.md", "Nope", "x", &EditOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SectionNotFound);
}

#[test]
fn test_invalid_names_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for name in ["../escape.md", "sub/dir.md", "CON.md", "bad?.md", "", ".notes.md"] {
        let err = store.read(name).unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidPath { .. }),
            "expected rejection for {name:?}, got {err:?}"
        );
    }
}

#[test]
fn test_create_existing_fails() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");

    let err = store
        .create_document("a.md", &super::sample_metadata())
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Access {
            kind: AccessKind::AlreadyExists,
            ..
        }
    ));
}

#[test]
fn test_read_missing_document() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let err = store.get_section("missing.md", "Intro").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Access {
            kind: AccessKind::NotFound,
            ..
        }
    ));
}

#[test]
fn test_failed_validation_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let path = create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "hello");
    let before = read(&path);

    let err = store
        .edit_section("a.md", "Intro", "# Rogue header\ntext", &EditOptions::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(!err.violations().is_empty());
    assert_eq!(read(&path), before);
}

#[test]
fn test_list_documents_filters_entries() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "b.markdown");
    create_doc(&store, "a.md");
    fs::write(store.dirs().drafts.join("notes.txt"), "x").unwrap();
    fs::write(store.dirs().drafts.join(".hidden.md"), "x").unwrap();

    let names: Vec<String> = store
        .list_documents()
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["a.md", "b.markdown"]);
}

#[test]
fn test_stream_append_to_last_section() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    append(&store, "a.md", "Intro", "first");
    append(&store, "a.md", "Tail", "start");

    let outcome = store
        .stream_append_section(
            "a.md",
            "Tail",
            Cursor::new("more text\n".as_bytes()),
            &StreamOptions {
                chunk_size: Some(3),
                ..StreamOptions::default()
            },
        )
        .unwrap();

    assert_eq!(outcome.summary.bytes_written, 10);
    assert!(outcome.report.is_valid());
    assert_eq!(
        store.get_section("a.md", "Tail").unwrap(),
        "start\nmore text\n"
    );

    let err = store
        .stream_append_section(
            "a.md",
            "Intro",
            Cursor::new("x".as_bytes()),
            &StreamOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_concurrent_disjoint_edits() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    create_doc(&store, "a.md");
    let titles: Vec<String> = (0..8).map(|i| format!("Part {i}")).collect();
    for title in &titles {
        let options = AppendOptions {
            level: Some(1),
            ..AppendOptions::default()
        };
        store
            .append_section("a.md", title, "draft", &options)
            .unwrap();
    }

    thread::scope(|scope| {
        for title in &titles {
            let store = &store;
            scope.spawn(move || {
                store
                    .edit_section(
                        "a.md",
                        title,
                        &format!("final {title}"),
                        &EditOptions::default(),
                    )
                    .unwrap();
            });
        }
    });

    for title in &titles {
        assert_eq!(
            store.get_section("a.md", title).unwrap(),
            format!("final {title}\n")
        );
    }
    assert!(store.validate_document("a.md").unwrap().is_valid());
}
