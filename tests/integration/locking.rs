use super::{create_doc, open_store, test_config};
use marksmith::lock::{sidecar_path, LockManager};
use marksmith::{
    AppendOptions, DocumentStore, EditOptions, ErrorKind, LockOptions, OwnerId, StoreError,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn prepared(dir: &TempDir) -> DocumentStore {
    let store = open_store(dir);
    create_doc(&store, "a.md");
    store
        .append_section("a.md", "Intro", "hello", &AppendOptions::default())
        .unwrap();
    store
}

#[test]
fn test_lease_blocks_other_owner() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let alice = OwnerId::from("alice");
    let bob = OwnerId::from("bob");

    assert!(store.lock_section_as("a.md", "Intro", None, &alice).unwrap());
    assert!(!store.lock_section_as("a.md", "Intro", None, &bob).unwrap());

    let holder = store.lock_holder("a.md", "Intro").unwrap().unwrap();
    assert_eq!(holder.agent, alice);
    assert_eq!(holder.section, "Intro");

    let bob_edit = EditOptions {
        lock: LockOptions {
            owner: Some(bob.clone()),
            ..LockOptions::default()
        },
    };
    let err = store
        .edit_section("a.md", "Intro", "bob was here", &bob_edit)
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Lock { ref holder, .. } if holder.as_deref() == Some("alice")
    ));
    assert!(err.is_retryable());
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "hello\n");
}

#[test]
fn test_owner_can_edit_under_own_lease() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);

    let alice = OwnerId::from("alice");
    let bob = OwnerId::from("bob");
    let as_alice = EditOptions {
        lock: LockOptions {
            owner: Some(alice.clone()),
            ..LockOptions::default()
        },
    };

    assert!(store.lock_section_as("a.md", "Intro", None, &alice).unwrap());
    let lease = store.lock_holder("a.md", "Intro").unwrap().unwrap();
    store
        .edit_section("a.md", "Intro", "mine", &as_alice)
        .unwrap();

    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "mine\n");
    let holder = store.lock_holder("a.md", "Intro").unwrap().unwrap();
    assert_eq!(holder.agent, alice);
    assert_eq!(holder.expires, lease.expires);
    assert!(!store.lock_section_as("a.md", "Intro", None, &bob).unwrap());

    assert!(store.unlock_section_as("a.md", "Intro", &alice).unwrap());
    assert!(store.lock_holder("a.md", "Intro").unwrap().is_none());
}

#[test]
fn test_unlock_releases_lease() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let alice = OwnerId::from("alice");
    let bob = OwnerId::from("bob");

    assert!(store.lock_section_as("a.md", "Intro", None, &alice).unwrap());
    assert!(store.unlock_section_as("a.md", "Intro", &alice).unwrap());
    assert!(store.lock_holder("a.md", "Intro").unwrap().is_none());

    assert!(store.lock_section_as("a.md", "Intro", None, &bob).unwrap());
    assert!(!store.unlock_section_as("a.md", "Other", &bob).unwrap());
}

#[test]
fn test_expired_lease_is_taken_over() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let alice = OwnerId::from("alice");
    let bob = OwnerId::from("bob");

    assert!(store
        .lock_section_as("a.md", "Intro", Some(Duration::from_millis(10)), &alice)
        .unwrap());
    thread::sleep(Duration::from_millis(50));

    assert!(store.lock_holder("a.md", "Intro").unwrap().is_none());
    assert!(store.lock_section_as("a.md", "Intro", None, &bob).unwrap());
    assert_eq!(
        store.lock_holder("a.md", "Intro").unwrap().unwrap().agent,
        bob
    );
}

#[test]
fn test_reclaim_removes_only_stale_sidecars() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    store
        .append_section("a.md", "Other", "x", &AppendOptions::default())
        .unwrap();
    let path = store.dirs().drafts.join("a.md");
    let alice = OwnerId::from("alice");

    assert!(store
        .lock_section_as("a.md", "Intro", Some(Duration::from_millis(10)), &alice)
        .unwrap());
    assert!(store
        .lock_section_as("a.md", "Other", Some(Duration::from_secs(300)), &alice)
        .unwrap());
    thread::sleep(Duration::from_millis(50));

    assert_eq!(store.reclaim(), 1);
    assert!(!sidecar_path(&path, "Intro").exists());
    assert!(sidecar_path(&path, "Other").exists());
}

#[test]
fn test_locked_edit_removes_sidecar() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let path = store.dirs().drafts.join("a.md");

    store
        .edit_section("a.md", "Intro", "again", &EditOptions::default())
        .unwrap();

    assert!(!sidecar_path(&path, "Intro").exists());
}

#[test]
fn test_corrupt_sidecar_is_overwritten() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let path = store.dirs().drafts.join("a.md");
    fs::write(sidecar_path(&path, "Intro"), "{not json").unwrap();

    store
        .edit_section("a.md", "Intro", "recovered", &EditOptions::default())
        .unwrap();
    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "recovered\n");
}

#[test]
fn test_racing_acquires_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let path = store.dirs().drafts.join("a.md");
    let manager = LockManager::new(&test_config(&dir).locking);
    let winners = AtomicUsize::new(0);
    let barrier = Barrier::new(8);

    thread::scope(|scope| {
        for i in 0..8 {
            let (manager, winners, barrier, path) = (&manager, &winners, &barrier, &path);
            scope.spawn(move || {
                let owner = OwnerId::new(format!("worker-{i}"));
                barrier.wait();
                if let Ok(guard) =
                    manager.acquire(path, "Intro", &owner, Duration::from_secs(60))
                {
                    winners.fetch_add(1, Ordering::SeqCst);
                    // Hold until everyone has tried.
                    thread::sleep(Duration::from_millis(200));
                    guard.release().unwrap();
                }
            });
        }
    });

    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unlocked_edit_ignores_lease() {
    let dir = TempDir::new().unwrap();
    let store = prepared(&dir);
    let alice = OwnerId::from("alice");
    assert!(store.lock_section_as("a.md", "Intro", None, &alice).unwrap());

    let options = EditOptions {
        lock: LockOptions::unlocked(),
    };
    store
        .edit_section("a.md", "Intro", "forced", &options)
        .unwrap();

    assert_eq!(store.get_section("a.md", "Intro").unwrap(), "forced\n");
    let err = store
        .edit_section("a.md", "Intro", "blocked", &EditOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lock);
}
