//! Section lock acquisition, release and stale-lock reclamation.
//!
//! Exclusivity comes from an OS advisory lock on the sidecar file; the JSON
//! record is written only after that lock is held and serves to carry the
//! expiry across processes. A sidecar that outlives its OS lock (a lease, or
//! the leftovers of a crashed holder) stays binding until it expires.

use crate::config::LockConfig;
use crate::lock::os;
use crate::lock::record::{self, LockError, LockRecord};
use crate::types::OwnerId;
use rand::Rng;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const COMMIT_POLL: Duration = Duration::from_millis(5);

/// Outcome of a single non-blocking attempt.
enum Attempt {
    Acquired(SectionLockGuard),
    /// The sidecar changed under us; try again immediately
    Raced,
}

/// Coordinates section locks for documents in any directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: &LockConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs)
    }

    /// Acquire the lock for `section` of `document`, retrying a bounded number
    /// of times. A live lock held by another owner is returned as
    /// [`LockError::Held`].
    pub fn acquire(
        &self,
        document: &Path,
        section: &str,
        owner: &OwnerId,
        ttl: Duration,
    ) -> Result<SectionLockGuard, LockError> {
        self.maybe_reclaim(document);

        let path = record::sidecar_path(document, section);
        let attempts = self.config.acquire_retries.saturating_add(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
            }
            // Races with a concurrent release are resolved by reopening, and do
            // not consume a retry.
            let mut raced = 0;
            let result = loop {
                match self.try_acquire(&path, document, section, owner, ttl) {
                    Ok(Attempt::Raced) if raced < 8 => raced += 1,
                    Ok(Attempt::Raced) => {
                        break Err(LockError::Held {
                            path: path.clone(),
                            record: None,
                            record_error: Some("sidecar kept changing".to_string()),
                        })
                    }
                    Ok(Attempt::Acquired(guard)) => break Ok(guard),
                    Err(e) => break Err(e),
                }
            };
            match result {
                Ok(guard) => {
                    debug!(
                        document = %document.display(),
                        section,
                        owner = %owner,
                        "Acquired section lock"
                    );
                    return Ok(guard);
                }
                Err(e @ LockError::Held { .. }) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(LockError::Held {
            path,
            record: None,
            record_error: None,
        }))
    }

    fn try_acquire(
        &self,
        path: &Path,
        document: &Path,
        section: &str,
        owner: &OwnerId,
        ttl: Duration,
    ) -> Result<Attempt, LockError> {
        reject_symlink(path)?;
        let mut file = os::open_lock_file(path).map_err(|e| LockError::io(path, e))?;

        if !os::try_lock_exclusive(&file).map_err(|e| LockError::io(path, e))? {
            // Someone holds the OS lock. Only an expired record is taken over;
            // an unreadable one may be a holder mid-write.
            return match record::read_record(&mut file, path) {
                Ok(Some(existing)) if existing.is_expired() => {
                    if os::is_current(&file, path).map_err(|e| LockError::io(path, e))? {
                        debug!(path = %path.display(), holder = %existing.agent, "Taking over expired lock");
                        remove_if_present(path)?;
                    }
                    Ok(Attempt::Raced)
                }
                Ok(existing) => Err(LockError::Held {
                    path: path.to_path_buf(),
                    record: existing.map(Box::new),
                    record_error: None,
                }),
                Err(e) => Err(LockError::Held {
                    path: path.to_path_buf(),
                    record: None,
                    record_error: Some(e.to_string()),
                }),
            };
        }

        if !os::is_current(&file, path).map_err(|e| LockError::io(path, e))? {
            return Ok(Attempt::Raced);
        }

        // OS lock held. A leftover record still binds unless it is ours,
        // expired or unreadable. Our own live lease is put back on release.
        let restore = match record::read_record(&mut file, path) {
            Ok(Some(existing)) if !existing.is_expired() => {
                if existing.agent != *owner {
                    return Err(LockError::Held {
                        path: path.to_path_buf(),
                        record: Some(Box::new(existing)),
                        record_error: None,
                    });
                }
                Some(existing)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Overwriting corrupt lock record");
                None
            }
        };

        let lock_record = LockRecord::new(section, document, owner, ttl);
        record::write_record(&mut file, path, &lock_record)?;

        Ok(Attempt::Acquired(SectionLockGuard {
            path: path.to_path_buf(),
            file: Some(file),
            record: lock_record,
            restore,
            released: false,
        }))
    }

    /// The live record for `section`, if any.
    pub fn holder(&self, document: &Path, section: &str) -> Result<Option<LockRecord>, LockError> {
        let path = record::sidecar_path(document, section);
        reject_symlink(&path)?;
        let mut file = match os::open_existing(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(&path, e)),
        };
        match record::read_record(&mut file, &path) {
            Ok(Some(existing)) if !existing.is_expired() => Ok(Some(existing)),
            Ok(_) | Err(LockError::MetadataCorrupt { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop `owner`'s lease on `section`. `Ok(false)` when there was none.
    pub fn release_lease(
        &self,
        document: &Path,
        section: &str,
        owner: &OwnerId,
    ) -> Result<bool, LockError> {
        let path = record::sidecar_path(document, section);
        if fs::symlink_metadata(&path).is_err() {
            return Ok(false);
        }
        let guard = self.acquire(document, section, owner, self.default_ttl())?;
        guard.discard()?;
        Ok(true)
    }

    fn maybe_reclaim(&self, document: &Path) {
        let probability = self.config.reclaim_probability.clamp(0.0, 1.0);
        if probability > 0.0 && rand::thread_rng().gen_bool(probability) {
            if let Some(dir) = document.parent() {
                self.reclaim_stale(dir);
            }
        }
    }

    /// Remove expired or unreadable sidecars in `dir` that nobody holds.
    /// Examines at most `reclaim_batch_size` sidecars and never fails: problems
    /// are logged and the sidecar is skipped.
    pub fn reclaim_stale(&self, dir: &Path) -> usize {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot scan for stale locks");
                return 0;
            }
        };

        let mut removed = 0;
        let sidecars = entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(record::is_sidecar_name)
            })
            .take(self.config.reclaim_batch_size);

        for entry in sidecars {
            let path = entry.path();
            match reclaim_one(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to reclaim lock"),
            }
        }

        if removed > 0 {
            debug!(dir = %dir.display(), removed, "Reclaimed stale locks");
        }
        removed
    }

    /// Take the per-document commit lock, waiting up to `commit_timeout_ms`.
    pub fn commit_lock(&self, document: &Path) -> Result<CommitLock, LockError> {
        let path = record::commit_lock_path(document);
        let timeout = Duration::from_millis(self.config.commit_timeout_ms);
        let started = Instant::now();

        loop {
            reject_symlink(&path)?;
            let file = os::open_lock_file(&path).map_err(|e| LockError::io(&path, e))?;
            if os::try_lock_exclusive(&file).map_err(|e| LockError::io(&path, e))? {
                if os::is_current(&file, &path).map_err(|e| LockError::io(&path, e))? {
                    return Ok(CommitLock { file, path });
                }
                continue;
            }
            if started.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            thread::sleep(COMMIT_POLL);
        }
    }
}

fn reclaim_one(path: &Path) -> Result<bool, LockError> {
    reject_symlink(path)?;
    let mut file = match os::open_existing(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(LockError::io(path, e)),
    };
    if !os::try_lock_exclusive(&file).map_err(|e| LockError::io(path, e))? {
        return Ok(false);
    }
    if !os::is_current(&file, path).map_err(|e| LockError::io(path, e))? {
        return Ok(false);
    }
    let stale = match record::read_record(&mut file, path) {
        Ok(Some(existing)) => existing.is_expired(),
        Ok(None) => true,
        Err(LockError::MetadataCorrupt { .. }) => true,
        Err(e) => return Err(e),
    };
    if stale {
        remove_if_present(path)?;
    }
    Ok(stale)
}

fn reject_symlink(path: &Path) -> Result<(), LockError> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return Err(LockError::Symlink {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(path, e)),
    }
}

/// A held section lock. Dropping it releases the lock and removes the sidecar,
/// or writes back the owner's lease when the lock re-entered one.
#[derive(Debug)]
pub struct SectionLockGuard {
    path: PathBuf,
    file: Option<File>,
    record: LockRecord,
    restore: Option<LockRecord>,
    released: bool,
}

impl SectionLockGuard {
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now, reporting failures that `Drop` would swallow.
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_inner()
    }

    /// The lease this lock re-entered, if any.
    pub fn restores(&self) -> Option<&LockRecord> {
        self.restore.as_ref()
    }

    /// Release and remove the sidecar even when a lease was re-entered.
    pub fn discard(mut self) -> Result<(), LockError> {
        self.restore = None;
        self.release_inner()
    }

    /// Keep the sidecar as a lease and drop the OS lock. The lease binds other
    /// owners until it expires or is released with
    /// [`LockManager::release_lease`].
    pub fn into_lease(mut self) -> LockRecord {
        self.released = true;
        if let Some(file) = self.file.take() {
            let _ = os::unlock(&file);
        }
        self.record.clone()
    }

    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let current = os::is_current(&file, &self.path).map_err(|e| LockError::io(&self.path, e))?;
        if current {
            match self.restore.take() {
                Some(lease) => {
                    record::write_record(&mut file, &self.path, &lease)?;
                    debug!(path = %self.path.display(), expires = %lease.expires, "Restored section lease");
                }
                None => remove_if_present(&self.path)?,
            }
        }
        os::unlock(&file).map_err(|e| LockError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "Released section lock");
        Ok(())
    }
}

impl Drop for SectionLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(path = %self.path.display(), error = %e, "Failed to release section lock");
        }
    }
}

/// Held per-document commit lock; released on drop. The lock file itself is
/// left in place.
#[derive(Debug)]
pub struct CommitLock {
    file: File,
    path: PathBuf,
}

impl CommitLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        let _ = os::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    fn manager() -> LockManager {
        LockManager::new(&LockConfig {
            acquire_retries: 0,
            reclaim_probability: 0.0,
            ..LockConfig::default()
        })
    }

    fn doc(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("a.md");
        fs::write(&path, "# A\n").unwrap();
        path
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();
        let owner = OwnerId::new("one");

        let guard = locks
            .acquire(&doc, "Intro", &owner, Duration::from_secs(60))
            .unwrap();
        let sidecar = dir.path().join(".Intro.lock");
        assert!(sidecar.exists());
        assert_eq!(guard.record().agent, owner);
        assert_eq!(locks.holder(&doc, "Intro").unwrap().unwrap().agent, owner);

        guard.release().unwrap();
        assert!(!sidecar.exists());
        assert!(locks.holder(&doc, "Intro").unwrap().is_none());
    }

    #[test]
    fn test_second_owner_is_refused() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();

        let _held = locks
            .acquire(&doc, "Intro", &OwnerId::new("one"), Duration::from_secs(60))
            .unwrap();
        let err = locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));
        assert_eq!(err.holder().map(OwnerId::as_str), Some("one"));

        // Other sections are independent
        locks
            .acquire(&doc, "Other", &OwnerId::new("two"), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();
        {
            let _guard = locks
                .acquire(&doc, "Intro", &OwnerId::new("one"), Duration::from_secs(60))
                .unwrap();
        }
        assert!(!dir.path().join(".Intro.lock").exists());
        locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_lease_binds_until_released() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();
        let one = OwnerId::new("one");

        locks
            .acquire(&doc, "Intro", &one, Duration::from_secs(60))
            .unwrap()
            .into_lease();
        assert!(locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .is_err());

        // Same owner re-enters and refreshes
        let again = locks
            .acquire(&doc, "Intro", &one, Duration::from_secs(120))
            .unwrap();
        assert!(again.record().expires > again.record().timestamp + chrono::Duration::seconds(100));
        again.into_lease();

        assert!(matches!(
            locks.release_lease(&doc, "Intro", &OwnerId::new("two")),
            Err(LockError::Held { .. })
        ));
        assert!(locks.release_lease(&doc, "Intro", &one).unwrap());
        assert!(!locks.release_lease(&doc, "Intro", &one).unwrap());
    }

    #[test]
    fn test_reentered_lease_survives_release() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();
        let one = OwnerId::new("one");

        let lease = locks
            .acquire(&doc, "Intro", &one, Duration::from_secs(60))
            .unwrap()
            .into_lease();
        let inner = locks
            .acquire(&doc, "Intro", &one, Duration::from_secs(5))
            .unwrap();
        assert_eq!(inner.restores().map(|r| r.expires), Some(lease.expires));
        drop(inner);

        let holder = locks.holder(&doc, "Intro").unwrap().unwrap();
        assert_eq!(holder.agent, one);
        assert_eq!(holder.expires, lease.expires);
        assert!(locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .is_err());

        assert!(locks.release_lease(&doc, "Intro", &one).unwrap());
        assert!(locks.holder(&doc, "Intro").unwrap().is_none());
    }

    #[test]
    fn test_expired_lease_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();

        locks
            .acquire(&doc, "Intro", &OwnerId::new("one"), Duration::ZERO)
            .unwrap()
            .into_lease();
        let guard = locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .unwrap();
        assert_eq!(guard.record().agent.as_str(), "two");
    }

    #[test]
    fn test_expired_live_holder_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();

        let stale = locks
            .acquire(&doc, "Intro", &OwnerId::new("one"), Duration::ZERO)
            .unwrap();
        let fresh = locks
            .acquire(&doc, "Intro", &OwnerId::new("two"), Duration::from_secs(60))
            .unwrap();
        // The old holder's release must not remove the new sidecar
        drop(stale);
        assert!(fresh.path().exists());
        assert_eq!(locks.holder(&doc, "Intro").unwrap().unwrap().agent.as_str(), "two");
    }

    #[test]
    fn test_corrupt_sidecar_is_reclaimable() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();
        fs::write(dir.path().join(".Intro.lock"), "garbage").unwrap();

        let guard = locks
            .acquire(&doc, "Intro", &OwnerId::new("one"), Duration::from_secs(60))
            .unwrap();
        assert_eq!(guard.record().section, "Intro");
    }

    #[test]
    fn test_reclaim_stale() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = manager();

        locks
            .acquire(&doc, "Old", &OwnerId::new("one"), Duration::ZERO)
            .unwrap()
            .into_lease();
        locks
            .acquire(&doc, "Live", &OwnerId::new("one"), Duration::from_secs(60))
            .unwrap()
            .into_lease();
        fs::write(dir.path().join(".Broken.lock"), "{").unwrap();
        let _held = locks
            .acquire(&doc, "Held", &OwnerId::new("one"), Duration::ZERO)
            .unwrap();

        assert_eq!(locks.reclaim_stale(dir.path()), 2);
        assert!(!dir.path().join(".Old.lock").exists());
        assert!(!dir.path().join(".Broken.lock").exists());
        assert!(dir.path().join(".Live.lock").exists());
        assert!(dir.path().join(".Held.lock").exists());
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let dir = TempDir::new().unwrap();
        let doc = Arc::new(doc(&dir));
        let locks = Arc::new(manager());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let doc = Arc::clone(&doc);
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    locks
                        .acquire(&doc, "Race", &OwnerId::new(format!("t{}", i)), Duration::from_secs(60))
                        .ok()
                        .map(SectionLockGuard::into_lease)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_commit_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let doc = doc(&dir);
        let locks = LockManager::new(&LockConfig {
            commit_timeout_ms: 20,
            ..LockConfig::default()
        });

        let held = locks.commit_lock(&doc).unwrap();
        assert!(matches!(
            locks.commit_lock(&doc),
            Err(LockError::Timeout { .. })
        ));
        drop(held);
        locks.commit_lock(&doc).unwrap();
    }
}
