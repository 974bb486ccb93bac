//! Whole-file reads and all-or-nothing replacement.
//!
//! A replacement is written to a uniquely named file in the temp directory,
//! flushed to disk, then renamed over the target. Readers therefore observe
//! either the old or the new content. When the temp directory lives on a
//! different device the bytes are first copied into a sibling of the target so
//! the final step is still a same-directory rename.

use crate::error::{AccessKind, StoreError};
use crate::fsio::encoding::Encoding;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

/// Hook run after the temp file is durable and before it replaces the target.
pub type PreCommitHook<'a> = &'a dyn Fn(&Path) -> io::Result<()>;

/// Read raw bytes, mapping failures onto the access taxonomy.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|e| read_error(path, e))
}

/// Read and decode a document.
pub fn read_text(path: &Path, encoding: Encoding) -> Result<String, StoreError> {
    let bytes = read_bytes(path)?;
    encoding.decode(&bytes, path)
}

fn read_error(path: &Path, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::access(path, AccessKind::NotFound),
        io::ErrorKind::PermissionDenied => StoreError::access(path, AccessKind::ReadDenied),
        _ => StoreError::io(path, err),
    }
}

/// Replace `path` with `content` atomically.
pub fn atomic_write(
    path: &Path,
    content: &str,
    encoding: Encoding,
    temp_dir: &Path,
) -> Result<(), StoreError> {
    AtomicWrite::new(temp_dir).write_text(path, content, encoding)
}

/// Configurable atomic writer.
pub struct AtomicWrite<'a> {
    temp_dir: &'a Path,
    backup_dir: Option<&'a Path>,
    pre_commit: Option<PreCommitHook<'a>>,
}

impl<'a> AtomicWrite<'a> {
    pub fn new(temp_dir: &'a Path) -> Self {
        Self {
            temp_dir,
            backup_dir: None,
            pre_commit: None,
        }
    }

    /// Copy the current target here before replacing it.
    pub fn backup_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.backup_dir = dir;
        self
    }

    /// Install a hook that runs just before the rename. An error from the hook
    /// aborts the write as if the process had died at that point.
    pub fn pre_commit(mut self, hook: PreCommitHook<'a>) -> Self {
        self.pre_commit = Some(hook);
        self
    }

    pub fn write_text(&self, path: &Path, content: &str, encoding: Encoding) -> Result<(), StoreError> {
        let bytes = encoding.encode(content, path)?;
        self.write_bytes(path, &bytes)
    }

    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut temp = Builder::new()
            .prefix(".marksmith-")
            .suffix(".tmp")
            .tempfile_in(self.temp_dir)
            .map_err(|e| StoreError::io(self.temp_dir, e))?;

        // From here on, dropping `temp` removes the temp file.
        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| StoreError::io(temp.path(), e))?;

        if let Ok(meta) = fs::metadata(path) {
            if let Err(e) = fs::set_permissions(temp.path(), meta.permissions()) {
                debug!("Could not carry permissions onto {}: {}", temp.path().display(), e);
            }
            if let Some(backup_dir) = self.backup_dir {
                backup_copy(path, backup_dir)?;
            }
        }

        if let Some(hook) = self.pre_commit {
            hook(temp.path()).map_err(|e| StoreError::io(path, e))?;
        }

        match temp.persist(path) {
            Ok(_) => {}
            Err(err) if is_cross_device(&err.error) => {
                debug!(
                    "Cross-device rename into {}, copying through a sibling temp file",
                    path.display()
                );
                persist_via_sibling(err.file, path)?;
            }
            Err(err) => return Err(StoreError::from_io(path, err.error)),
        }

        sync_parent(path);
        Ok(())
    }
}

fn persist_via_sibling(source: NamedTempFile, path: &Path) -> Result<(), StoreError> {
    let parent = parent_dir(path);
    let sibling = Builder::new()
        .prefix(".marksmith-")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .map_err(|e| StoreError::io(&parent, e))?;
    fs::copy(source.path(), sibling.path())
        .and_then(|_| sibling.as_file().sync_all())
        .map_err(|e| StoreError::io(sibling.path(), e))?;
    sibling
        .persist(path)
        .map_err(|e| StoreError::from_io(path, e.error))?;
    if let Err(e) = source.close() {
        warn!("Failed to remove temp file after cross-device copy: {}", e);
    }
    Ok(())
}

fn backup_copy(path: &Path, backup_dir: &Path) -> Result<PathBuf, StoreError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
    let target = backup_dir.join(format!("{}.{}.bak", name, stamp));
    fs::copy(path, &target).map_err(|e| StoreError::io(&target, e))?;
    debug!("Backed up {} to {}", path.display(), target.display());
    Ok(target)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Ok(dir) = fs::File::open(parent_dir(path)) {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(rustix::io::Errno::XDEV.raw_os_error())
}

#[cfg(windows)]
fn is_cross_device(err: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    err.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}
