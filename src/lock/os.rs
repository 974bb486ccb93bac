//! OS advisory lock primitives.
//!
//! On unix these are `flock(2)` locks, bound to the open file description, so
//! two handles opened by the same process exclude each other just like two
//! processes do.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open (creating if needed) a lock file without truncating it.
pub fn open_lock_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Open an existing lock file.
pub fn open_existing(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// Non-blocking exclusive lock. `Ok(false)` when another handle holds it.
#[cfg(unix)]
pub fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use rustix::fs::{flock, FlockOperation};
    use rustix::io::Errno;

    match flock(file, FlockOperation::NonBlockingLockExclusive) {
        Ok(()) => Ok(true),
        Err(e) if e == Errno::WOULDBLOCK || e == Errno::INTR => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
pub fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(std::fs::TryLockError::WouldBlock) => Ok(false),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}

#[cfg(unix)]
pub fn unlock(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    flock(file, FlockOperation::Unlock).map_err(io::Error::from)
}

#[cfg(not(unix))]
pub fn unlock(file: &File) -> io::Result<()> {
    file.unlock()
}

/// Whether `path` still names the file behind `file`. A sidecar that was
/// unlinked (released or reclaimed) after we opened it no longer does.
#[cfg(unix)]
pub fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use rustix::fs::{fstat, stat};
    use rustix::io::Errno;

    let held = fstat(file)?;
    match stat(path) {
        Ok(on_disk) => Ok(held.st_dev == on_disk.st_dev && held.st_ino == on_disk.st_ino),
        Err(e) if e == Errno::NOENT => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
pub fn is_current(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}
