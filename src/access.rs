//! Path & access validation
//!
//! Document names are flat file names inside a configured root directory.
//! Every store operation resolves its name here first, so an unsafe name never
//! reaches the filesystem.

use crate::config::DocumentConfig;
use crate::error::{AccessKind, PathRejection, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Caller requirements for a resolved path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessOptions {
    /// Create the root directory if it is missing
    pub create_parents: bool,
    /// The file (or, if absent, its directory) must be writable
    pub require_write: bool,
    /// The file must already exist
    pub check_exists: bool,
}

impl AccessOptions {
    /// Existing file, read only.
    pub fn read() -> Self {
        Self {
            check_exists: true,
            ..Self::default()
        }
    }

    /// Existing file that will be modified.
    pub fn write() -> Self {
        Self {
            check_exists: true,
            require_write: true,
            ..Self::default()
        }
    }

    /// File that is about to be created.
    pub fn create() -> Self {
        Self {
            create_parents: true,
            require_write: true,
            check_exists: false,
        }
    }
}

/// Resolves document names against a root directory.
#[derive(Debug, Clone)]
pub struct PathValidator {
    root: PathBuf,
    rules: DocumentConfig,
}

impl PathValidator {
    pub fn new(root: impl Into<PathBuf>, rules: &DocumentConfig) -> Self {
        Self {
            root: root.into(),
            rules: rules.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check a name and append the default extension if it carries none of the
    /// accepted ones.
    pub fn normalize_name(&self, name: &str) -> Result<String, StoreError> {
        let reject = |reason: PathRejection| StoreError::InvalidPath {
            name: name.to_string(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(reject(PathRejection::Empty));
        }
        if name == "." || name == ".." {
            return Err(reject(PathRejection::Traversal));
        }
        if name.contains('/') || name.contains('\\') {
            if name.split(['/', '\\']).any(|segment| segment == "..") {
                return Err(reject(PathRejection::Traversal));
            }
            return Err(reject(PathRejection::Separator));
        }
        if name.starts_with('.') {
            return Err(reject(PathRejection::Hidden));
        }
        if let Some(c) = name
            .chars()
            .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
        {
            return Err(reject(PathRejection::ForbiddenChar(c)));
        }
        if name.ends_with(' ') || name.ends_with('.') {
            return Err(reject(PathRejection::TrailingSpaceOrDot));
        }

        let normalized = if self.has_accepted_extension(name) {
            name.to_string()
        } else {
            format!("{}{}", name, self.rules.default_extension)
        };

        if normalized.len() > self.rules.max_filename_length {
            return Err(reject(PathRejection::TooLong {
                len: normalized.len(),
                max: self.rules.max_filename_length,
            }));
        }

        let stem = normalized.split('.').next().unwrap_or_default();
        let upper = stem.trim_end().to_ascii_uppercase();
        if RESERVED_NAMES.contains(&upper.as_str()) {
            return Err(reject(PathRejection::ReservedName(stem.to_string())));
        }

        Ok(normalized)
    }

    fn has_accepted_extension(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.rules.extensions.iter().any(|ext| {
            let ext = ext.to_ascii_lowercase();
            lower.len() > ext.len() && lower.ends_with(&ext)
        })
    }

    /// Resolve `name` to an absolute path under the root and check access.
    pub fn resolve(&self, name: &str, options: AccessOptions) -> Result<PathBuf, StoreError> {
        let normalized = self.normalize_name(name)?;

        if !self.root.exists() {
            if options.create_parents {
                fs::create_dir_all(&self.root).map_err(|e| StoreError::from_io(&self.root, e))?;
                debug!("Created document root {}", self.root.display());
            } else {
                return Err(StoreError::access(&self.root, AccessKind::NotFound));
            }
        }
        let root = dunce::canonicalize(&self.root).map_err(|e| StoreError::from_io(&self.root, e))?;
        let path = root.join(&normalized);

        let len = path.as_os_str().len();
        if len > self.rules.max_path_length {
            return Err(StoreError::InvalidPath {
                name: name.to_string(),
                reason: PathRejection::PathTooLong {
                    len,
                    max: self.rules.max_path_length,
                },
            });
        }

        match fs::symlink_metadata(&path) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    let target =
                        dunce::canonicalize(&path).map_err(|e| StoreError::from_io(&path, e))?;
                    if !target.starts_with(&root) {
                        return Err(StoreError::InvalidPath {
                            name: name.to_string(),
                            reason: PathRejection::OutsideRoot,
                        });
                    }
                }
                if !path.is_file() {
                    return Err(StoreError::access(&path, AccessKind::NotAFile));
                }
                check_access(&path, Permission::Read)?;
                if options.require_write {
                    check_access(&path, Permission::Write)?;
                }
            }
            Err(_) => {
                if options.check_exists {
                    return Err(StoreError::access(&path, AccessKind::NotFound));
                }
                if options.require_write {
                    check_access(&root, Permission::Write)?;
                }
            }
        }

        Ok(path)
    }

    /// Reject files above the configured size limit.
    pub fn check_size(&self, path: &Path) -> Result<(), StoreError> {
        let meta = fs::metadata(path).map_err(|e| StoreError::from_io(path, e))?;
        if meta.len() > self.rules.max_file_size {
            return Err(StoreError::access(path, AccessKind::TooLarge));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Permission {
    Read,
    Write,
}

#[cfg(unix)]
fn check_access(path: &Path, permission: Permission) -> Result<(), StoreError> {
    use rustix::fs::{access, Access};
    let (mode, denied) = match permission {
        Permission::Read => (Access::READ_OK, AccessKind::ReadDenied),
        Permission::Write => (Access::WRITE_OK, AccessKind::WriteDenied),
    };
    access(path, mode).map_err(|errno| {
        if errno == rustix::io::Errno::ACCESS || errno == rustix::io::Errno::ROFS {
            StoreError::access(path, denied)
        } else {
            StoreError::io(path, errno.into())
        }
    })
}

#[cfg(not(unix))]
fn check_access(path: &Path, permission: Permission) -> Result<(), StoreError> {
    match permission {
        Permission::Read => {
            if path.is_file() {
                fs::File::open(path).map_err(|_| StoreError::access(path, AccessKind::ReadDenied))?;
            }
            Ok(())
        }
        Permission::Write => {
            let meta = fs::metadata(path).map_err(|e| StoreError::from_io(path, e))?;
            if meta.permissions().readonly() {
                return Err(StoreError::access(path, AccessKind::WriteDenied));
            }
            Ok(())
        }
    }
}
