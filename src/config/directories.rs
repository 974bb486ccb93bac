//! DirectoryConfig and directory preparation for the document root.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_drafts() -> PathBuf {
    PathBuf::from("drafts")
}

fn default_finalized() -> PathBuf {
    PathBuf::from("finalized")
}

fn default_temp() -> PathBuf {
    PathBuf::from("temp")
}

fn default_true() -> bool {
    true
}

/// Directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base directory (relative to the workspace root)
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Working documents (relative to `root`)
    #[serde(default = "default_drafts")]
    pub drafts: PathBuf,

    /// Converter output (relative to `root`)
    #[serde(default = "default_finalized")]
    pub finalized: PathBuf,

    /// Scratch space for atomic writes (relative to `root`)
    #[serde(default = "default_temp")]
    pub temp: PathBuf,

    /// Pre-image copies of replaced documents; disabled when unset
    #[serde(default)]
    pub backup: Option<PathBuf>,

    /// Create missing directories during preparation
    #[serde(default = "default_true")]
    pub create_directories: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            drafts: default_drafts(),
            finalized: default_finalized(),
            temp: default_temp(),
            backup: None,
            create_directories: true,
        }
    }
}

/// Absolute directories after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirs {
    pub drafts: PathBuf,
    pub finalized: PathBuf,
    pub temp: PathBuf,
    pub backup: Option<PathBuf>,
}

impl ResolvedDirs {
    fn named(&self) -> Vec<(&'static str, &Path)> {
        let mut dirs = vec![
            ("drafts", self.drafts.as_path()),
            ("finalized", self.finalized.as_path()),
            ("temp", self.temp.as_path()),
        ];
        if let Some(backup) = &self.backup {
            dirs.push(("backup", backup.as_path()));
        }
        dirs
    }
}

impl DirectoryConfig {
    /// Resolve configured directories to absolute paths without touching disk.
    pub fn resolve(&self, workspace_root: &Path) -> Result<ResolvedDirs, StoreError> {
        let workspace = absolutize(workspace_root)?;
        let root = workspace.join(&self.root);
        let dirs = ResolvedDirs {
            drafts: root.join(&self.drafts),
            finalized: root.join(&self.finalized),
            temp: root.join(&self.temp),
            backup: self.backup.as_ref().map(|b| root.join(b)),
        };
        check_not_nested(&dirs)?;
        Ok(dirs)
    }

    /// Resolve, create (when allowed) and verify read/write access.
    pub fn prepare(&self, workspace_root: &Path) -> Result<ResolvedDirs, StoreError> {
        let dirs = self.resolve(workspace_root)?;
        for (name, dir) in dirs.named() {
            if !dir.exists() {
                if !self.create_directories {
                    return Err(StoreError::Config(format!(
                        "{} directory does not exist: {}",
                        name,
                        dir.display()
                    )));
                }
                fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Config(format!(
                        "Failed to create {} directory {}: {}",
                        name,
                        dir.display(),
                        e
                    ))
                })?;
                debug!("Created {} directory {}", name, dir.display());
            }
            if !dir.is_dir() {
                return Err(StoreError::Config(format!(
                    "{} is not a directory: {}",
                    name,
                    dir.display()
                )));
            }
            check_read_write(name, dir)?;
        }
        // Canonical forms can reveal nesting hidden behind symlinks.
        let canonical = ResolvedDirs {
            drafts: canonical(&dirs.drafts)?,
            finalized: canonical(&dirs.finalized)?,
            temp: canonical(&dirs.temp)?,
            backup: match &dirs.backup {
                Some(b) => Some(canonical(b)?),
                None => None,
            },
        };
        check_not_nested(&canonical)?;
        Ok(canonical)
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, StoreError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| StoreError::Config(format!("Failed to get current directory: {}", e)))?;
    Ok(cwd.join(path))
}

fn canonical(path: &Path) -> Result<PathBuf, StoreError> {
    dunce::canonicalize(path).map_err(|e| {
        StoreError::Config(format!("Failed to canonicalize {}: {}", path.display(), e))
    })
}

fn check_not_nested(dirs: &ResolvedDirs) -> Result<(), StoreError> {
    let named = dirs.named();
    for (i, (a_name, a)) in named.iter().enumerate() {
        for (b_name, b) in named.iter().skip(i + 1) {
            if a.starts_with(b) || b.starts_with(a) {
                return Err(StoreError::Config(format!(
                    "Directories must not be nested: {} ({}) and {} ({})",
                    a_name,
                    a.display(),
                    b_name,
                    b.display()
                )));
            }
        }
    }
    Ok(())
}

fn check_read_write(name: &str, dir: &Path) -> Result<(), StoreError> {
    fs::read_dir(dir).map_err(|e| {
        StoreError::Config(format!(
            "No read permission for {} directory {}: {}",
            name,
            dir.display(),
            e
        ))
    })?;
    tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        StoreError::Config(format!(
            "No write permission for {} directory {}: {}",
            name,
            dir.display(),
            e
        ))
    })?;
    Ok(())
}
