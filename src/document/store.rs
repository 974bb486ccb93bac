//! `DocumentStore`: configuration, directories and the shared
//! read-transform-validate-write cycle every mutation goes through.

use crate::access::{AccessOptions, PathValidator};
use crate::config::{ResolvedDirs, StoreConfig};
use crate::document::options::LockOptions;
use crate::error::StoreError;
use crate::fsio::{read_text, AtomicWrite, Encoding};
use crate::lock::{LockManager, SectionLockGuard};
use crate::metadata::MetadataSchema;
use crate::types::OwnerId;
use crate::validate::{validate_content, Violation};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a transform: new text to persist (or `None` to skip the write)
/// and the value returned to the caller.
pub(crate) type Transformed<T> = (Option<String>, T);

/// File-backed, section-addressable document store rooted at the drafts
/// directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    config: StoreConfig,
    dirs: ResolvedDirs,
    paths: PathValidator,
    locks: LockManager,
    schema: MetadataSchema,
    owner: OwnerId,
}

impl DocumentStore {
    /// Validate `config`, prepare its directories under `workspace_root` and
    /// open a store over the drafts directory.
    pub fn open(workspace_root: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let dirs = config.directories.prepare(workspace_root)?;
        let schema = config.metadata.schema()?;
        let owner = config
            .locking
            .owner
            .clone()
            .map(OwnerId::new)
            .unwrap_or_else(OwnerId::for_process);

        debug!(drafts = %dirs.drafts.display(), owner = %owner, "Opened document store");
        Ok(Self {
            paths: PathValidator::new(&dirs.drafts, &config.documents),
            locks: LockManager::new(&config.locking),
            config,
            dirs,
            schema,
            owner,
        })
    }

    /// Use `owner` as the default lock owner.
    pub fn with_owner(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dirs(&self) -> &ResolvedDirs {
        &self.dirs
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    pub fn encoding(&self) -> Encoding {
        self.config.documents.encoding
    }

    /// Resolve a document name to its absolute path.
    pub fn resolve(&self, name: &str, options: AccessOptions) -> Result<PathBuf, StoreError> {
        self.paths.resolve(name, options)
    }

    pub(crate) fn read_resolved(&self, path: &Path) -> Result<String, StoreError> {
        self.paths.check_size(path)?;
        read_text(path, self.encoding())
    }

    /// Read a document by name.
    pub fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.resolve(name, AccessOptions::read())?;
        self.read_resolved(&path)
    }

    pub(crate) fn writer(&self) -> AtomicWrite<'_> {
        AtomicWrite::new(&self.dirs.temp).backup_dir(self.dirs.backup.as_deref())
    }

    /// Refuse content with structural errors (and quality errors when
    /// `validation.quality_on_write` is set); log the rest.
    pub(crate) fn check_before_write(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let validation = &self.config.validation;
        let report = validate_content(content, path.parent(), validation);

        let (blocking, advisory): (Vec<Violation>, Vec<Violation>) = report
            .violations
            .into_iter()
            .partition(|v| v.is_error() && (v.kind.is_structural() || validation.quality_on_write));

        for finding in &advisory {
            warn!(path = %path.display(), "{}", finding);
        }
        if !blocking.is_empty() {
            return Err(StoreError::Structural {
                path: path.to_path_buf(),
                violations: blocking,
            });
        }
        Ok(())
    }

    pub(crate) fn persist(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        self.check_before_write(path, content)?;
        self.writer().write_text(path, content, self.encoding())?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote document");
        Ok(())
    }

    /// Take the section lock described by `options`, if any.
    pub(crate) fn section_lock(
        &self,
        path: &Path,
        section: &str,
        options: &LockOptions,
    ) -> Result<Option<SectionLockGuard>, StoreError> {
        if !options.lock {
            return Ok(None);
        }
        let owner = options.owner.as_ref().unwrap_or(&self.owner);
        let ttl = options.ttl.unwrap_or_else(|| self.locks.default_ttl());
        self.locks
            .acquire(path, section, owner, ttl)
            .map(Some)
            .map_err(|e| e.into_store_error(path, section))
    }

    pub(crate) fn ttl_or_default(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or_else(|| self.locks.default_ttl())
    }

    /// Read, transform, validate and atomically replace `path` while holding
    /// the optional section lock and the document's commit lock. Both are
    /// released on every exit path.
    pub(crate) fn modify<T>(
        &self,
        path: &Path,
        section: Option<(&str, &LockOptions)>,
        transform: impl FnOnce(&str) -> Result<Transformed<T>, StoreError>,
    ) -> Result<T, StoreError> {
        let _section_guard = match section {
            Some((title, options)) => self.section_lock(path, title, options)?,
            None => None,
        };
        let _commit = self
            .locks
            .commit_lock(path)
            .map_err(|e| e.into_store_error(path, section.map_or("", |(title, _)| title)))?;

        let current = self.read_resolved(path)?;
        let (next, value) = transform(&current)?;
        if let Some(next) = next {
            self.persist(path, &next)?;
        }
        Ok(value)
    }
}
