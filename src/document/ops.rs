//! Section-level document operations.

use crate::access::AccessOptions;
use crate::document::options::{
    AppendOptions, DocumentInfo, EditOptions, ReplaceOptions, StreamOptions,
};
use crate::document::store::DocumentStore;
use crate::document::transform::{self, check_title, Append, Replace};
use crate::error::{AccessKind, StoreError};
use crate::fsio::{stream_append, StreamSettings, StreamSummary};
use crate::lock::{LockError, LockRecord};
use crate::markdown::frontmatter;
use crate::markdown::section::{self, clean_body, Section};
use crate::types::{Metadata, OwnerId};
use crate::validate::{validate_content, validate_structure, ValidationReport};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of a streamed append: what was written and what the structural
/// check found afterwards.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub summary: StreamSummary,
    pub report: ValidationReport,
}

impl DocumentStore {
    /// Create a new document holding only `metadata` as frontmatter.
    pub fn create_document(&self, name: &str, metadata: &Metadata) -> Result<PathBuf, StoreError> {
        let path = self.resolve(name, AccessOptions::create())?;
        self.schema().validate(metadata)?;
        let content = frontmatter::render(metadata, "")
            .map_err(|e| StoreError::Metadata(format!("Failed to serialize metadata: {}", e)))?;

        let _commit = self
            .locks()
            .commit_lock(&path)
            .map_err(|e| e.into_store_error(&path, ""))?;
        if path.exists() {
            return Err(StoreError::access(&path, AccessKind::AlreadyExists));
        }
        self.persist(&path, &content)?;
        info!(path = %path.display(), "Created document");
        Ok(path)
    }

    /// Add section `title` with `content` as its body.
    pub fn append_section(
        &self,
        name: &str,
        title: &str,
        content: &str,
        options: &AppendOptions,
    ) -> Result<(), StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::write())?;
        let request = Append {
            title,
            body: content,
            level: options.level,
            insert_after: options.insert_after.as_deref(),
            allow_append: options.allow_append,
        };
        self.modify(&path, Some((title, &options.lock)), |current| {
            Ok((Some(transform::append_section(&path, current, &request)?), ()))
        })?;
        debug!(path = %path.display(), section = title, "Appended section");
        Ok(())
    }

    /// Replace the body of section `title`.
    pub fn edit_section(
        &self,
        name: &str,
        title: &str,
        content: &str,
        options: &EditOptions,
    ) -> Result<(), StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::write())?;
        self.modify(&path, Some((title, &options.lock)), |current| {
            Ok((Some(transform::edit_section(&path, current, title, content)?), ()))
        })?;
        debug!(path = %path.display(), section = title, "Edited section");
        Ok(())
    }

    /// Replace every match of `search`, returning the number of replacements.
    /// Nothing is written when there are none.
    pub fn search_and_replace(
        &self,
        name: &str,
        search: &str,
        replacement: &str,
        options: &ReplaceOptions,
    ) -> Result<usize, StoreError> {
        // Reject bad patterns before taking any lock.
        transform::build_pattern(search, options.regex, options.case_sensitive)?;
        let section = options.section.as_deref().map(check_title).transpose()?;
        let path = self.resolve(name, AccessOptions::write())?;
        let request = Replace {
            search,
            replacement,
            regex: options.regex,
            case_sensitive: options.case_sensitive,
            section,
        };
        let count = self.modify(&path, section.map(|s| (s, &options.lock)), |current| {
            transform::search_and_replace(&path, current, &request)
        })?;
        debug!(path = %path.display(), count, "Search and replace finished");
        Ok(count)
    }

    /// Body of section `title`: leading blank lines and trailing whitespace
    /// trimmed, newline-terminated.
    pub fn get_section(&self, name: &str, title: &str) -> Result<String, StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::read())?;
        let content = self.read_resolved(&path)?;
        let found = section::parse(&content)
            .find(title)
            .map(|s| clean_body(s.body(&content)));
        found.ok_or_else(|| StoreError::SectionNotFound {
            path,
            section: title.to_string(),
        })
    }

    pub fn section_exists(&self, name: &str, title: &str) -> Result<bool, StoreError> {
        let title = check_title(title)?;
        let content = self.read(name)?;
        Ok(section::parse(&content).find(title).is_some())
    }

    /// Every header in document order, marked or not.
    pub fn list_sections(&self, name: &str) -> Result<Vec<Section>, StoreError> {
        let content = self.read(name)?;
        Ok(section::parse(&content).sections)
    }

    /// Take a lease on section `title` that outlives this call. Returns false
    /// when another owner holds a live lock.
    pub fn lock_section(
        &self,
        name: &str,
        title: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.lock_section_as(name, title, ttl, self.owner())
    }

    pub fn lock_section_as(
        &self,
        name: &str,
        title: &str,
        ttl: Option<Duration>,
        owner: &OwnerId,
    ) -> Result<bool, StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::read())?;
        match self
            .locks()
            .acquire(&path, title, owner, self.ttl_or_default(ttl))
        {
            Ok(guard) => {
                let lease = guard.into_lease();
                info!(path = %path.display(), section = title, expires = %lease.expires, "Section locked");
                Ok(true)
            }
            Err(LockError::Held { record, .. }) => {
                debug!(
                    path = %path.display(),
                    section = title,
                    holder = ?record.map(|r| r.agent),
                    "Section lock not acquired"
                );
                Ok(false)
            }
            Err(e) => Err(e.into_store_error(&path, title)),
        }
    }

    /// Release this store owner's lease on `title`. Returns false when there was
    /// no lease.
    pub fn unlock_section(&self, name: &str, title: &str) -> Result<bool, StoreError> {
        self.unlock_section_as(name, title, self.owner())
    }

    pub fn unlock_section_as(
        &self,
        name: &str,
        title: &str,
        owner: &OwnerId,
    ) -> Result<bool, StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::read())?;
        self.locks()
            .release_lease(&path, title, owner)
            .map_err(|e| e.into_store_error(&path, title))
    }

    /// Live lock on `title`, if any.
    pub fn lock_holder(
        &self,
        name: &str,
        title: &str,
    ) -> Result<Option<LockRecord>, StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::read())?;
        self.locks()
            .holder(&path, title)
            .map_err(|e| e.into_store_error(&path, title))
    }

    /// Sweep the drafts directory for stale sidecars.
    pub fn reclaim(&self) -> usize {
        self.locks().reclaim_stale(&self.dirs().drafts)
    }

    /// Stream generated content onto the end of section `title`, which must
    /// be the last section of the document.
    pub fn stream_append_section<R: Read>(
        &self,
        name: &str,
        title: &str,
        source: R,
        options: &StreamOptions,
    ) -> Result<StreamOutcome, StoreError> {
        let title = check_title(title)?;
        let path = self.resolve(name, AccessOptions::write())?;
        let _section_guard = self.section_lock(&path, title, &options.lock)?;
        let _commit = self
            .locks()
            .commit_lock(&path)
            .map_err(|e| e.into_store_error(&path, title))?;

        let content = self.read_resolved(&path)?;
        let outline = section::parse(&content);
        match outline.sections.last() {
            Some(last) if last.key() == Some(title) => {}
            _ if outline.find(title).is_none() => {
                return Err(StoreError::SectionNotFound {
                    path,
                    section: title.to_string(),
                })
            }
            _ => {
                return Err(StoreError::Validation(format!(
                    "Section '{}' is not the last section; streaming appends only at the end",
                    title
                )))
            }
        }

        let stream = &self.config().stream;
        let settings = StreamSettings {
            chunk_size: options.chunk_size.unwrap_or(stream.chunk_size),
            error_policy: options.error_policy.unwrap_or(stream.error_policy),
            encoding: self.encoding(),
        };
        let summary = stream_append(&path, source, &settings)?;

        let report = validate_structure(&self.read_resolved(&path)?);
        for finding in report.errors() {
            warn!(path = %path.display(), "{}", finding);
        }
        debug!(path = %path.display(), section = title, bytes = summary.bytes_written, "Streamed into section");
        Ok(StreamOutcome { summary, report })
    }

    /// Markdown documents in the drafts directory, sorted by name.
    pub fn list_documents(&self) -> Result<Vec<DocumentInfo>, StoreError> {
        let drafts = &self.dirs().drafts;
        let extensions = &self.config().documents.extensions;
        let mut documents = Vec::new();

        for entry in WalkDir::new(drafts).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| drafts.clone());
                StoreError::io(path, e.into())
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let lower = name.to_ascii_lowercase();
            if name.starts_with('.')
                || !entry.file_type().is_file()
                || !extensions.iter().any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
            {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| StoreError::io(entry.path(), e.into()))?;
            documents.push(DocumentInfo {
                name,
                path: entry.path().to_path_buf(),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }

    /// Full structural and quality report for a document.
    pub fn validate_document(&self, name: &str) -> Result<ValidationReport, StoreError> {
        let path = self.resolve(name, AccessOptions::read())?;
        let content = self.read_resolved(&path)?;
        Ok(validate_content(
            &content,
            path.parent(),
            &self.config().validation,
        ))
    }
}
