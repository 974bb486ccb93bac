//! Numbered document snapshots.
//!
//! `save_version("a.md")` copies the document to `a_v<N>.md` next to it, where
//! `N` is one more than the source's `version` frontmatter value. Snapshots
//! are independent documents from then on.

use crate::access::AccessOptions;
use crate::document::{DocumentStore, VersionInfo};
use crate::error::StoreError;
use crate::markdown::frontmatter;
use crate::metadata::replace_metadata;
use regex::Regex;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `<stem>_v<N><ext>` next to `source`.
pub fn version_path(source: &Path, number: u64) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    source.with_file_name(format!("{}_v{}{}", stem, number, ext))
}

/// Current version number: integers and integer strings count, anything else
/// is 0.
pub fn current_version(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// `next` in the same YAML type as `previous`.
fn bumped(previous: &Value, next: u64) -> Value {
    match previous {
        Value::String(_) => Value::String(next.to_string()),
        _ => Value::Number(next.into()),
    }
}

impl DocumentStore {
    /// Snapshot `name` and return the snapshot's path. The source's `version`
    /// field is rewritten to the snapshot number only if it already exists.
    pub fn save_version(&self, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.resolve(name, AccessOptions::write())?;

        let mut written = None;
        let result = self.modify(&path, None, |current| {
            let mut metadata = match frontmatter::split(current).yaml {
                Some(yaml) => frontmatter::parse(yaml).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "Unreadable frontmatter, versioning from 0");
                    Default::default()
                }),
                None => Default::default(),
            };

            let mut number = current_version(metadata.get("version")) + 1;
            let mut target = version_path(&path, number);
            while target.exists() {
                warn!(path = %target.display(), "Version file already exists");
                number += 1;
                target = version_path(&path, number);
            }

            let rewritten = match metadata.get_mut("version") {
                Some(value) => {
                    *value = bumped(value, number);
                    let next = replace_metadata(current, &metadata)?;
                    self.check_before_write(&path, &next)?;
                    Some(next)
                }
                None => None,
            };

            self.writer()
                .write_text(&target, current, self.encoding())?;
            written = Some(target.clone());
            Ok((rewritten, target))
        });

        match result {
            Ok(snapshot) => {
                info!(source = %path.display(), target = %snapshot.display(), "Created version");
                Ok(snapshot)
            }
            Err(e) => {
                if let Some(target) = written {
                    if let Err(remove) = fs::remove_file(&target) {
                        warn!(path = %target.display(), error = %remove, "Failed to remove orphaned version");
                    }
                }
                Err(e)
            }
        }
    }

    /// Existing snapshots of `name`, ordered by number.
    pub fn list_versions(&self, name: &str) -> Result<Vec<VersionInfo>, StoreError> {
        let path = self.resolve(name, AccessOptions::read())?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let pattern = Regex::new(&format!(
            "^{}_v([0-9]+){}$",
            regex::escape(&stem),
            regex::escape(&ext)
        ))
        .map_err(|e| StoreError::Validation(format!("Invalid version pattern: {}", e)))?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut versions = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let file_name = entry.file_name();
            let Some(caps) = file_name.to_str().and_then(|n| pattern.captures(n)) else {
                continue;
            };
            if let Ok(number) = caps[1].parse::<u64>() {
                versions.push(VersionInfo {
                    number,
                    path: entry.path(),
                });
            }
        }
        versions.sort_by_key(|v| v.number);
        Ok(versions)
    }
}
