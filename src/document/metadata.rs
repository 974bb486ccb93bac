//! Frontmatter operations on stored documents.

use crate::access::AccessOptions;
use crate::document::store::DocumentStore;
use crate::error::StoreError;
use crate::markdown::frontmatter;
use crate::metadata::{merge_maps, read_metadata, replace_metadata};
use crate::types::Metadata;
use tracing::debug;

impl DocumentStore {
    /// Frontmatter of `name`, validated against the configured schema. A
    /// document without frontmatter yields an empty map.
    pub fn get_metadata(&self, name: &str) -> Result<Metadata, StoreError> {
        let content = self.read(name)?;
        read_metadata(&content, self.schema())
    }

    /// Replace the frontmatter of `name` with `metadata`, leaving the body
    /// byte-exact.
    pub fn update_metadata(&self, name: &str, metadata: &Metadata) -> Result<(), StoreError> {
        self.schema().validate(metadata)?;
        let path = self.resolve(name, AccessOptions::write())?;
        self.modify(&path, None, |current| {
            Ok((Some(replace_metadata(current, metadata)?), ()))
        })?;
        debug!(path = %path.display(), keys = metadata.len(), "Updated metadata");
        Ok(())
    }

    /// Overlay `updates` on the current frontmatter and write the result.
    pub fn merge_metadata(&self, name: &str, updates: &Metadata) -> Result<Metadata, StoreError> {
        let path = self.resolve(name, AccessOptions::write())?;
        let merged = self.modify(&path, None, |current| {
            let base = match frontmatter::split(current).yaml {
                Some(yaml) => frontmatter::parse(yaml)
                    .map_err(|e| StoreError::Metadata(e.to_string()))?,
                None => Metadata::new(),
            };
            let merged = merge_maps(&base, updates);
            self.schema().validate(&merged)?;
            Ok((Some(replace_metadata(current, &merged)?), merged))
        })?;
        debug!(path = %path.display(), keys = merged.len(), "Merged metadata");
        Ok(merged)
    }
}
