//! Frontmatter read/replace on document text. Section content is never
//! touched: everything after the closing delimiter is carried over verbatim.

use crate::error::StoreError;
use crate::markdown::frontmatter::{self, FrontmatterError};
use crate::metadata::schema::MetadataSchema;
use crate::types::Metadata;

fn metadata_error(e: FrontmatterError) -> StoreError {
    StoreError::Metadata(e.to_string())
}

/// Frontmatter of `content`, unvalidated. A document without a block has
/// empty metadata.
pub fn parse_metadata(content: &str) -> Result<Metadata, StoreError> {
    if content.trim().is_empty() {
        return Err(StoreError::Validation("File is empty".to_string()));
    }
    match frontmatter::split(content).yaml {
        Some(yaml) => frontmatter::parse(yaml).map_err(metadata_error),
        None => Ok(Metadata::new()),
    }
}

/// Frontmatter of `content`, validated against `schema` when present.
pub fn read_metadata(content: &str, schema: &MetadataSchema) -> Result<Metadata, StoreError> {
    let metadata = parse_metadata(content)?;
    if !metadata.is_empty() {
        schema.validate(&metadata)?;
    }
    Ok(metadata)
}

/// `content` with its frontmatter replaced by `metadata`.
pub fn replace_metadata(content: &str, metadata: &Metadata) -> Result<String, StoreError> {
    let body = frontmatter::split(content).body;
    frontmatter::render(metadata, body)
        .map_err(|e| StoreError::Metadata(format!("Failed to serialize metadata: {}", e)))
}

/// `base` overlaid with `updates`. Existing keys keep their position; new keys
/// are appended in the order `updates` lists them.
pub fn merge_maps(base: &Metadata, updates: &Metadata) -> Metadata {
    let mut merged = base.clone();
    for (key, value) in updates {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
