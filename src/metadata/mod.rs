//! Frontmatter metadata: schema validation and document-level operations.

pub mod ops;
pub mod schema;

pub use ops::{merge_maps, parse_metadata, read_metadata, replace_metadata};
pub use schema::{FieldRule, FieldType, MetadataSchema};
