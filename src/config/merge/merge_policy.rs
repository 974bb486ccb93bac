//! Merge policy: the base builder every source is layered onto.
//!
//! Later sources override earlier ones key by key. Tables merge, arrays and
//! scalars replace. Anything left unset falls back to the serde defaults on
//! `StoreConfig`.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Start a builder seeded with the defaults that must hold even when a file
/// sets a sibling key to an empty table.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("directories.root", "data")?
        .set_default("directories.create_directories", true)?
        .set_default("documents.encoding", "utf-8")
}
