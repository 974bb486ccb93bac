//! Configuration
//!
//! `StoreConfig` is loaded once (see [`ConfigLoader`]) and passed by value or
//! reference into every store entry point. There is no process-wide instance.

pub mod directories;
pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use directories::{DirectoryConfig, ResolvedDirs};
pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::StoreError;
use crate::fsio::encoding::{Encoding, ErrorPolicy};
use crate::logging::LoggingConfig;
use crate::metadata::schema::{FieldRule, MetadataSchema};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub directories: DirectoryConfig,

    #[serde(default)]
    pub documents: DocumentConfig,

    #[serde(default)]
    pub locking: LockConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Reject values that would make the store misbehave at runtime.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.documents.validate()?;
        self.locking.validate()?;
        if self.stream.chunk_size == 0 {
            return Err(StoreError::Config(
                "stream.chunk_size must be greater than zero".to_string(),
            ));
        }
        self.metadata.schema()?;
        Ok(())
    }

    /// Build a config rooted at `root`, used by tests and embedding callers.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = StoreConfig::default();
        config.directories.root = root.to_path_buf();
        config
    }
}

fn default_extensions() -> Vec<String> {
    vec![".md".to_string(), ".markdown".to_string()]
}

fn default_extension() -> String {
    ".md".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_filename_length() -> usize {
    255
}

fn default_max_path_length() -> usize {
    4096
}

/// Document naming and encoding rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub encoding: Encoding,

    /// Accepted extensions, each with its leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Appended to names that carry none of `extensions`
    #[serde(default = "default_extension")]
    pub default_extension: String,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,

    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,
}

impl DocumentConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.extensions.is_empty() {
            return Err(StoreError::Config(
                "documents.extensions must not be empty".to_string(),
            ));
        }
        let pattern = Regex::new(r"^\.[a-zA-Z0-9]+$")
            .map_err(|e| StoreError::Config(format!("Invalid extension pattern: {}", e)))?;
        for ext in self.extensions.iter().chain(std::iter::once(&self.default_extension)) {
            if !pattern.is_match(ext) {
                return Err(StoreError::Config(format!(
                    "Invalid extension '{}' (expected a dot followed by letters or digits)",
                    ext
                )));
            }
        }
        if !self.extensions.contains(&self.default_extension) {
            return Err(StoreError::Config(format!(
                "documents.default_extension '{}' is not listed in documents.extensions",
                self.default_extension
            )));
        }
        Ok(())
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            extensions: default_extensions(),
            default_extension: default_extension(),
            max_file_size: default_max_file_size(),
            max_filename_length: default_max_filename_length(),
            max_path_length: default_max_path_length(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_acquire_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    50
}

fn default_reclaim_probability() -> f64 {
    0.1
}

fn default_reclaim_batch_size() -> usize {
    100
}

fn default_commit_timeout_ms() -> u64 {
    5_000
}

/// Section lock behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lifetime of a section lock in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Extra non-blocking attempts after the first one fails
    #[serde(default = "default_acquire_retries")]
    pub acquire_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Chance that an acquisition also sweeps the directory for stale sidecars
    #[serde(default = "default_reclaim_probability")]
    pub reclaim_probability: f64,

    /// Maximum sidecars examined per sweep
    #[serde(default = "default_reclaim_batch_size")]
    pub reclaim_batch_size: usize,

    /// How long a write waits for the per-document commit lock
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Owner id recorded in sidecars when the caller supplies none
    #[serde(default)]
    pub owner: Option<String>,
}

impl LockConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.ttl_secs == 0 {
            return Err(StoreError::Config(
                "locking.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reclaim_probability) {
            return Err(StoreError::Config(format!(
                "locking.reclaim_probability must be within [0, 1], got {}",
                self.reclaim_probability
            )));
        }
        Ok(())
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            acquire_retries: default_acquire_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            reclaim_probability: default_reclaim_probability(),
            reclaim_batch_size: default_reclaim_batch_size(),
            commit_timeout_ms: default_commit_timeout_ms(),
            owner: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which document quality checks run, and whether they block writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub check_links: bool,

    #[serde(default = "default_true")]
    pub check_tables: bool,

    #[serde(default = "default_true")]
    pub check_task_lists: bool,

    #[serde(default = "default_true")]
    pub check_code_blocks: bool,

    #[serde(default = "default_true")]
    pub check_frontmatter: bool,

    /// When false, quality findings on write are logged and the write proceeds
    #[serde(default)]
    pub quality_on_write: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_links: true,
            check_tables: true,
            check_task_lists: true,
            check_code_blocks: true,
            check_frontmatter: true,
            quality_on_write: false,
        }
    }
}

fn default_chunk_size() -> usize {
    8192
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

fn default_required_metadata() -> Vec<String> {
    vec!["title".to_string(), "author".to_string(), "date".to_string()]
}

/// Frontmatter schema as written in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Keys every document must carry
    #[serde(default = "default_required_metadata")]
    pub required: Vec<String>,

    /// Per-key rules
    #[serde(default)]
    pub rules: BTreeMap<String, FieldRule>,
}

impl MetadataConfig {
    /// Compile into a schema, failing on bad patterns.
    pub fn schema(&self) -> Result<MetadataSchema, StoreError> {
        MetadataSchema::from_config(self)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            required: default_required_metadata(),
            rules: BTreeMap::new(),
        }
    }
}

fn default_program() -> String {
    "pandoc".to_string()
}

fn default_pdf_engine() -> String {
    "xelatex".to_string()
}

/// External document converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,

    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            pdf_engine: default_pdf_engine(),
            extra_args: Vec::new(),
        }
    }
}
