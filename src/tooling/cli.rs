//! CLI Tooling
//!
//! Command-line interface over a [`DocumentStore`]. Each invocation loads the
//! configuration, opens the store over the workspace and runs one command.

use crate::access::AccessOptions;
use crate::config::{ConfigLoader, StoreConfig};
use crate::convert::OutputFormat;
use crate::document::{
    AppendOptions, DocumentStore, EditOptions, LockOptions, ReplaceOptions, StreamOptions,
};
use crate::error::StoreError;
use crate::fsio::ErrorPolicy;
use crate::tooling::format::{
    format_documents_text, format_lock_text, format_report_text, format_sections_text,
    format_versions_text,
};
use crate::types::Metadata;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use serde_yaml::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Marksmith CLI - section-addressable Markdown documents
#[derive(Parser)]
#[command(name = "marksmith")]
#[command(about = "Section-addressable Markdown document store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lock owner id recorded in sidecars (default: config or user-pid)
    #[arg(long)]
    pub owner: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold the logging flags into `config`.
    pub fn apply_logging_overrides(&self, config: &mut StoreConfig) {
        let logging = &mut config.logging;
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
    }
}

/// Section body source: inline, from a file, or stdin when neither is given.
#[derive(Args, Debug, Clone)]
pub struct ContentArgs {
    /// Section content
    #[arg(long, conflicts_with = "from_file")]
    pub content: Option<String>,

    /// Read section content from this file
    #[arg(long)]
    pub from_file: Option<PathBuf>,
}

impl ContentArgs {
    fn read(&self) -> Result<String, StoreError> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }
        let mut buf = String::new();
        match &self.from_file {
            Some(path) => {
                buf = std::fs::read_to_string(path).map_err(|e| StoreError::from_io(path, e))?;
            }
            None => {
                io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| StoreError::io("<stdin>", e))?;
            }
        }
        Ok(buf)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LockArgs {
    /// Skip the section lock for this edit
    #[arg(long)]
    pub no_lock: bool,

    /// Section lock lifetime in seconds
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

impl LockArgs {
    fn options(&self) -> LockOptions {
        LockOptions {
            lock: !self.no_lock,
            ttl: self.ttl_secs.map(Duration::from_secs),
            owner: None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a document with frontmatter only
    Create {
        name: String,
        /// Frontmatter entry as KEY=VALUE (repeatable)
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Add a section
    Append {
        name: String,
        title: String,
        #[command(flatten)]
        content: ContentArgs,
        /// Header level (1-6); default is one below the preceding header
        #[arg(long)]
        level: Option<usize>,
        /// Insert after this section instead of at the end
        #[arg(long)]
        after: Option<String>,
        /// Append to the section if it already exists
        #[arg(long)]
        allow_append: bool,
        #[command(flatten)]
        lock: LockArgs,
    },
    /// Replace a section's body
    Edit {
        name: String,
        title: String,
        #[command(flatten)]
        content: ContentArgs,
        #[command(flatten)]
        lock: LockArgs,
    },
    /// Stream stdin onto the end of the last section
    Stream {
        name: String,
        title: String,
        /// Read size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Handling of undecodable input
        #[arg(long, value_enum)]
        errors: Option<ErrorPolicyArg>,
        #[command(flatten)]
        lock: LockArgs,
    },
    /// Print a section's body
    Get { name: String, title: String },
    /// Exit status and output tell whether a section exists
    Exists { name: String, title: String },
    /// List a document's headers
    Sections {
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Search and replace across a document or one section
    Replace {
        name: String,
        search: String,
        replacement: String,
        /// Treat SEARCH as a regular expression
        #[arg(long)]
        regex: bool,
        #[arg(long)]
        ignore_case: bool,
        /// Limit replacement to this section
        #[arg(long)]
        section: Option<String>,
        #[command(flatten)]
        lock: LockArgs,
    },
    /// Take a lease on a section
    Lock {
        name: String,
        title: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Release a lease on a section
    Unlock { name: String, title: String },
    /// Show who holds a section lock
    Holder { name: String, title: String },
    /// Remove expired lock sidecars from the drafts directory
    Reclaim,
    /// Validate a document
    Validate {
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Frontmatter commands
    Meta {
        #[command(subcommand)]
        command: MetaCommands,
    },
    /// Version snapshots
    Version {
        #[command(subcommand)]
        command: VersionCommands,
    },
    /// Export a validated document to the finalized directory
    Finalize {
        name: String,
        /// md, pdf, html, docx or latex
        #[arg(long, default_value = "md")]
        to: String,
    },
    /// List documents in the drafts directory
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
pub enum MetaCommands {
    /// Print frontmatter
    Get {
        name: String,
        /// Output format (yaml or json)
        #[arg(long, default_value = "yaml")]
        format: String,
    },
    /// Replace frontmatter
    Set {
        name: String,
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Overlay entries on the existing frontmatter
    Merge {
        name: String,
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum VersionCommands {
    /// Snapshot a document as <stem>_v<N>
    Save { name: String },
    /// List snapshots
    List {
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ErrorPolicyArg {
    Strict,
    Replace,
    Ignore,
}

impl From<ErrorPolicyArg> for ErrorPolicy {
    fn from(arg: ErrorPolicyArg) -> Self {
        match arg {
            ErrorPolicyArg::Strict => ErrorPolicy::Strict,
            ErrorPolicyArg::Replace => ErrorPolicy::Replace,
            ErrorPolicyArg::Ignore => ErrorPolicy::Ignore,
        }
    }
}

/// Parse `KEY=VALUE` entries. Values are read as YAML scalars, so `3` is a
/// number and `2024-01-01` stays a string.
pub fn parse_meta_args(entries: &[String]) -> Result<Metadata, StoreError> {
    let mut metadata = Metadata::new();
    for entry in entries {
        let (key, raw) = entry.split_once('=').ok_or_else(|| {
            StoreError::Validation(format!("Expected KEY=VALUE, got '{}'", entry))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(StoreError::Validation(format!(
                "Empty key in metadata entry '{}'",
                entry
            )));
        }
        let value = serde_yaml::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        metadata.insert(Value::String(key.to_string()), value);
    }
    Ok(metadata)
}

/// Load configuration from an explicit file, or the layered sources for
/// `workspace_root`.
pub fn load_config(
    workspace_root: &Path,
    config_path: Option<&Path>,
) -> Result<StoreConfig, StoreError> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(workspace_root),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Validation(format!("Failed to render JSON: {}", e)))
}

/// CLI context for executing commands
pub struct CliContext {
    store: DocumentStore,
    workspace_root: PathBuf,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, StoreError> {
        let config = load_config(&workspace_root, config_path.as_deref())?;
        Self::with_config(workspace_root, config)
    }

    /// Create a context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: StoreConfig) -> Result<Self, StoreError> {
        let store = DocumentStore::open(&workspace_root, config)?;
        Ok(Self {
            store,
            workspace_root,
        })
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        if let Some(owner) = owner {
            self.store = self.store.with_owner(owner);
        }
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, StoreError> {
        let store = &self.store;
        match command {
            Commands::Create { name, meta } => {
                let metadata = parse_meta_args(meta)?;
                let path = store.create_document(name, &metadata)?;
                Ok(format!("Created {}", path.display()))
            }
            Commands::Append {
                name,
                title,
                content,
                level,
                after,
                allow_append,
                lock,
            } => {
                let options = AppendOptions {
                    level: *level,
                    insert_after: after.clone(),
                    allow_append: *allow_append,
                    lock: lock.options(),
                };
                store.append_section(name, title, &content.read()?, &options)?;
                Ok(format!("Appended section '{}' to {}", title, name))
            }
            Commands::Edit {
                name,
                title,
                content,
                lock,
            } => {
                let options = EditOptions {
                    lock: lock.options(),
                };
                store.edit_section(name, title, &content.read()?, &options)?;
                Ok(format!("Updated section '{}' in {}", title, name))
            }
            Commands::Stream {
                name,
                title,
                chunk_size,
                errors,
                lock,
            } => {
                let options = StreamOptions {
                    chunk_size: *chunk_size,
                    error_policy: errors.map(ErrorPolicy::from),
                    lock: lock.options(),
                };
                let outcome = store.stream_append_section(name, title, io::stdin().lock(), &options)?;
                let mut out = format!(
                    "Streamed {} bytes into '{}' ({} chunks)",
                    outcome.summary.bytes_written, title, outcome.summary.chunks
                );
                for finding in outcome.report.errors() {
                    out.push_str(&format!("\n  {}", finding));
                }
                Ok(out)
            }
            Commands::Get { name, title } => {
                let body = store.get_section(name, title)?;
                Ok(body.trim_end_matches('\n').to_string())
            }
            Commands::Exists { name, title } => {
                if store.section_exists(name, title)? {
                    Ok("yes".to_string())
                } else {
                    Err(StoreError::SectionNotFound {
                        path: store.resolve(name, AccessOptions::read())?,
                        section: title.clone(),
                    })
                }
            }
            Commands::Sections { name, format } => {
                let sections = store.list_sections(name)?;
                if format == "json" {
                    to_json(&sections)
                } else {
                    Ok(format_sections_text(name, &sections))
                }
            }
            Commands::Replace {
                name,
                search,
                replacement,
                regex,
                ignore_case,
                section,
                lock,
            } => {
                let options = ReplaceOptions {
                    regex: *regex,
                    case_sensitive: !*ignore_case,
                    section: section.clone(),
                    lock: lock.options(),
                };
                let count = store.search_and_replace(name, search, replacement, &options)?;
                Ok(format!("Replaced {} occurrence(s)", count))
            }
            Commands::Lock {
                name,
                title,
                ttl_secs,
            } => {
                if store.lock_section(name, title, ttl_secs.map(Duration::from_secs))? {
                    Ok(format!("Locked section '{}' as {}", title, store.owner()))
                } else {
                    let holder = store.lock_holder(name, title)?;
                    Err(StoreError::Lock {
                        path: store.resolve(name, AccessOptions::read())?,
                        section: title.clone(),
                        holder: holder.map(|r| r.agent.to_string()),
                    })
                }
            }
            Commands::Unlock { name, title } => {
                if store.unlock_section(name, title)? {
                    Ok(format!("Unlocked section '{}'", title))
                } else {
                    Ok(format!("Section '{}' was not locked by {}", title, store.owner()))
                }
            }
            Commands::Holder { name, title } => {
                let holder = store.lock_holder(name, title)?;
                Ok(format_lock_text(title, holder.as_ref()))
            }
            Commands::Reclaim => {
                let removed = store.reclaim();
                info!(removed, "Reclaimed stale locks");
                Ok(format!("Removed {} stale lock(s)", removed))
            }
            Commands::Validate { name, format } => {
                let report = store.validate_document(name)?;
                if format == "json" {
                    to_json(&json!({
                        "document": name,
                        "valid": report.is_valid(),
                        "checks": report.checks,
                        "violations": report.violations,
                    }))
                } else {
                    Ok(format_report_text(name, &report))
                }
            }
            Commands::Meta { command } => self.handle_meta_command(command),
            Commands::Version { command } => self.handle_version_command(command),
            Commands::Finalize { name, to } => {
                let format: OutputFormat = to.parse()?;
                let output = store.finalize(name, format)?;
                Ok(format!("Finalized {} -> {}", name, output.display()))
            }
            Commands::List { format } => {
                let documents = store.list_documents()?;
                if format == "json" {
                    to_json(&documents)
                } else {
                    Ok(format_documents_text(&documents))
                }
            }
            Commands::Config => {
                let mut out = format!("# workspace: {}\n", self.workspace_root.display());
                let body = toml::to_string_pretty(store.config())
                    .map_err(|e| StoreError::Config(format!("Failed to render config: {}", e)))?;
                out.push_str(&body);
                Ok(out)
            }
        }
    }

    fn handle_meta_command(&self, command: &MetaCommands) -> Result<String, StoreError> {
        let store = &self.store;
        match command {
            MetaCommands::Get { name, format } => {
                let metadata = store.get_metadata(name)?;
                if format == "json" {
                    to_json(&metadata)
                } else {
                    serde_yaml::to_string(&metadata)
                        .map_err(|e| StoreError::Metadata(e.to_string()))
                }
            }
            MetaCommands::Set { name, meta } => {
                let metadata = parse_meta_args(meta)?;
                store.update_metadata(name, &metadata)?;
                Ok(format!("Updated metadata of {}", name))
            }
            MetaCommands::Merge { name, meta } => {
                let updates = parse_meta_args(meta)?;
                let merged = store.merge_metadata(name, &updates)?;
                Ok(format!(
                    "Merged {} key(s) into {} ({} total)",
                    updates.len(),
                    name,
                    merged.len()
                ))
            }
        }
    }

    fn handle_version_command(&self, command: &VersionCommands) -> Result<String, StoreError> {
        let store = &self.store;
        match command {
            VersionCommands::Save { name } => {
                let path = store.save_version(name)?;
                Ok(format!("Saved {}", path.display()))
            }
            VersionCommands::List { name, format } => {
                let versions = store.list_versions(name)?;
                if format == "json" {
                    to_json(&versions)
                } else {
                    Ok(format_versions_text(name, &versions))
                }
            }
        }
    }
}
