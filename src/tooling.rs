//! Tooling & Integration Layer
//!
//! The `marksmith` command line: argument parsing, command execution against a
//! `DocumentStore`, and text rendering of results.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
