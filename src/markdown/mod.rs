//! Marker-annotated Markdown: line scanner, frontmatter and section index.

pub mod frontmatter;
pub mod scanner;
pub mod section;

pub use scanner::{scan, Line, Scan, Token};
pub use section::{find_section, marker, parse, render, Outline, Section};
