//! YAML frontmatter split, parse and render.

use crate::markdown::scanner::{self, Scan};
use crate::types::Metadata;
use serde_yaml::Value;

/// A document cut at the end of its frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    /// YAML text between the delimiters, if the document has a closed block
    pub yaml: Option<&'a str>,
    /// Everything after the closing delimiter line, byte-exact
    pub body: &'a str,
}

pub fn split(content: &str) -> Split<'_> {
    split_scanned(content, &scanner::scan(content))
}

pub fn split_scanned<'a>(content: &'a str, scan: &Scan<'_>) -> Split<'a> {
    match &scan.frontmatter {
        Some(range) => Split {
            yaml: Some(&content[range.clone()]),
            body: &content[scan.body_start..],
        },
        None => Split {
            yaml: None,
            body: content,
        },
    }
}

/// Why frontmatter could not be turned into a mapping.
#[derive(Debug)]
pub enum FrontmatterError {
    Syntax(serde_yaml::Error),
    NotAMapping,
}

impl std::fmt::Display for FrontmatterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontmatterError::Syntax(e) => write!(f, "invalid YAML: {}", e),
            FrontmatterError::NotAMapping => {
                write!(f, "Invalid metadata format: Must be valid YAML dictionary")
            }
        }
    }
}

/// Parse frontmatter YAML. An empty block is an empty mapping.
pub fn parse(yaml: &str) -> Result<Metadata, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }
    match serde_yaml::from_str::<Value>(yaml).map_err(FrontmatterError::Syntax)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// `---\n<yaml>---\n<body>`; an empty mapping renders no block at all.
pub fn render(metadata: &Metadata, body: &str) -> Result<String, serde_yaml::Error> {
    if metadata.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(metadata)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str("---\n");
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(body);
    Ok(out)
}
