//! Section index over marker-annotated Markdown.
//!
//! A section starts at a header line, is bound to a title by the marker on the
//! following line, and runs to the next header or EOF.

use crate::markdown::frontmatter::{self, Split};
use crate::markdown::scanner::{self, Scan, Token};
use crate::types::MAX_HEADER_LEVEL;
use serde::Serialize;

pub fn marker(title: &str) -> String {
    format!("<!-- Section: {} -->", title)
}

/// Text for a new section, including its leading blank line separator.
pub fn render(level: usize, title: &str, body: &str) -> String {
    format!(
        "\n\n{} {}\n{}\n{}\n",
        "#".repeat(level),
        title,
        marker(title),
        body.trim()
    )
}

/// One header-delimited span. Offsets are byte offsets into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Header text
    pub title: String,
    /// Marker title on the line after the header, if there is one
    pub marker: Option<String>,
    pub level: usize,
    /// 1-based line of the header
    pub line: usize,
    /// Start of the header line
    pub start: usize,
    /// Start of the body (just past the marker, or the header without one)
    pub body_start: usize,
    /// Start of the next header line, or EOF
    pub end: usize,
}

impl Section {
    /// Raw body text, including trailing blank lines.
    pub fn body<'a>(&self, content: &'a str) -> &'a str {
        &content[self.body_start..self.end]
    }

    /// Lookup key: the marker title.
    pub fn key(&self) -> Option<&str> {
        self.marker.as_deref()
    }
}

/// Parsed document outline.
#[derive(Debug, Clone)]
pub struct Outline<'a> {
    pub frontmatter: Option<&'a str>,
    /// Offset where content after the frontmatter begins
    pub body_start: usize,
    pub sections: Vec<Section>,
}

impl<'a> Outline<'a> {
    /// First section whose marker is `title`.
    pub fn find(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key() == Some(title))
    }

    /// Level of the last header starting before `offset`.
    pub fn level_before(&self, offset: usize) -> Option<usize> {
        self.sections
            .iter()
            .take_while(|s| s.start < offset)
            .last()
            .map(|s| s.level)
    }

    /// Default level for a section inserted at `offset`.
    pub fn default_level_at(&self, offset: usize) -> usize {
        match self.level_before(offset) {
            Some(level) => (level + 1).min(MAX_HEADER_LEVEL),
            None => 1,
        }
    }
}

/// Build the outline in one pass over the scanner's tokens.
pub fn parse(content: &str) -> Outline<'_> {
    let scan = scanner::scan(content);
    parse_scanned(content, &scan)
}

pub fn parse_scanned<'a>(content: &'a str, scan: &Scan<'_>) -> Outline<'a> {
    let Split { yaml, .. } = frontmatter::split_scanned(content, scan);
    let mut sections: Vec<Section> = Vec::new();
    let mut previous_was_header = false;

    for line in &scan.lines {
        match line.token {
            Token::Header { level, title } => {
                if let Some(open) = sections.last_mut() {
                    open.end = line.start;
                }
                sections.push(Section {
                    title: title.to_string(),
                    marker: None,
                    level,
                    line: line.number,
                    start: line.start,
                    body_start: line.end,
                    end: content.len(),
                });
                previous_was_header = true;
                continue;
            }
            Token::Marker { title } if previous_was_header => {
                if let Some(open) = sections.last_mut() {
                    open.marker = Some(title.to_string());
                    open.body_start = line.end;
                }
            }
            _ => {}
        }
        previous_was_header = false;
    }

    Outline {
        frontmatter: yaml,
        body_start: scan.body_start,
        sections,
    }
}

/// Span of the section marked `title`, if any.
pub fn find_section(content: &str, title: &str) -> Option<Section> {
    parse(content).find(title).cloned()
}

/// Body text as callers see it: leading blank lines and trailing whitespace
/// removed, terminated by a single newline. Empty bodies stay empty.
pub fn clean_body(raw: &str) -> String {
    let trimmed = raw.trim_end();
    let mut start = 0;
    for line in trimmed.split_inclusive('\n') {
        if line.trim().is_empty() {
            start += line.len();
        } else {
            break;
        }
    }
    let body = &trimmed[start..];
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}

/// Split a raw body into its content and the whitespace tail that separates it
/// from the next section.
pub fn split_tail(raw: &str) -> (&str, &str) {
    let content_len = raw.trim_end().len();
    raw.split_at(content_len)
}
