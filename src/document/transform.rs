//! Pure text transforms behind the section operations. Each takes the current
//! document text and returns the replacement; nothing here touches disk.

use crate::error::StoreError;
use crate::markdown::section::{self, split_tail, Outline};
use crate::types::MAX_HEADER_LEVEL;
use regex::{NoExpand, Regex, RegexBuilder};
use std::path::Path;

/// Trimmed title, or a validation error for titles that cannot round-trip
/// through a header and marker.
pub fn check_title(title: &str) -> Result<&str, StoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::Validation(
            "Section title must be a non-empty string".to_string(),
        ));
    }
    if title.contains('\n') || title.contains('\r') {
        return Err(StoreError::Validation(
            "Section title must be a single line".to_string(),
        ));
    }
    if title.contains("-->") {
        return Err(StoreError::Validation(
            "Section title must not contain '-->'".to_string(),
        ));
    }
    Ok(title)
}

pub fn check_level(level: usize) -> Result<usize, StoreError> {
    if (1..=MAX_HEADER_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(StoreError::Validation(format!(
            "Header level must be between 1 and {}, got {}",
            MAX_HEADER_LEVEL, level
        )))
    }
}

/// `head` must end with a newline before a body is written after it.
fn join_at(content: &str, offset: usize, new_body: &str, rest: &str) -> String {
    let head = &content[..offset];
    let mut out = String::with_capacity(content.len() + new_body.len() + 1);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(new_body);
    out.push_str(rest);
    out
}

/// Whitespace run that followed the old body, or a single newline.
fn tail_or_newline(tail: &str) -> &str {
    if tail.is_empty() {
        "\n"
    } else {
        tail
    }
}

pub struct Append<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub level: Option<usize>,
    pub insert_after: Option<&'a str>,
    pub allow_append: bool,
}

/// Add a section (or extend an existing one when `allow_append` is set).
pub fn append_section(path: &Path, content: &str, request: &Append<'_>) -> Result<String, StoreError> {
    let outline = section::parse(content);

    if let Some(existing) = outline.find(request.title) {
        if !request.allow_append {
            return Err(StoreError::Validation(format!(
                "Section '{}' already exists",
                request.title
            )));
        }
        let (old, tail) = split_tail(existing.body(content));
        let addition = request.body.trim();
        let body = if old.is_empty() {
            format!("{}{}", addition, tail_or_newline(tail))
        } else if addition.is_empty() {
            format!("{}{}", old, tail_or_newline(tail))
        } else {
            format!("{}\n{}{}", old, addition, tail_or_newline(tail))
        };
        return Ok(join_at(content, existing.body_start, &body, &content[existing.end..]));
    }

    match request.insert_after {
        Some(anchor) => insert_after(path, content, &outline, anchor, request),
        None => {
            let level = match request.level {
                Some(level) => check_level(level)?,
                None => outline.default_level_at(content.len()),
            };
            let rendered = section::render(level, request.title, request.body);
            let head = content.trim_end();
            if head.is_empty() {
                Ok(rendered.trim_start_matches('\n').to_string())
            } else {
                Ok(format!("{}{}", head, rendered))
            }
        }
    }
}

fn insert_after(
    path: &Path,
    content: &str,
    outline: &Outline<'_>,
    anchor: &str,
    request: &Append<'_>,
) -> Result<String, StoreError> {
    let target = outline
        .find(anchor)
        .ok_or_else(|| StoreError::SectionNotFound {
            path: path.to_path_buf(),
            section: anchor.to_string(),
        })?;
    let level = match request.level {
        Some(level) => check_level(level)?,
        None => outline.default_level_at(target.end),
    };
    let rendered = section::render(level, request.title, request.body);
    let head = content[..target.end].trim_end();
    let rest = &content[target.end..];

    let mut out = String::with_capacity(content.len() + rendered.len() + 1);
    out.push_str(head);
    out.push_str(&rendered);
    if !rest.is_empty() {
        out.push('\n');
        out.push_str(rest);
    }
    Ok(out)
}

/// Replace the body of `title`, keeping its header and marker verbatim.
pub fn edit_section(path: &Path, content: &str, title: &str, body: &str) -> Result<String, StoreError> {
    let outline = section::parse(content);
    let existing = outline.find(title).ok_or_else(|| StoreError::SectionNotFound {
        path: path.to_path_buf(),
        section: title.to_string(),
    })?;
    let (_, tail) = split_tail(existing.body(content));
    let new_body = format!("{}{}", body.trim(), tail_or_newline(tail));
    Ok(join_at(content, existing.body_start, &new_body, &content[existing.end..]))
}

pub struct Replace<'a> {
    pub search: &'a str,
    pub replacement: &'a str,
    pub regex: bool,
    pub case_sensitive: bool,
    pub section: Option<&'a str>,
}

pub fn build_pattern(search: &str, regex: bool, case_sensitive: bool) -> Result<Regex, StoreError> {
    if search.is_empty() {
        return Err(StoreError::Validation("Search text cannot be empty".to_string()));
    }
    let pattern = if regex {
        search.to_string()
    } else {
        regex::escape(search)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| StoreError::Validation(format!("Invalid regular expression pattern: {}", e)))
}

/// Apply a replacement. Returns the new text (`None` when nothing matched)
/// and the number of replacements.
pub fn search_and_replace(
    path: &Path,
    content: &str,
    request: &Replace<'_>,
) -> Result<(Option<String>, usize), StoreError> {
    let pattern = build_pattern(request.search, request.regex, request.case_sensitive)?;

    let (start, end) = match request.section {
        Some(title) => {
            let outline = section::parse(content);
            let target = outline.find(title).ok_or_else(|| StoreError::SectionNotFound {
                path: path.to_path_buf(),
                section: title.to_string(),
            })?;
            (target.body_start, target.end)
        }
        None => (0, content.len()),
    };
    let scope = &content[start..end];

    let count = pattern.find_iter(scope).count();
    if count == 0 {
        return Ok((None, 0));
    }
    let replaced = if request.regex {
        pattern.replace_all(scope, request.replacement)
    } else {
        pattern.replace_all(scope, NoExpand(request.replacement))
    };

    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..start]);
    out.push_str(&replaced);
    out.push_str(&content[end..]);
    Ok((Some(out), count))
}
