//! Whole-text quality checks: frontmatter, code fences, tables, task lists
//! and local links.

use crate::config::ValidationConfig;
use crate::markdown::scanner::{Line, Scan, Token};
use crate::validate::{ValidationReport, Violation, ViolationKind};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*([^)\s]*)(?:\s+"[^"]*")?\s*\)"#).expect("valid link regex")
});

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`+[^`]*`+").expect("valid inline code regex"));

static ALIGNMENT_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-+:?$").expect("valid alignment regex"));

static TASK_NO_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\[[^\]]?\]").expect("valid task regex"));

static TASK_EXTRA_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+] {2,}\[[ xX]\]").expect("valid task regex"));

static TASK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+] \[([^\]]?)\](.?)").expect("valid task regex"));

const TASK_SUGGESTION: &str = "Use exactly one space after dash: '- [ ]' or '- [x]'";

/// Run every quality check the config enables, one check group each.
pub fn check_quality(
    scan: &Scan<'_>,
    content: &str,
    doc_dir: Option<&Path>,
    config: &ValidationConfig,
    report: &mut ValidationReport,
) {
    if config.check_frontmatter {
        report.run("YAML frontmatter", |out| check_frontmatter(scan, content, out));
    }
    if config.check_code_blocks {
        report.run("Code blocks", |out| check_code_blocks(scan, out));
    }
    if config.check_tables {
        report.run("Tables", |out| check_tables(scan, out));
    }
    if config.check_task_lists {
        report.run("Task lists", |out| check_task_lists(scan, out));
    }
    if config.check_links {
        report.run("Links and images", |out| check_links(scan, doc_dir, out));
    }
}

pub fn check_frontmatter(scan: &Scan<'_>, content: &str, out: &mut Vec<Violation>) {
    if scan.unclosed_frontmatter {
        out.push(
            Violation::error(1, ViolationKind::Frontmatter, "Unclosed YAML frontmatter block")
                .suggest("Add closing '---' delimiter"),
        );
        return;
    }
    let Some(range) = scan.frontmatter.clone() else {
        return;
    };
    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&content[range]) {
        // YAML starts on line 2, after the opening delimiter
        let line = e.location().map(|l| l.line() + 1).unwrap_or(1);
        out.push(
            Violation::error(line, ViolationKind::Frontmatter, e.to_string())
                .suggest("Fix YAML syntax in frontmatter"),
        );
    }
}

pub fn check_code_blocks(scan: &Scan<'_>, out: &mut Vec<Violation>) {
    for line in &scan.lines {
        if let Token::FenceOpen { info: "" } = line.token {
            out.push(
                Violation::warning(line.number, ViolationKind::CodeBlock, "Missing language identifier")
                    .suggest("Add language after opening ```"),
            );
        }
    }
    if let Some(line) = scan.unclosed_fence {
        out.push(
            Violation::error(line, ViolationKind::CodeBlock, "Unclosed code block")
                .suggest("Add closing ``` delimiter"),
        );
    }
}

fn table_cells(text: &str) -> Option<Vec<&str>> {
    let trimmed = text.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('|') || !trimmed.ends_with('|') {
        return None;
    }
    Some(trimmed[1..trimmed.len() - 1].split('|').map(str::trim).collect())
}

enum TableState {
    Outside,
    /// Header row seen, alignment row expected next
    Header { columns: usize, line: usize },
    Body { columns: usize },
    /// Malformed header block; remaining rows are not checked
    Skipping,
}

pub fn check_tables(scan: &Scan<'_>, out: &mut Vec<Violation>) {
    let mut state = TableState::Outside;

    for line in &scan.lines {
        let cells = match line.token {
            Token::Text => table_cells(line.text),
            _ => None,
        };

        state = match (state, cells) {
            (TableState::Header { .. }, None) => {
                out.push(missing_alignment(line.number));
                TableState::Outside
            }
            (_, None) => TableState::Outside,
            (TableState::Outside, Some(cells)) => TableState::Header {
                columns: cells.len(),
                line: line.number,
            },
            (TableState::Header { columns, .. }, Some(cells)) => {
                check_alignment_row(line, columns, &cells, out)
            }
            (TableState::Body { columns }, Some(cells)) => {
                if cells.len() != columns {
                    out.push(
                        Violation::error(
                            line.number,
                            ViolationKind::Table,
                            format!(
                                "Table row at line {} has {} columns, expected {}",
                                line.number,
                                cells.len(),
                                columns
                            ),
                        )
                        .suggest("Ensure all rows have consistent column counts"),
                    );
                }
                TableState::Body { columns }
            }
            (TableState::Skipping, Some(_)) => TableState::Skipping,
        };
    }

    if let TableState::Header { line, .. } = state {
        // a lone header row on the last line is left alone
        if line < scan.lines.len() {
            out.push(missing_alignment(line + 1));
        }
    }
}

fn missing_alignment(line: usize) -> Violation {
    Violation::error(line, ViolationKind::Table, "Missing alignment row")
        .suggest("Add a valid alignment row (e.g., | --- |)")
}

fn check_alignment_row(
    line: &Line<'_>,
    columns: usize,
    cells: &[&str],
    out: &mut Vec<Violation>,
) -> TableState {
    if cells.len() != columns {
        out.push(
            Violation::error(
                line.number,
                ViolationKind::Table,
                format!(
                    "Alignment row has {} columns, expected {}",
                    cells.len(),
                    columns
                ),
            )
            .suggest("Ensure alignment row matches header columns"),
        );
        return TableState::Skipping;
    }
    if !cells.iter().all(|cell| ALIGNMENT_CELL.is_match(cell)) {
        out.push(
            Violation::error(line.number, ViolationKind::Table, "Invalid alignment row format")
                .suggest("Use | --- |, | :--- |, | ---: |, or | :---: | cells"),
        );
        return TableState::Skipping;
    }
    TableState::Body { columns }
}

pub fn check_task_lists(scan: &Scan<'_>, out: &mut Vec<Violation>) {
    for line in &scan.lines {
        if line.token != Token::Text {
            continue;
        }
        let text = line.text;
        let message = if TASK_NO_SPACE.is_match(text) {
            Some("Missing space after dash in task list marker (e.g., '-[ ]' instead of '- [ ]')")
        } else if TASK_EXTRA_SPACE.is_match(text) {
            Some("Extra spaces after dash in task list marker (e.g., '-  [ ]' instead of '- [ ]')")
        } else if let Some(caps) = TASK_MARKER.captures(text) {
            let inner = caps.get(1).map_or("", |m| m.as_str());
            let next = caps.get(2).map_or("", |m| m.as_str());
            if next == "(" {
                // `- [text](url)` is a link in a list, not a task
                None
            } else if !matches!(inner, " " | "x" | "X") {
                Some("Invalid task list marker")
            } else if !next.is_empty() && !next.starts_with(char::is_whitespace) {
                Some("Missing space after closing bracket in task list marker (e.g., '- [ ]text' instead of '- [ ] text')")
            } else {
                None
            }
        } else {
            None
        };
        if let Some(message) = message {
            out.push(
                Violation::error(line.number, ViolationKind::TaskList, message)
                    .suggest(TASK_SUGGESTION),
            );
        }
    }
}

fn is_external(target: &str) -> bool {
    target.starts_with('#')
        || target.starts_with("mailto:")
        || target.starts_with("data:")
        || target.contains("://")
}

/// Relative targets are checked against `doc_dir`; without one only empty
/// targets are reported.
pub fn check_links(scan: &Scan<'_>, doc_dir: Option<&Path>, out: &mut Vec<Violation>) {
    for line in &scan.lines {
        if line.token != Token::Text {
            continue;
        }
        let text = INLINE_CODE.replace_all(line.text, "");
        for caps in LINK.captures_iter(&text) {
            let is_image = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let target = caps.get(3).map_or("", |m| m.as_str());

            if target.is_empty() {
                out.push(
                    Violation::error(line.number, ViolationKind::BrokenLink, "Empty link URL")
                        .suggest("Add a target between the parentheses"),
                );
                continue;
            }
            if is_external(target) {
                continue;
            }
            let Some(dir) = doc_dir else {
                continue;
            };
            let local = target
                .split(['#', '?'])
                .next()
                .unwrap_or(target);
            if local.is_empty() || dir.join(local).exists() {
                continue;
            }
            let violation = if is_image {
                Violation::error(
                    line.number,
                    ViolationKind::BrokenLink,
                    format!("Broken image link: {}", target),
                )
                .suggest("Ensure the image file exists in the correct location and the path is correct")
            } else {
                Violation::error(
                    line.number,
                    ViolationKind::BrokenLink,
                    format!("Broken file link: {}", target),
                )
                .suggest("Check if the linked file exists and the path is correct")
            };
            out.push(violation);
        }
    }
}
