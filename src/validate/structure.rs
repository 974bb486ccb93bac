//! Header hierarchy and section marker rules.

use crate::markdown::scanner::{Line, Scan, Token};
use crate::types::MAX_HEADER_LEVEL;
use crate::validate::{Violation, ViolationKind};
use std::collections::HashMap;

/// A header still waiting for its marker on the next line.
struct PendingHeader<'a> {
    title: &'a str,
    line: usize,
}

#[derive(Default)]
struct State<'a> {
    current_level: usize,
    seen_header: bool,
    pending: Option<PendingHeader<'a>>,
    markers: HashMap<&'a str, usize>,
}

impl<'a> State<'a> {
    fn flush_pending(&mut self, out: &mut Vec<Violation>) {
        if let Some(header) = self.pending.take() {
            out.push(
                Violation::error(
                    header.line,
                    ViolationKind::MissingMarker,
                    format!("Header '{}' is missing its section marker", header.title),
                )
                .suggest(format!(
                    "Add '<!-- Section: {} -->' on the line after the header",
                    header.title
                )),
            );
        }
    }

    fn header(&mut self, line: &Line<'a>, level: usize, title: &'a str, out: &mut Vec<Violation>) {
        let number = line.number;

        if !self.seen_header && level != 1 {
            out.push(
                Violation::error(
                    number,
                    ViolationKind::FirstHeaderLevel,
                    format!(
                        "Document should start with a level 1 header (found level {})",
                        level
                    ),
                )
                .suggest("Start the document with a '# ' header"),
            );
        }

        if level > MAX_HEADER_LEVEL {
            out.push(Violation::error(
                number,
                ViolationKind::HeaderTooDeep,
                format!(
                    "Header level {} exceeds maximum allowed level of {}",
                    level, MAX_HEADER_LEVEL
                ),
            ));
        } else if self.current_level > 0 && level > self.current_level + 1 {
            out.push(
                Violation::error(
                    number,
                    ViolationKind::HeaderLevelJump,
                    format!(
                        "Line {}: Header level jumps from {} to {}. Headers should increment by only one level at a time.",
                        number, self.current_level, level
                    ),
                )
                .suggest(format!("Use level {} header instead", self.current_level + 1)),
            );
        }

        self.seen_header = true;
        self.current_level = level;

        if title.is_empty() {
            out.push(Violation::error(
                number,
                ViolationKind::EmptyHeader,
                "Empty header detected. Headers must contain text.",
            ));
        } else {
            self.pending = Some(PendingHeader { title, line: number });
        }
    }

    fn marker(&mut self, line: &Line<'a>, title: &'a str, out: &mut Vec<Violation>) {
        let Some(header) = self.pending.take() else {
            out.push(
                Violation::error(
                    line.number,
                    ViolationKind::OrphanMarker,
                    format!("Found marker '{}' without a corresponding header", title),
                )
                .suggest("Remove the marker or add its header directly above it"),
            );
            return;
        };

        if header.title != title {
            out.push(
                Violation::error(
                    line.number,
                    ViolationKind::MarkerMismatch,
                    format!("Section marker for '{}' does not match header title", title),
                )
                .suggest(format!(
                    "Change the marker to '<!-- Section: {} -->'",
                    header.title
                )),
            );
        }

        if let Some(first) = self.markers.get(title) {
            out.push(
                Violation::error(
                    line.number,
                    ViolationKind::DuplicateMarker,
                    format!("Duplicate section marker found: '{}'", title),
                )
                .suggest(format!("Section '{}' is already marked on line {}", title, first)),
            );
        } else {
            self.markers.insert(title, line.number);
        }
    }
}

/// Walk the token stream once, collecting every header/marker violation.
/// Lines inside frontmatter and fenced code are never headers or markers.
pub fn check_structure<'a>(scan: &Scan<'a>, out: &mut Vec<Violation>) {
    let mut state = State::default();

    for line in &scan.lines {
        if !matches!(line.token, Token::Marker { .. }) {
            state.flush_pending(out);
        }
        match line.token {
            Token::Header { level, title } => state.header(line, level, title, out),
            Token::Marker { title } => state.marker(line, title, out),
            _ => {}
        }
    }
    state.flush_pending(out);
}
