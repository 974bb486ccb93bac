//! Document validation
//!
//! Two layers: structural rules over headers and section markers (these gate
//! every write) and quality checks over the whole text (links, tables, task
//! lists, code fences, frontmatter). Both collect findings instead of stopping
//! at the first one.

pub mod quality;
pub mod structure;

use crate::config::ValidationConfig;
use crate::markdown::scanner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use quality::check_quality;
pub use structure::check_structure;

/// Finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyDocument,
    EmptyHeader,
    HeaderTooDeep,
    FirstHeaderLevel,
    HeaderLevelJump,
    MissingMarker,
    MarkerMismatch,
    DuplicateMarker,
    OrphanMarker,
    Frontmatter,
    CodeBlock,
    Table,
    TaskList,
    BrokenLink,
}

impl ViolationKind {
    /// Header and marker rules, as opposed to text quality checks.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ViolationKind::EmptyHeader
                | ViolationKind::HeaderTooDeep
                | ViolationKind::FirstHeaderLevel
                | ViolationKind::HeaderLevelJump
                | ViolationKind::MissingMarker
                | ViolationKind::MarkerMismatch
                | ViolationKind::DuplicateMarker
                | ViolationKind::OrphanMarker
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// 1-based line number
    pub line: usize,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Violation {
    pub fn error(line: usize, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            severity: Severity::Error,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(line: usize, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(line, kind, message)
        }
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (Suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

/// Collected findings for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Check groups that ran, with whether each passed
    pub checks: Vec<(String, bool)>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, description: &str, passed: bool) {
        self.checks.push((description.to_string(), passed));
    }

    pub fn add(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Run a check group, recording whether it added errors.
    pub fn run(&mut self, description: &str, check: impl FnOnce(&mut Vec<Violation>)) {
        let mut found = Vec::new();
        check(&mut found);
        let passed = !found.iter().any(Violation::is_error);
        self.add_check(description, passed);
        self.violations.extend(found);
    }

    pub fn is_valid(&self) -> bool {
        !self.violations.iter().any(Violation::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_error())
    }

    /// `(is_valid, violations)`, sorted by line.
    pub fn into_parts(mut self) -> (bool, Vec<Violation>) {
        let valid = self.is_valid();
        self.violations.sort_by_key(|v| v.line);
        (valid, self.violations)
    }
}

/// Structural rules only.
pub fn validate_structure(content: &str) -> ValidationReport {
    let scan = scanner::scan(content);
    let mut report = ValidationReport::new();
    report.run("Section markers and header hierarchy", |out| {
        check_structure(&scan, out)
    });
    report
}

/// Structural rules plus every enabled quality check. `doc_dir` anchors
/// relative link targets; without it local links are not checked.
pub fn validate_content(
    content: &str,
    doc_dir: Option<&Path>,
    config: &ValidationConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    if content.trim().is_empty() {
        report.add_check("Document has content", false);
        report.add(
            Violation::error(1, ViolationKind::EmptyDocument, "Empty document")
                .suggest("Add required document content"),
        );
        return report;
    }
    let scan = scanner::scan(content);
    report.run("Section markers and header hierarchy", |out| {
        check_structure(&scan, out)
    });
    check_quality(&scan, content, doc_dir, config, &mut report);
    report
}
