//! Text rendering for CLI output.

use crate::document::{DocumentInfo, VersionInfo};
use crate::lock::LockRecord;
use crate::markdown::section::Section;
use crate::validate::{Severity, ValidationReport};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline. Respects NO_COLOR and TTY.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_sections_text(document: &str, sections: &[Section]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(document));
    if sections.is_empty() {
        out.push_str("No sections.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Line", "Level", "Title", "Marker"]);
    for section in sections {
        table.add_row(vec![
            section.line.to_string(),
            section.level.to_string(),
            format!("{}{}", "  ".repeat(section.level.saturating_sub(1)), section.title),
            section.marker.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_documents_text(documents: &[DocumentInfo]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Documents"));
    if documents.is_empty() {
        out.push_str("No documents.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Size", "Modified"]);
    for doc in documents {
        table.add_row(vec![
            doc.name.clone(),
            doc.size.to_string(),
            doc.modified
                .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Total: {} documents.\n", documents.len()));
    out
}

pub fn format_versions_text(document: &str, versions: &[VersionInfo]) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Versions of {}", document))
    );
    if versions.is_empty() {
        out.push_str("No versions saved.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Version", "Path"]);
    for version in versions {
        table.add_row(vec![
            version.number.to_string(),
            version.path.display().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Findings table followed by a one-line verdict.
pub fn format_report_text(document: &str, report: &ValidationReport) -> String {
    let mut out = format!("{}\n\n", format_section_heading(document));
    if !report.violations.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Line", "Severity", "Kind", "Message"]);
        for v in &report.violations {
            let severity = match v.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            let message = match &v.suggestion {
                Some(s) => format!("{}\n{}", v.message, s.dimmed()),
                None => v.message.clone(),
            };
            table.add_row(vec![
                v.line.to_string(),
                severity.to_string(),
                format!("{:?}", v.kind),
                message,
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    if report.is_valid() {
        out.push_str(&format!("{} ({} warnings)\n", "Valid".green(), warnings));
    } else {
        out.push_str(&format!(
            "{} ({} errors, {} warnings)\n",
            "Invalid".red(),
            errors,
            warnings
        ));
    }
    out
}

pub fn format_lock_text(section: &str, holder: Option<&LockRecord>) -> String {
    match holder {
        Some(record) => format!(
            "Section '{}' is locked by {} until {}",
            section,
            record.agent,
            record.expires.to_rfc3339()
        ),
        None => format!("Section '{}' is not locked", section),
    }
}
