//! Finalization: export a validated draft into the finalized directory,
//! through an external converter for anything other than Markdown.

use crate::access::AccessOptions;
use crate::config::ConverterConfig;
use crate::document::DocumentStore;
use crate::error::{AccessKind, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Md,
    Pdf,
    Html,
    Docx,
    Latex,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Docx => "docx",
            OutputFormat::Latex => "tex",
        }
    }

    fn converter_args(&self, config: &ConverterConfig) -> Vec<String> {
        match self {
            OutputFormat::Pdf => vec![format!("--pdf-engine={}", config.pdf_engine)],
            OutputFormat::Html => vec!["--standalone".to_string()],
            OutputFormat::Latex => vec!["--top-level-division=chapter".to_string()],
            OutputFormat::Md | OutputFormat::Docx => Vec::new(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Md => "md",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Docx => "docx",
            OutputFormat::Latex => "latex",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(OutputFormat::Md),
            "pdf" => Ok(OutputFormat::Pdf),
            "html" => Ok(OutputFormat::Html),
            "docx" => Ok(OutputFormat::Docx),
            "latex" | "tex" => Ok(OutputFormat::Latex),
            other => Err(StoreError::Validation(format!(
                "Unsupported output format '{}' (expected md, pdf, html, docx or latex)",
                other
            ))),
        }
    }
}

/// Make sure `program` can be run, as a precondition rather than a crash.
fn locate_program(program: &str, role: &str) -> Result<PathBuf, StoreError> {
    which::which(program).map_err(|_| {
        StoreError::Precondition(format!("{} '{}' not found on PATH", role, program))
    })
}

fn run_converter(
    config: &ConverterConfig,
    converter: &Path,
    input: &Path,
    output: &Path,
    format: OutputFormat,
) -> Result<(), StoreError> {
    let mut command = Command::new(converter);
    command
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(format.converter_args(config))
        .args(&config.extra_args);
    debug!(?command, "Running converter");

    let result = command
        .output()
        .map_err(|e| StoreError::io(converter, e))?;
    if !result.status.success() {
        return Err(StoreError::Conversion {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}

impl DocumentStore {
    /// Export `name` to the finalized directory as `format` and return the
    /// output path. The draft must pass full validation, and an existing
    /// output is never overwritten.
    pub fn finalize(&self, name: &str, format: OutputFormat) -> Result<PathBuf, StoreError> {
        let path = self.resolve(name, AccessOptions::read())?;

        let report = self.validate_document(name)?;
        if !report.is_valid() {
            let (_, violations) = report.into_parts();
            return Err(StoreError::Structural {
                path,
                violations: violations.into_iter().filter(|v| v.is_error()).collect(),
            });
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = self
            .dirs()
            .finalized
            .join(format!("{}.{}", stem, format.extension()));
        if output.exists() {
            return Err(StoreError::access(&output, AccessKind::AlreadyExists));
        }

        match format {
            OutputFormat::Md => {
                let content = self.read_resolved(&path)?;
                self.writer()
                    .write_text(&output, &content, self.encoding())?;
            }
            _ => {
                let converter_config = &self.config().converter;
                let converter = locate_program(&converter_config.program, "Converter")?;
                if format == OutputFormat::Pdf {
                    locate_program(&converter_config.pdf_engine, "PDF engine")?;
                }
                run_converter(converter_config, &converter, &path, &output, format)?;
            }
        }

        info!(source = %path.display(), output = %output.display(), %format, "Finalized document");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!("tex".parse::<OutputFormat>().unwrap(), OutputFormat::Latex);
        assert!("odt".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Latex.extension(), "tex");
    }

    #[test]
    fn test_converter_args() {
        let config = ConverterConfig::default();
        assert_eq!(
            OutputFormat::Pdf.converter_args(&config),
            vec!["--pdf-engine=xelatex".to_string()]
        );
        assert_eq!(
            OutputFormat::Html.converter_args(&config),
            vec!["--standalone".to_string()]
        );
        assert!(OutputFormat::Docx.converter_args(&config).is_empty());
    }

    #[test]
    fn test_missing_program_is_precondition() {
        let err = locate_program("marksmith-no-such-converter", "Converter").unwrap_err();
        assert!(matches!(err, StoreError::Precondition(_)));
    }
}
