//! Output formats for verdict reports and catalog listings

mod csv;
mod json;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::catalog::ListingRow;
use crate::{MatchResult, ModuleVerdict};

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON format (one document)
    Json,
    /// JSON Lines format (one JSON object per line)
    JsonLines,
    /// CSV format (comma-separated values)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" | "json-lines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn ReportFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Errors raised while rendering a report
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Formatter trait for reports
pub trait ReportFormatter {
    /// Format the verdicts of a comparison run
    fn format(&self, verdicts: &[ModuleVerdict]) -> Result<String, FormatError>;

    /// Format numbered catalog rows
    fn format_listing(&self, rows: &[ListingRow]) -> Result<String, FormatError>;
}

/// Format reports in plain text
pub struct TextFormatter;

/// Format reports in JSON
pub struct JsonFormatter;

/// Format reports in JSON Lines
pub struct JsonLinesFormatter;

/// Format reports in CSV
pub struct CsvFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, verdicts: &[ModuleVerdict]) -> Result<String, FormatError> {
        let mut output = String::new();

        for verdict in verdicts {
            match &verdict.result {
                MatchResult::Matched => output.push_str(&format!("{}: ok\n", verdict.module)),
                MatchResult::Mismatch(mismatch) => {
                    output.push_str(&format!("{}: MISMATCH\n", verdict.module));
                    for line in mismatch.to_string().lines() {
                        output.push_str(&format!("    {}\n", line));
                    }
                }
            }
        }

        let failed = verdicts.iter().filter(|verdict| !verdict.result.is_match()).count();
        output.push_str(&format!("\n{} compared, {} mismatched\n", verdicts.len(), failed));

        Ok(output)
    }

    fn format_listing(&self, rows: &[ListingRow]) -> Result<String, FormatError> {
        let mut output = String::new();
        for row in rows {
            output.push_str(&format!("{}\n", row));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Feature, Oracle};

    pub(super) fn create_test_verdicts() -> Vec<ModuleVerdict> {
        let oracle = Oracle::default();
        vec![
            ModuleVerdict {
                module: "JC01".to_string(),
                result: oracle.compare(&["jc _target"], &["jb _target"]),
            },
            ModuleVerdict {
                module: "MOV12".to_string(),
                result: oracle.compare(&["mov ax, 7fffh"], &["mov ax, 7ffeh"]),
            },
            ModuleVerdict {
                module: "8086".to_string(),
                result: oracle.compare(&["nop", "nop"], &["nop"]),
            },
        ]
    }

    pub(super) fn create_test_rows() -> Vec<ListingRow> {
        vec![
            ListingRow {
                index: 54,
                title: "ADC r/m8, r8".to_string(),
                feature: Feature::Cpu8086,
            },
            ListingRow {
                index: 380,
                title: "LGDT m16:32".to_string(),
                feature: Feature::Cpu286Protected,
            },
        ]
    }

    #[test]
    fn test_text_formatter() {
        let result = TextFormatter.format(&create_test_verdicts()).unwrap();

        assert!(result.contains("JC01: ok"));
        assert!(result.contains("MOV12: MISMATCH"));
        assert!(result.contains("    ASM: mov ax, 7fffh"));
        assert!(result.contains("    DIS: mov ax, 7ffeh"));
        assert!(result.contains("    DIS: EOF"));
        assert!(result.ends_with("3 compared, 2 mismatched\n"));
    }

    #[test]
    fn test_text_listing() {
        let result = TextFormatter.format_listing(&create_test_rows()).unwrap();
        assert!(result.starts_with("  54 ADC r/m8, r8"));
        assert!(result.contains("80286 protected mode"));
    }

    #[test]
    fn test_format_round_trips_through_name() {
        for format in OutputFormat::available_formats() {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), *format);
            // Each format can render an empty report
            assert!(format.get_formatter().format(&[]).is_ok());
        }
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
