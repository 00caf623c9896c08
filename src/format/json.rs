//! JSON and JSON Lines output formatters

use serde::Serialize;

use super::{FormatError, ReportFormatter};
use crate::catalog::ListingRow;
use crate::ModuleVerdict;

/// Serializable report for JSON output
#[derive(Serialize)]
struct ReportJson<'a> {
    /// Number of modules compared
    compared: usize,
    /// Number of modules that did not match
    mismatched: usize,
    /// Per-module verdicts in input order
    modules: &'a [ModuleVerdict],
}

/// Serializable listing for JSON output
#[derive(Serialize)]
struct ListingJson<'a> {
    forms: &'a [ListingRow],
}

impl ReportFormatter for super::JsonFormatter {
    fn format(&self, verdicts: &[ModuleVerdict]) -> Result<String, FormatError> {
        let report = ReportJson {
            compared: verdicts.len(),
            mismatched: verdicts.iter().filter(|verdict| !verdict.result.is_match()).count(),
            modules: verdicts,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    fn format_listing(&self, rows: &[ListingRow]) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(&ListingJson { forms: rows })?)
    }
}

impl ReportFormatter for super::JsonLinesFormatter {
    fn format(&self, verdicts: &[ModuleVerdict]) -> Result<String, FormatError> {
        lines(verdicts)
    }

    fn format_listing(&self, rows: &[ListingRow]) -> Result<String, FormatError> {
        lines(rows)
    }
}

fn lines<T: Serialize>(items: &[T]) -> Result<String, FormatError> {
    let mut output = String::new();
    for item in items {
        output.push_str(&serde_json::to_string(item)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::{create_test_rows, create_test_verdicts};
    use crate::format::{JsonFormatter, JsonLinesFormatter};
    use serde_json::Value;

    #[test]
    fn test_json_formatter() {
        let result = JsonFormatter.format(&create_test_verdicts()).unwrap();
        let value: Value = serde_json::from_str(&result).unwrap();

        assert_eq!(value["compared"], 3);
        assert_eq!(value["mismatched"], 2);
        assert_eq!(value["modules"][0]["module"], "JC01");
        assert_eq!(value["modules"][0]["verdict"], "matched");
        assert_eq!(value["modules"][1]["decoded_remainder"][0], "mov ax, 7ffeh");
        assert_eq!(value["modules"][2]["kind"], "incomplete_stream");
    }

    #[test]
    fn test_json_lines_formatter() {
        let result = JsonLinesFormatter.format(&create_test_verdicts()).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 3);

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["module"], "MOV12");
        assert_eq!(second["original_index"], 0);
    }

    #[test]
    fn test_json_listing() {
        let result = JsonFormatter.format_listing(&create_test_rows()).unwrap();
        let value: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(value["forms"][1]["title"], "LGDT m16:32");
        assert_eq!(value["forms"][1]["feature"], "cpu286-protected");

        let lines = JsonLinesFormatter.format_listing(&create_test_rows()).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }
}
