//! CSV output formatter

use super::{FormatError, ReportFormatter};
use crate::catalog::ListingRow;
use crate::{MatchResult, MismatchKind, ModuleVerdict};

const HEADER: [&str; 7] = [
    "module",
    "verdict",
    "kind",
    "original_line",
    "decoded_line",
    "original_index",
    "decoded_index",
];

impl ReportFormatter for super::CsvFormatter {
    fn format(&self, verdicts: &[ModuleVerdict]) -> Result<String, FormatError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER)?;

        for verdict in verdicts {
            match &verdict.result {
                MatchResult::Matched => {
                    writer.write_record([verdict.module.as_str(), "matched", "", "", "", "", ""])?;
                }
                MatchResult::Mismatch(mismatch) => {
                    let kind = match mismatch.kind {
                        MismatchKind::Divergence => "divergence",
                        MismatchKind::IncompleteStream => "incomplete_stream",
                    };
                    let original = mismatch.original_line().map_or("", |line| line.as_str());
                    let decoded = mismatch.decoded_line().map_or("", |line| line.as_str());
                    let original_index = mismatch.original_index.to_string();
                    let decoded_index = mismatch.decoded_index.to_string();
                    writer.write_record([
                        verdict.module.as_str(),
                        "mismatch",
                        kind,
                        original,
                        decoded,
                        original_index.as_str(),
                        decoded_index.as_str(),
                    ])?;
                }
            }
        }

        finish(writer)
    }

    fn format_listing(&self, rows: &[ListingRow]) -> Result<String, FormatError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            writer.serialize(row)?;
        }
        finish(writer)
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, FormatError> {
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
