//! Positional recognition of module prologue and epilogue lines.

use std::ops::Range;

use crate::NormalizedLine;

/// Processor directives that may follow the entry label.
const CPU_DIRECTIVES: [&str; 7] = ["p8086", "p8087", "p186", "p286", "p286n", "p286p", "p287"];

/// Prologue lines, in the only order they are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prologue {
    Mode,
    Segment,
    Assume,
    Origin,
    EntryLabel,
    Processor,
}

const PROLOGUE: [Prologue; 6] = [
    Prologue::Mode,
    Prologue::Segment,
    Prologue::Assume,
    Prologue::Origin,
    Prologue::EntryLabel,
    Prologue::Processor,
];

impl Prologue {
    fn recognizes(&self, line: &NormalizedLine, label: &str) -> bool {
        match self {
            Prologue::Mode => line.as_str() == "ideal",
            Prologue::Segment => line.mnemonic() == "segment",
            Prologue::Assume => line.mnemonic() == "assume",
            Prologue::Origin => line.mnemonic() == "org",
            Prologue::EntryLabel => line.as_str() == label,
            Prologue::Processor => CPU_DIRECTIVES.contains(&line.mnemonic()),
        }
    }
}

/// The part of `lines` between the structural prologue and epilogue.
///
/// Prologue lines are recognized only at the start and only in their fixed
/// order; each is optional. Epilogue lines (segment end, program end) are
/// recognized only at the end.
pub fn body(lines: &[NormalizedLine], entry_label: &str) -> Range<usize> {
    let label = format!("{}:", entry_label.to_lowercase());

    let mut start = 0;
    for step in PROLOGUE {
        if start < lines.len() && step.recognizes(&lines[start], &label) {
            start += 1;
        }
    }

    let mut end = lines.len();
    if end > start && lines[end - 1].mnemonic() == "end" {
        end -= 1;
    }
    if end > start && lines[end - 1].mnemonic() == "ends" {
        end -= 1;
    }

    start..end
}
