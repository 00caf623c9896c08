//! Equivalence oracle for original and decoded listings.
//!
//! Two cursors walk the trimmed streams. At each step the current lines are
//! bridged by direct equality, by absorbing a decoder-inserted wait, or by the
//! first applicable alias rule. Anything else stops the walk with a
//! [`Mismatch`]; the oracle never fails on well-formed input.

pub mod alias;
pub mod trim;

use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::compose::DEFAULT_ENTRY_LABEL;
use crate::{normalize, NormalizedLine};
use self::alias::{AliasRule, STANDARD_RULES};

/// Lines of context kept on each side of a mismatch.
pub const REMAINDER_CONTEXT: usize = 4;

const WAIT_MNEMONICS: [&str; 2] = ["wait", "fwait"];

/// How two streams diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Both streams have a current line and no rule bridges them
    Divergence,
    /// One stream ended while the other still has lines
    IncompleteStream,
}

/// Where and why a comparison failed.
///
/// Indices point into the lines as given to the oracle, before trimming,
/// and equal the stream length when that side is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub original_index: usize,
    pub decoded_index: usize,
    /// The original line at the mismatch and a few following it
    pub original_remainder: Vec<NormalizedLine>,
    /// The decoded line at the mismatch and a few following it
    pub decoded_remainder: Vec<NormalizedLine>,
    /// Alias rule that applied to the pair but did not make it equal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'static str>,
}

impl Mismatch {
    pub fn original_line(&self) -> Option<&NormalizedLine> {
        self.original_remainder.first()
    }

    pub fn decoded_line(&self) -> Option<&NormalizedLine> {
        self.decoded_remainder.first()
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |line: Option<&NormalizedLine>| line.map_or_else(|| "EOF".to_string(), |line| line.to_string());

        write!(
            f,
            "mismatch at original line {}, decoded line {}",
            self.original_index + 1,
            self.decoded_index + 1
        )?;
        if let Some(rule) = self.rule {
            write!(f, " (rule `{}` did not apply)", rule)?;
        }
        write!(f, "\nASM: {}\nDIS: {}", show(self.original_line()), show(self.decoded_line()))
    }
}

/// Verdict of one comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MatchResult {
    Matched,
    Mismatch(Mismatch),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched)
    }

    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            MatchResult::Matched => None,
            MatchResult::Mismatch(mismatch) => Some(mismatch),
        }
    }
}

/// What bridged one pair of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "rule", rename_all = "snake_case")]
pub enum Step {
    Equal,
    /// A decoded wait line skipped before an equal pair
    WaitAbsorbed,
    Alias(&'static str),
}

/// The verdict for one named module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleVerdict {
    pub module: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Compares original listings against decoded listings.
#[derive(Debug, Clone)]
pub struct Oracle {
    rules: &'static [AliasRule],
    entry_label: String,
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            rules: STANDARD_RULES,
            entry_label: DEFAULT_ENTRY_LABEL.to_string(),
        }
    }
}

impl Oracle {
    /// An oracle with a custom alias table, tried in slice order.
    pub fn with_rules(rules: &'static [AliasRule]) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn with_entry_label(mut self, label: &str) -> Self {
        self.entry_label = label.to_string();
        self
    }

    pub fn rules(&self) -> &'static [AliasRule] {
        self.rules
    }

    /// Compare raw listing lines. Blank lines, comments and label
    /// definitions are dropped before matching.
    pub fn compare<A: AsRef<str>, B: AsRef<str>>(&self, original: &[A], decoded: &[B]) -> MatchResult {
        self.compare_lines(&normalize::lines(original), &normalize::lines(decoded))
    }

    pub fn compare_lines(&self, original: &[NormalizedLine], decoded: &[NormalizedLine]) -> MatchResult {
        self.compare_traced(original, decoded).0
    }

    /// Compare normalized lines, also returning the step that bridged each
    /// pair up to the verdict.
    pub fn compare_traced(&self, original: &[NormalizedLine], decoded: &[NormalizedLine]) -> (MatchResult, Vec<Step>) {
        let original_body = trim::body(original, &self.entry_label);
        let decoded_body = trim::body(decoded, &self.entry_label);

        let mut a = original_body.start;
        let mut b = decoded_body.start;
        let mut steps = Vec::new();

        while a < original_body.end && b < decoded_body.end {
            let asm = &original[a];
            let dis = &decoded[b];

            if asm == dis {
                steps.push(Step::Equal);
                a += 1;
                b += 1;
                continue;
            }

            if WAIT_MNEMONICS.contains(&dis.mnemonic())
                && !WAIT_MNEMONICS.contains(&asm.mnemonic())
                && b + 1 < decoded_body.end
                && decoded[b + 1] == *asm
            {
                steps.push(Step::WaitAbsorbed);
                b += 1;
                continue;
            }

            match alias::first_applicable(self.rules, asm, dis) {
                Some((rule, rewritten)) if rewritten == *dis => {
                    log::debug!("{}: `{}` ~ `{}`", rule.name, asm, dis);
                    steps.push(Step::Alias(rule.name));
                    a += 1;
                    b += 1;
                }
                Some((rule, _)) => {
                    return (
                        self.mismatch(MismatchKind::Divergence, original, a, decoded, b, Some(rule.name)),
                        steps,
                    );
                }
                None => {
                    return (self.mismatch(MismatchKind::Divergence, original, a, decoded, b, None), steps);
                }
            }
        }

        if a < original_body.end || b < decoded_body.end {
            return (
                self.mismatch(MismatchKind::IncompleteStream, original, a, decoded, b, None),
                steps,
            );
        }

        (MatchResult::Matched, steps)
    }

    fn mismatch(
        &self,
        kind: MismatchKind,
        original: &[NormalizedLine],
        a: usize,
        decoded: &[NormalizedLine],
        b: usize,
        rule: Option<&'static str>,
    ) -> MatchResult {
        let original_end = trim::body(original, &self.entry_label).end;
        let decoded_end = trim::body(decoded, &self.entry_label).end;

        MatchResult::Mismatch(Mismatch {
            kind,
            original_index: a,
            decoded_index: b,
            original_remainder: original[a..original_end].iter().take(REMAINDER_CONTEXT).cloned().collect(),
            decoded_remainder: decoded[b..decoded_end].iter().take(REMAINDER_CONTEXT).cloned().collect(),
            rule,
        })
    }

    /// Compare many independent modules, keeping input order in the result.
    ///
    /// Each item is `(module name, original lines, decoded lines)`.
    pub fn compare_all(&self, items: &[(String, Vec<NormalizedLine>, Vec<NormalizedLine>)], parallel: bool) -> Vec<ModuleVerdict> {
        let verdict = |(module, original, decoded): &(String, Vec<NormalizedLine>, Vec<NormalizedLine>)| {
            let result = self.compare_lines(original, decoded);
            if let MatchResult::Mismatch(mismatch) = &result {
                log::warn!("{}: {}", module, mismatch);
            }
            ModuleVerdict {
                module: module.clone(),
                result,
            }
        };

        let verdicts: Vec<ModuleVerdict> = if parallel {
            items.par_iter().map(verdict).collect()
        } else {
            items.iter().map(verdict).collect()
        };

        let failed = verdicts.iter().filter(|verdict| !verdict.result.is_match()).count();
        log::info!("compared {} modules, {} mismatched", verdicts.len(), failed);
        verdicts
    }
}

/// [`Oracle::compare_all`] with the standard oracle.
pub fn compare_all(items: &[(String, Vec<NormalizedLine>, Vec<NormalizedLine>)], parallel: bool) -> Vec<ModuleVerdict> {
    Oracle::default().compare_all(items, parallel)
}
