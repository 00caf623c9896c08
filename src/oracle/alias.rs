//! Alias rules: the spellings a decoder may legitimately use for a line.
//!
//! Every rule is directional. It recognizes an original line and the shape of
//! the decoded line facing it, and rewrites the original into the decoder's
//! spelling; the engine then tests the rewrite for equality. Rules are tried
//! in table order and the first applicable one decides.

use crate::operand::{REG16, REG8, SREG_CS};
use crate::NormalizedLine;

/// A textual transform from original spelling to decoder spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Replace the mnemonic, keeping operands: `(original, decoded)` pairs
    Rename(&'static [(&'static str, &'static str)]),
    /// Append a suffix to the mnemonic. `with_operands` selects whether the
    /// rule covers the operand-less or the operand-bearing spelling
    Suffix {
        mnemonics: &'static [&'static str],
        suffix: &'static str,
        with_operands: bool,
    },
    /// Replace one whole line by another
    Replace {
        original: &'static str,
        decoded: &'static str,
    },
    /// Drop a memory size keyword the instruction's operands already imply
    ElideSize,
    /// `lea r, [word X]` as `mov r, X`
    LeaAsMov,
    /// Two-operand instructions whose operands commute
    SwapOperands(&'static [&'static str]),
    /// `m a, a, n` as `m a, n`
    CollapseDuplicateSource(&'static str),
    /// Operand-less mnemonic with a suffix removed
    DropSuffix {
        mnemonics: &'static [&'static str],
        suffix: &'static str,
    },
    /// Operand-less mnemonic with a suffix appended and operands made explicit
    ExplicitOperands {
        mnemonics: &'static [&'static str],
        suffix: &'static str,
        operands: &'static [&'static str],
    },
    /// Coprocessor `f.. st, x` as `f.. x`
    ImplicitDestination,
    /// A single default operand dropped
    DefaultOperandElided {
        mnemonics: &'static [&'static str],
        operand: &'static str,
    },
    /// Stack top `st` written `st(0)`
    StackTopSpelling,
}

/// One named entry of the alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasRule {
    pub name: &'static str,
    pub transform: Transform,
}

const CONDITIONAL_JUMPS: &[(&str, &str)] = &[
    ("jc", "jb"),
    ("jz", "je"),
    ("jna", "jbe"),
    ("jnae", "jb"),
    ("jnb", "jae"),
    ("jnbe", "ja"),
    ("jnc", "jae"),
    ("jng", "jle"),
    ("jnge", "jl"),
    ("jnl", "jge"),
    ("jnle", "jg"),
    ("jnp", "jpo"),
    ("jnz", "jne"),
    ("jp", "jpe"),
];

const SIZE_KEYWORDS: [&str; 4] = ["byte", "word", "dword", "fword"];

/// Instructions whose memory operand size is fixed by the opcode.
const SIZE_IMPLIED: &[&str] = &[
    "lea", "bound", "lds", "les", "lgdt", "lidt", "sgdt", "sidt", "lldt", "sldt", "lmsw", "smsw", "ltr",
    "str", "verr", "verw", "arpl", "lar", "lsl", "call", "jmp", "push", "pop",
];

/// `cl` and `1` are counts here, not sized operands.
const SHIFTS: &[&str] = &["rcl", "rcr", "rol", "ror", "sal", "sar", "shl", "shr"];

/// The standard alias table, in priority order.
pub static STANDARD_RULES: &[AliasRule] = &[
    AliasRule {
        name: "conditional jump synonym",
        transform: Transform::Rename(CONDITIONAL_JUMPS),
    },
    AliasRule {
        name: "loop synonym",
        transform: Transform::Rename(&[("loopz", "loope"), ("loopnz", "loopne")]),
    },
    AliasRule {
        name: "shift synonym",
        transform: Transform::Rename(&[("sal", "shl")]),
    },
    AliasRule {
        name: "exchange as no-op",
        transform: Transform::Replace {
            original: "xchg ax, ax",
            decoded: "nop",
        },
    },
    AliasRule {
        name: "width-suffixed push/pop",
        transform: Transform::Suffix {
            mnemonics: &["iret", "popf", "pushf", "popa", "pusha"],
            suffix: "w",
            with_operands: false,
        },
    },
    AliasRule {
        name: "near return",
        transform: Transform::Suffix {
            mnemonics: &["ret"],
            suffix: "n",
            with_operands: false,
        },
    },
    AliasRule {
        name: "near return with pop count",
        transform: Transform::Suffix {
            mnemonics: &["ret"],
            suffix: "n",
            with_operands: true,
        },
    },
    AliasRule {
        name: "breakpoint",
        transform: Transform::Replace {
            original: "int 3",
            decoded: "int3",
        },
    },
    AliasRule {
        name: "operand size elided",
        transform: Transform::ElideSize,
    },
    AliasRule {
        name: "lea as mov",
        transform: Transform::LeaAsMov,
    },
    AliasRule {
        name: "commutative operands",
        transform: Transform::SwapOperands(&["test", "xchg"]),
    },
    AliasRule {
        name: "duplicate multiply source",
        transform: Transform::CollapseDuplicateSource("imul"),
    },
    AliasRule {
        name: "wait as fwait",
        transform: Transform::Replace {
            original: "wait",
            decoded: "fwait",
        },
    },
    AliasRule {
        name: "no-wait control",
        transform: Transform::Rename(&[
            ("fnclex", "fclex"),
            ("fndisi", "fdisi"),
            ("fneni", "feni"),
            ("fninit", "finit"),
        ]),
    },
    AliasRule {
        name: "pop arithmetic without suffix",
        transform: Transform::DropSuffix {
            mnemonics: &["faddp", "fsubp", "fsubrp"],
            suffix: "p",
        },
    },
    AliasRule {
        name: "implicit st(1)",
        transform: Transform::ExplicitOperands {
            mnemonics: &["fcom", "fcomp", "ffree", "fld", "fst", "fstp", "fxch"],
            suffix: "",
            operands: &["st(1)"],
        },
    },
    AliasRule {
        name: "pop with explicit pair",
        transform: Transform::ExplicitOperands {
            mnemonics: &["fdivp", "fdivrp", "fmulp"],
            suffix: "",
            operands: &["st(1)", "st"],
        },
    },
    AliasRule {
        name: "non-pop as pop pair",
        transform: Transform::ExplicitOperands {
            mnemonics: &["fdiv", "fdivr", "fmul"],
            suffix: "p",
            operands: &["st(1)", "st"],
        },
    },
    AliasRule {
        name: "implicit st destination",
        transform: Transform::ImplicitDestination,
    },
    AliasRule {
        name: "default stack position elided",
        transform: Transform::DefaultOperandElided {
            mnemonics: &["fcom", "fcomp", "fxch"],
            operand: "st(1)",
        },
    },
    AliasRule {
        name: "stack top spelling",
        transform: Transform::StackTopSpelling,
    },
];

impl AliasRule {
    /// The original rewritten into decoder spelling, if this rule applies to
    /// the pair. Applying does not imply the rewrite equals `decoded`.
    pub fn rewrite(&self, original: &NormalizedLine, decoded: &NormalizedLine) -> Option<NormalizedLine> {
        let mnemonic = original.mnemonic();
        let operands = original.operands();
        let same_mnemonic = mnemonic == decoded.mnemonic();

        match self.transform {
            Transform::Rename(pairs) => pairs
                .iter()
                .find(|(from, to)| *from == mnemonic && *to == decoded.mnemonic())
                .map(|(_, to)| original.with_mnemonic(to)),

            Transform::Suffix {
                mnemonics,
                suffix,
                with_operands,
            } => {
                let renamed = format!("{}{}", mnemonic, suffix);
                (mnemonics.contains(&mnemonic)
                    && operands.is_empty() != with_operands
                    && decoded.mnemonic() == renamed)
                    .then(|| original.with_mnemonic(&renamed))
            }

            Transform::Replace {
                original: from,
                decoded: to,
            } => {
                let replacement = NormalizedLine::new(to);
                (original.as_str() == from && decoded.mnemonic() == replacement.mnemonic()).then_some(replacement)
            }

            Transform::ElideSize => {
                let keyword = SIZE_KEYWORDS.iter().find(|keyword| {
                    let marker = format!("[{} ", keyword);
                    operands.iter().any(|op| op.starts_with(&marker)) && !decoded.as_str().contains(&marker)
                })?;
                if !same_mnemonic || !size_implied(mnemonic, &operands) {
                    return None;
                }
                let marker = format!("[{} ", keyword);
                let elided: Vec<String> = operands.iter().map(|op| op.replacen(&marker, "[", 1)).collect();
                Some(NormalizedLine::from_parts(mnemonic, &elided))
            }

            Transform::LeaAsMov => {
                if mnemonic != "lea" || decoded.mnemonic() != "mov" || operands.len() != 2 {
                    return None;
                }
                let address = operands[1].strip_prefix("[word ")?.strip_suffix(']')?;
                Some(NormalizedLine::from_parts("mov", &[operands[0], address]))
            }

            Transform::SwapOperands(mnemonics) => (same_mnemonic
                && mnemonics.contains(&mnemonic)
                && operands.len() == 2
                && decoded.operands().len() == 2)
                .then(|| NormalizedLine::from_parts(mnemonic, &[operands[1], operands[0]])),

            Transform::CollapseDuplicateSource(target) => (same_mnemonic
                && mnemonic == target
                && operands.len() == 3
                && operands[0] == operands[1]
                && decoded.operands().len() == 2)
                .then(|| NormalizedLine::from_parts(mnemonic, &[operands[0], operands[2]])),

            Transform::DropSuffix { mnemonics, suffix } => {
                let stripped = mnemonic.strip_suffix(suffix)?;
                (mnemonics.contains(&mnemonic) && operands.is_empty() && decoded.mnemonic() == stripped)
                    .then(|| NormalizedLine::from_parts::<&str>(stripped, &[]))
            }

            Transform::ExplicitOperands {
                mnemonics,
                suffix,
                operands: explicit,
            } => {
                let renamed = format!("{}{}", mnemonic, suffix);
                (mnemonics.contains(&mnemonic) && operands.is_empty() && decoded.mnemonic() == renamed)
                    .then(|| NormalizedLine::from_parts(&renamed, explicit))
            }

            Transform::ImplicitDestination => (same_mnemonic
                && mnemonic.starts_with('f')
                && operands.len() == 2
                && operands[0] == "st"
                && decoded.operands().len() == 1)
                .then(|| NormalizedLine::from_parts(mnemonic, &[operands[1]])),

            Transform::DefaultOperandElided { mnemonics, operand } => (same_mnemonic
                && mnemonics.contains(&mnemonic)
                && operands == [operand]
                && decoded.operands().is_empty())
                .then(|| NormalizedLine::from_parts::<&str>(mnemonic, &[])),

            Transform::StackTopSpelling => {
                let facing = decoded.operands();
                if !same_mnemonic || facing.len() != operands.len() {
                    return None;
                }
                let respelled: Vec<&str> = operands
                    .iter()
                    .zip(&facing)
                    .map(|(op, other)| if *op == "st" && *other == "st(0)" { "st(0)" } else { *op })
                    .collect();
                (respelled != operands).then(|| NormalizedLine::from_parts(mnemonic, &respelled))
            }
        }
    }
}

/// Whether the width of a memory operand follows from the rest of the line.
fn size_implied(mnemonic: &str, operands: &[&str]) -> bool {
    if SIZE_IMPLIED.contains(&mnemonic) {
        return true;
    }
    !SHIFTS.contains(&mnemonic) && operands.iter().any(|op| is_register(op))
}

fn is_register(operand: &str) -> bool {
    REG8.iter()
        .chain(REG16.iter())
        .chain(SREG_CS.iter())
        .any(|register| register.eq_ignore_ascii_case(operand))
}

/// The first rule in `rules` that applies, with its rewrite of `original`.
pub fn first_applicable<'r>(
    rules: &'r [AliasRule],
    original: &NormalizedLine,
    decoded: &NormalizedLine,
) -> Option<(&'r AliasRule, NormalizedLine)> {
    rules
        .iter()
        .find_map(|rule| rule.rewrite(original, decoded).map(|rewritten| (rule, rewritten)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolve(original: &str, decoded: &str) -> Option<(&'static str, bool)> {
        let original = NormalizedLine::new(original);
        let decoded = NormalizedLine::new(decoded);
        first_applicable(STANDARD_RULES, &original, &decoded).map(|(rule, rewritten)| (rule.name, rewritten == decoded))
    }

    #[rstest]
    #[case("jc _target", "jb _target", "conditional jump synonym")]
    #[case("jnz _target", "jne _target", "conditional jump synonym")]
    #[case("loopz _target", "loope _target", "loop synonym")]
    #[case("sal al, 1", "shl al, 1", "shift synonym")]
    #[case("xchg ax, ax", "nop", "exchange as no-op")]
    #[case("pushf", "pushfw", "width-suffixed push/pop")]
    #[case("iret", "iretw", "width-suffixed push/pop")]
    #[case("ret", "retn", "near return")]
    #[case("ret 4", "retn 4", "near return with pop count")]
    #[case("int 3", "int3", "breakpoint")]
    #[case("adc [byte bx+si], al", "adc [bx+si], al", "operand size elided")]
    #[case("mov [word cs:1234h], ds", "mov [cs:1234h], ds", "operand size elided")]
    #[case("lgdt [fword bx+7fh]", "lgdt [bx+7fh]", "operand size elided")]
    #[case("lea ax, [word 1234h]", "mov ax, 1234h", "lea as mov")]
    #[case("test al, cl", "test cl, al", "commutative operands")]
    #[case("xchg [byte bx], al", "xchg al, [byte bx]", "commutative operands")]
    #[case("imul ax, ax, 7fh", "imul ax, 7fh", "duplicate multiply source")]
    #[case("wait", "fwait", "wait as fwait")]
    #[case("fninit", "finit", "no-wait control")]
    #[case("faddp", "fadd", "pop arithmetic without suffix")]
    #[case("fxch", "fxch st(1)", "implicit st(1)")]
    #[case("fmulp", "fmulp st(1), st", "pop with explicit pair")]
    #[case("fdivr", "fdivrp st(1), st", "non-pop as pop pair")]
    #[case("fadd st, st(7)", "fadd st(7)", "implicit st destination")]
    #[case("fcom st(1)", "fcom", "default stack position elided")]
    #[case("fadd st(1), st", "fadd st(1), st(0)", "stack top spelling")]
    #[case("fadd st, st", "fadd st, st(0)", "stack top spelling")]
    #[case("fadd st, st", "fadd st(0), st", "stack top spelling")]
    #[case("fsub st, st(1)", "fsub st(0), st(1)", "stack top spelling")]
    fn test_rule_bridges_pair(#[case] original: &str, #[case] decoded: &str, #[case] rule: &str) {
        assert_eq!(resolve(original, decoded), Some((rule, true)));
    }

    #[rstest]
    #[case("mov ax, 7fffh", "mov ax, 7ffeh")]
    #[case("jb _target", "jc _target")]
    #[case("nop", "xchg ax, ax")]
    #[case("fadd [dword 90a0h]", "fadd [90a0h]")]
    #[case("inc [byte bx]", "inc [bx]")]
    #[case("shl [byte bx], cl", "shl [bx], cl")]
    fn test_no_rule_applies(#[case] original: &str, #[case] decoded: &str) {
        assert_eq!(resolve(original, decoded), None);
    }

    #[test]
    fn test_first_applicable_rule_decides() {
        // The shift synonym applies first; its rewrite keeps the size keyword
        // and no later rule gets a chance to drop it.
        assert_eq!(
            resolve("sal [byte bx], cl", "shl [bx], cl"),
            Some(("shift synonym", false))
        );
    }

    #[test]
    fn test_rule_names_are_unique() {
        let mut names: Vec<&str> = STANDARD_RULES.iter().map(|rule| rule.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), STANDARD_RULES.len());
    }

    #[test]
    fn test_lea_requires_word_address() {
        assert_eq!(resolve("lea ax, [bx+si]", "mov ax, bx+si"), None);
    }
}
