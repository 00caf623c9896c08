//! Instruction catalog: every instruction form under test, grouped by feature.
//!
//! The tables are authored in reference-manual notation and parsed into
//! [`OperandTemplate`]s once, when the standard catalog is first requested.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Serialize;

use crate::operand::OperandTemplate;
use crate::{Feature, GenerationError};

/// One feature's worth of catalog source data.
#[derive(Debug, Clone, Copy)]
pub struct TableGroup {
    pub feature: Feature,
    /// Instructions taking no operands, including prefixed string forms
    pub bare: &'static [&'static str],
    /// Operand-bearing forms as `(mnemonic, [notation, ...])`
    pub forms: &'static [(&'static str, &'static [&'static str])],
}

const BARE_8086: &[&str] = &[
    "AAA", "AAD", "AAM", "AAS", "CBW", "CLC", "CLD", "CLI", "CMC", "CMPSB", "CMPSW", "CWD", "DAA",
    "DAS", "HLT", "INTO", "IRET", "IRETW", "LAHF", "LODSB", "LODSW", "MOVSB", "MOVSW", "NOP", "POPF",
    "POPFW", "PUSHF", "PUSHFW", "REP   MOVSB", "REP   MOVSW", "REP   STOSB", "REP   STOSW",
    "REPE  CMPSB", "REPE  CMPSW", "REPE  SCASB", "REPE  SCASW", "REPNE CMPSB", "REPNE CMPSW",
    "REPNE SCASB", "REPNE SCASW", "RET", "RETF", "RETN", "SAHF", "SCASB", "SCASW", "STC", "STD",
    "STI", "STOSB", "STOSW", "WAIT", "XLATB",
];

const BARE_8087: &[&str] = &[
    "F2XM1", "FABS", "FADD", "FADDP", "FCHS", "FCLEX", "FNCLEX", "FCOM", "FCOMP", "FCOMPP",
    "FDECSTP", "FDISI", "FNDISI", "FDIV", "FDIVP", "FDIVR", "FDIVRP", "FENI", "FNENI", "FFREE",
    "FINCSTP", "FINIT", "FNINIT", "FLD", "FLDLG2", "FLDLN2", "FLDL2E", "FLDL2T", "FLDPI", "FLDZ",
    "FLD1", "FMUL", "FMULP", "FNOP", "FPATAN", "FPREM", "FPTAN", "FRNDINT", "FSCALE", "FSQRT", "FST",
    "FSTP", "FSUB", "FSUBP", "FSUBR", "FSUBRP", "FTST", "FXAM", "FXCH", "FXTRACT", "FYL2X",
    "FYL2XP1", "FWAIT",
];

const BARE_286: &[&str] = &[
    "INSB", "INSW", "LEAVE", "OUTSB", "OUTSW", "PUSHA", "REP INSB", "REP INSW", "REP OUTSB",
    "REP OUTSW",
];

const BARE_286_PROTECTED: &[&str] = &["CLTS"];

const BARE_287: &[&str] = &["FSETPM"];

const FORMS_8086: &[(&str, &[&str])] = &[
    ("ADC", &["r/m8", "r8"]),
    ("ADC", &["r/m16", "r16"]),
    ("ADC", &["r8", "r/m8"]),
    ("ADC", &["r16", "r/m16"]),
    ("ADC", &["AL", "imm8"]),
    ("ADC", &["AX", "imm16"]),
    ("ADC", &["r/m8", "imm8"]),
    ("ADC", &["r/m16", "imm16"]),
    ("ADC", &["r/m16", "imm8"]),
    ("ADD", &["AL", "imm8"]),
    ("ADD", &["AX", "imm16"]),
    ("ADD", &["r/m8", "imm8"]),
    ("ADD", &["r/m16", "imm16"]),
    ("ADD", &["r/m16", "imm8"]),
    ("ADD", &["r/m8", "r8"]),
    ("ADD", &["r/m16", "r16"]),
    ("ADD", &["r8", "r/m8"]),
    ("ADD", &["r16", "r/m16"]),
    ("AND", &["r/m8", "r8"]),
    ("AND", &["r/m16", "r16"]),
    ("AND", &["r8", "r/m8"]),
    ("AND", &["r16", "r/m16"]),
    ("AND", &["AL", "imm8"]),
    ("AND", &["AX", "imm16"]),
    ("AND", &["r/m8", "imm8"]),
    ("AND", &["r/m16", "imm16"]),
    ("AND", &["r/m16", "imm8"]),
    ("CALL", &["rel16"]),
    ("CALL", &["r/m16"]),
    ("CMP", &["AL", "imm8"]),
    ("CMP", &["AX", "imm16"]),
    ("CMP", &["r/m8", "imm8"]),
    ("CMP", &["r/m16", "imm16"]),
    ("CMP", &["r/m16", "imm8"]),
    ("CMP", &["r/m8", "r8"]),
    ("CMP", &["r/m16", "r16"]),
    ("CMP", &["r8", "r/m8"]),
    ("CMP", &["r16", "r/m16"]),
    ("DEC", &["r/m8"]),
    ("DEC", &["r/m16"]),
    ("DEC", &["r16"]),
    ("DIV", &["r/m8"]),
    ("DIV", &["r/m16"]),
    ("IDIV", &["r/m8"]),
    ("IDIV", &["r/m16"]),
    ("IMUL", &["r/m8"]),
    ("IMUL", &["r/m16"]),
    ("IN", &["AL", "imm8"]),
    ("IN", &["AX", "imm8"]),
    ("IN", &["AL", "DX"]),
    ("IN", &["AX", "DX"]),
    ("INC", &["r/m8"]),
    ("INC", &["r/m16"]),
    ("INC", &["r16"]),
    ("INT", &["3"]),
    ("INT", &["imm8"]),
    ("JA", &["rel8"]),
    ("JAE", &["rel8"]),
    ("JB", &["rel8"]),
    ("JBE", &["rel8"]),
    ("JC", &["rel8"]),
    ("JCXZ", &["rel8"]),
    ("JE", &["rel8"]),
    ("JZ", &["rel8"]),
    ("JG", &["rel8"]),
    ("JGE", &["rel8"]),
    ("JL", &["rel8"]),
    ("JLE", &["rel8"]),
    ("JNA", &["rel8"]),
    ("JNAE", &["rel8"]),
    ("JNB", &["rel8"]),
    ("JNBE", &["rel8"]),
    ("JNC", &["rel8"]),
    ("JNE", &["rel8"]),
    ("JNG", &["rel8"]),
    ("JNGE", &["rel8"]),
    ("JNL", &["rel8"]),
    ("JNLE", &["rel8"]),
    ("JNO", &["rel8"]),
    ("JNP", &["rel8"]),
    ("JNS", &["rel8"]),
    ("JNZ", &["rel8"]),
    ("JO", &["rel8"]),
    ("JP", &["rel8"]),
    ("JPE", &["rel8"]),
    ("JPO", &["rel8"]),
    ("JS", &["rel8"]),
    ("JZ", &["rel8"]),
    ("JMP", &["short"]),
    ("JMP", &["rel16"]),
    ("JMP", &["r/m16"]),
    ("LEA", &["r16", "m16"]),
    ("LOOP", &["rel8"]),
    ("LOOPE", &["rel8"]),
    ("LOOPZ", &["rel8"]),
    ("LOOPNE", &["rel8"]),
    ("LOOPNZ", &["rel8"]),
    ("MOV", &["r/m8", "r8"]),
    ("MOV", &["r/m16", "r16"]),
    ("MOV", &["r8", "r/m8"]),
    ("MOV", &["r16", "r/m16"]),
    ("MOV", &["r/m16", "SregCS"]),
    ("MOV", &["Sreg", "r/m16"]),
    ("MOV", &["AL", "moffs8"]),
    ("MOV", &["AX", "moffs16"]),
    ("MOV", &["moffs8", "AL"]),
    ("MOV", &["moffs16", "AX"]),
    ("MOV", &["r8", "imm8"]),
    ("MOV", &["r16", "imm16"]),
    ("MOV", &["r/m8", "imm8"]),
    ("MOV", &["r/m16", "imm16"]),
    ("MUL", &["r/m8"]),
    ("MUL", &["r/m16"]),
    ("NEG", &["r/m8"]),
    ("NEG", &["r/m16"]),
    ("NOT", &["r/m8"]),
    ("NOT", &["r/m16"]),
    ("OR", &["AL", "imm8"]),
    ("OR", &["AX", "imm16"]),
    ("OR", &["r/m8", "imm8"]),
    ("OR", &["r/m16", "imm16"]),
    ("OR", &["r/m16", "imm8"]),
    ("OR", &["r/m8", "r8"]),
    ("OR", &["r/m16", "r16"]),
    ("OR", &["r8", "r/m8"]),
    ("OR", &["r16", "r/m16"]),
    ("OUT", &["imm8", "AL"]),
    ("OUT", &["imm8", "AX"]),
    ("OUT", &["DX", "AL"]),
    ("OUT", &["DX", "AX"]),
    ("POP", &["m16"]),
    ("POP", &["r16"]),
    ("PUSH", &["m16"]),
    ("PUSH", &["r16"]),
    ("RCL", &["r/m8", "1"]),
    ("RCL", &["r/m8", "CL"]),
    ("RCL", &["r/m16", "1"]),
    ("RCL", &["r/m16", "CL"]),
    ("RCR", &["r/m8", "1"]),
    ("RCR", &["r/m8", "CL"]),
    ("RCR", &["r/m16", "1"]),
    ("RCR", &["r/m16", "CL"]),
    ("ROL", &["r/m8", "1"]),
    ("ROL", &["r/m8", "CL"]),
    ("ROL", &["r/m16", "1"]),
    ("ROL", &["r/m16", "CL"]),
    ("ROR", &["r/m8", "1"]),
    ("ROR", &["r/m8", "CL"]),
    ("ROR", &["r/m16", "1"]),
    ("ROR", &["r/m16", "CL"]),
    ("SAL", &["r/m8", "1"]),
    ("SAL", &["r/m8", "CL"]),
    ("SAL", &["r/m16", "1"]),
    ("SAL", &["r/m16", "CL"]),
    ("SAR", &["r/m8", "1"]),
    ("SAR", &["r/m8", "CL"]),
    ("SAR", &["r/m16", "1"]),
    ("SAR", &["r/m16", "CL"]),
    ("SHL", &["r/m8", "1"]),
    ("SHL", &["r/m8", "CL"]),
    ("SHL", &["r/m16", "1"]),
    ("SHL", &["r/m16", "CL"]),
    ("SHR", &["r/m8", "1"]),
    ("SHR", &["r/m8", "CL"]),
    ("SHR", &["r/m16", "1"]),
    ("SHR", &["r/m16", "CL"]),
    ("SBB", &["AL", "imm8"]),
    ("SBB", &["AX", "imm16"]),
    ("SBB", &["r/m8", "imm8"]),
    ("SBB", &["r/m16", "imm16"]),
    ("SBB", &["r/m16", "imm8"]),
    ("SBB", &["r/m8", "r8"]),
    ("SBB", &["r/m16", "r16"]),
    ("SBB", &["r8", "r/m8"]),
    ("SBB", &["r16", "r/m16"]),
    ("SUB", &["AL", "imm8"]),
    ("SUB", &["AX", "imm16"]),
    ("SUB", &["r/m8", "imm8"]),
    ("SUB", &["r/m16", "imm16"]),
    ("SUB", &["r/m16", "imm8"]),
    ("SUB", &["r/m8", "r8"]),
    ("SUB", &["r/m16", "r16"]),
    ("SUB", &["r8", "r/m8"]),
    ("SUB", &["r16", "r/m16"]),
    ("TEST", &["AL", "imm8"]),
    ("TEST", &["AX", "imm16"]),
    ("TEST", &["r/m8", "imm8"]),
    ("TEST", &["r/m16", "imm16"]),
    ("TEST", &["r/m8", "r8"]),
    ("TEST", &["r/m16", "r16"]),
    ("TEST", &["r8", "r/m8"]),
    ("TEST", &["r16", "r/m16"]),
    ("XCHG", &["r/m8", "r8"]),
    ("XCHG", &["r8", "r/m8"]),
    ("XCHG", &["r/m16", "r16"]),
    ("XCHG", &["r16", "r/m16"]),
    ("XCHG", &["AX", "r16"]),
    ("XCHG", &["r16", "AX"]),
    ("XOR", &["AL", "imm8"]),
    ("XOR", &["AX", "imm16"]),
    ("XOR", &["r/m8", "imm8"]),
    ("XOR", &["r/m16", "imm16"]),
    ("XOR", &["r/m16", "imm8"]),
    ("XOR", &["r/m8", "r8"]),
    ("XOR", &["r/m16", "r16"]),
    ("XOR", &["r8", "r/m8"]),
    ("XOR", &["r16", "r/m16"]),
];

const FORMS_8087: &[(&str, &[&str])] = &[
    ("FADD", &["ST", "stack"]),
    ("FADD", &["stack", "ST"]),
    ("FADD", &["dword"]),
    ("FADD", &["qword"]),
    ("FADDP", &["stack", "ST"]),
    ("FBLD", &["tbyte"]),
    ("FBSTP", &["tbyte"]),
    ("FCOM", &["stack"]),
    ("FCOM", &["dword"]),
    ("FCOM", &["qword"]),
    ("FCOMP", &["stack"]),
    ("FCOMP", &["dword"]),
    ("FCOMP", &["qword"]),
    ("FDIV", &["ST", "stack"]),
    ("FDIV", &["stack", "ST"]),
    ("FDIV", &["dword"]),
    ("FDIV", &["qword"]),
    ("FDIVP", &["stack", "ST"]),
    ("FDIVR", &["ST", "stack"]),
    ("FDIVR", &["stack", "ST"]),
    ("FDIVR", &["dword"]),
    ("FDIVR", &["qword"]),
    ("FDIVRP", &["stack", "ST"]),
    ("FFREE", &["stack"]),
    ("FIADD", &["word"]),
    ("FIADD", &["dword"]),
    ("FICOM", &["word"]),
    ("FICOM", &["dword"]),
    ("FICOMP", &["word"]),
    ("FICOMP", &["dword"]),
    ("FIDIV", &["word"]),
    ("FIDIV", &["dword"]),
    ("FIDIVR", &["word"]),
    ("FIDIVR", &["dword"]),
    ("FILD", &["word"]),
    ("FILD", &["dword"]),
    ("FILD", &["qword"]),
    ("FIMUL", &["word"]),
    ("FIMUL", &["dword"]),
    ("FIST", &["word"]),
    ("FIST", &["dword"]),
    ("FISTP", &["word"]),
    ("FISTP", &["dword"]),
    ("FISTP", &["qword"]),
    ("FISUB", &["word"]),
    ("FISUB", &["dword"]),
    ("FISUBR", &["word"]),
    ("FISUBR", &["dword"]),
    ("FLD", &["dword"]),
    ("FLD", &["qword"]),
    ("FLD", &["tbyte"]),
    ("FLD", &["stack"]),
    ("FLDCW", &["word"]),
    ("FMUL", &["dword"]),
    ("FMUL", &["qword"]),
    ("FMUL", &["ST", "stack"]),
    ("FMUL", &["stack", "ST"]),
    ("FMULP", &["stack", "ST"]),
    ("FST", &["dword"]),
    ("FST", &["qword"]),
    ("FST", &["stack"]),
    ("FSTP", &["dword"]),
    ("FSTP", &["qword"]),
    ("FSTP", &["tbyte"]),
    ("FSTP", &["stack"]),
    ("FSTCW", &["word"]),
    ("FNSTCW", &["word"]),
    ("FSTSW", &["word"]),
    ("FNSTSW", &["word"]),
    ("FSUB", &["ST", "stack"]),
    ("FSUB", &["stack", "ST"]),
    ("FSUB", &["dword"]),
    ("FSUB", &["qword"]),
    ("FSUBP", &["stack", "ST"]),
    ("FSUBR", &["ST", "stack"]),
    ("FSUBR", &["stack", "ST"]),
    ("FSUBR", &["dword"]),
    ("FSUBR", &["qword"]),
    ("FSUBRP", &["stack", "ST"]),
    ("FXCH", &["stack"]),
];

const FORMS_286: &[(&str, &[&str])] = &[
    ("BOUND", &["r16", "m16"]),
    ("ENTER", &["imm16", "imm8u"]),
    ("IMUL", &["r16", "imm8"]),
    ("IMUL", &["r16", "r/m16", "imm8"]),
    ("IMUL", &["r16", "r/m16", "imm16"]),
    ("PUSH", &["imm16"]),
    ("PUSH", &["imm8"]),
    ("RCL", &["r/m8", "imm8"]),
    ("RCL", &["r/m16", "imm8"]),
    ("RCR", &["r/m8", "imm8"]),
    ("RCR", &["r/m16", "imm8"]),
    ("ROL", &["r/m8", "imm8"]),
    ("ROL", &["r/m16", "imm8"]),
    ("ROR", &["r/m8", "imm8"]),
    ("ROR", &["r/m16", "imm8"]),
    ("SAL", &["r/m8", "imm8"]),
    ("SAL", &["r/m16", "imm8"]),
    ("SAR", &["r/m8", "imm8"]),
    ("SAR", &["r/m16", "imm8"]),
    ("SHL", &["r/m8", "imm8"]),
    ("SHL", &["r/m16", "imm8"]),
    ("SHR", &["r/m8", "imm8"]),
    ("SHR", &["r/m16", "imm8"]),
];

const FORMS_286_PROTECTED: &[(&str, &[&str])] = &[
    ("ARPL", &["r/m16", "r16"]),
    ("LAR", &["r16", "r/m16"]),
    ("LGDT", &["m16:32"]),
    ("LIDT", &["m16:32"]),
    ("LLDT", &["r/m16"]),
    ("LMSW", &["r/m16"]),
    ("LSL", &["r16", "r/m16"]),
    ("LTR", &["r/m16"]),
    ("SGDT", &["m16:32"]),
    ("SIDT", &["m16:32"]),
    ("SLDT", &["r/m16"]),
    ("SMSW", &["r/m16"]),
    ("STR", &["r/m16"]),
    ("VERR", &["r/m16"]),
    ("VERW", &["r/m16"]),
];

/// The catalog's source tables, in catalog order.
pub const STANDARD_TABLES: &[TableGroup] = &[
    TableGroup { feature: Feature::Cpu8086, bare: BARE_8086, forms: FORMS_8086 },
    TableGroup { feature: Feature::Fpu8087, bare: BARE_8087, forms: FORMS_8087 },
    TableGroup { feature: Feature::Cpu286, bare: BARE_286, forms: FORMS_286 },
    TableGroup { feature: Feature::Cpu286Protected, bare: BARE_286_PROTECTED, forms: FORMS_286_PROTECTED },
    TableGroup { feature: Feature::Fpu287, bare: BARE_287, forms: &[] },
];

/// Module names are limited to 8.3 file names: stem, ordinal, shard letter.
const STEM_LENGTH: usize = 5;

/// A mnemonic with its operand template shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionForm {
    /// Upper-case mnemonic with whitespace collapsed (`REP MOVSB`)
    pub mnemonic: String,
    pub templates: Vec<OperandTemplate>,
    pub feature: Feature,
    /// 1-based position in the whole catalog; 0 for forms built outside one
    pub index: usize,
    /// 1-based position among operand-bearing forms sharing this form's name stem
    pub ordinal: usize,
}

impl InstructionForm {
    /// Parse a form from its mnemonic and template notations.
    pub fn new(mnemonic: &str, notations: &[&str], feature: Feature) -> Result<Self, GenerationError> {
        let mnemonic = mnemonic.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        let templates = notations
            .iter()
            .map(|notation| {
                notation.parse::<OperandTemplate>().map_err(|template| {
                    GenerationError::UnknownOperandTemplate {
                        form: raw_title(&mnemonic, notations),
                        template,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mnemonic,
            templates,
            feature,
            index: 0,
            ordinal: 1,
        })
    }

    /// Whether this is a no-operand instruction.
    pub fn is_bare(&self) -> bool {
        self.templates.is_empty()
    }

    /// Reference-manual description, e.g. `ADC r/m8, r8`.
    pub fn title(&self) -> String {
        let notations: Vec<String> = self.templates.iter().map(|t| t.to_string()).collect();
        let notations: Vec<&str> = notations.iter().map(String::as_str).collect();
        raw_title(&self.mnemonic, &notations)
    }

    /// Up to the first five characters of the mnemonic, spaces removed.
    pub fn name_stem(&self) -> String {
        self.mnemonic.chars().filter(|c| !c.is_whitespace()).take(STEM_LENGTH).collect()
    }

    /// Module name before any shard letter, e.g. `ADC01`.
    pub fn base_name(&self) -> String {
        format!("{}{:02}", self.name_stem(), self.ordinal)
    }
}

impl fmt::Display for InstructionForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

fn raw_title(mnemonic: &str, notations: &[&str]) -> String {
    if notations.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{} {}", mnemonic, notations.join(", "))
    }
}

/// Which part of the catalog to work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Exact mnemonic, case-insensitive
    Exact(String),
    /// Mnemonic prefix, written with a trailing `*`
    Prefix(String),
    /// 1-based catalog index as shown by [`Catalog::list`]
    Index(usize),
}

impl Pattern {
    fn matches(&self, form: &InstructionForm) -> bool {
        match self {
            Pattern::Exact(mnemonic) => form.mnemonic.eq_ignore_ascii_case(mnemonic),
            Pattern::Prefix(prefix) => form.mnemonic.starts_with(&prefix.to_uppercase()),
            Pattern::Index(index) => form.index == *index,
        }
    }
}

impl FromStr for Pattern {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        if let Some(prefix) = text.strip_suffix('*') {
            return Ok(Pattern::Prefix(prefix.trim_end().to_string()));
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = text.parse() {
                return Ok(Pattern::Index(index));
            }
        }
        Ok(Pattern::Exact(text))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(mnemonic) => write!(f, "`{}`", mnemonic),
            Pattern::Prefix(prefix) => write!(f, "`{}*`", prefix),
            Pattern::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// A mnemonic pattern and/or feature filter. Both unset selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub pattern: Option<Pattern>,
    pub feature: Option<Feature>,
}

impl Selection {
    /// The whole catalog.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pattern(pattern: Pattern) -> Self {
        Self { pattern: Some(pattern), feature: None }
    }

    pub fn feature(feature: Feature) -> Self {
        Self { pattern: None, feature: Some(feature) }
    }

    /// Narrow this selection to one feature.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn matches(&self, form: &InstructionForm) -> bool {
        self.feature.map_or(true, |feature| form.feature == feature)
            && self.pattern.as_ref().map_or(true, |pattern| pattern.matches(form))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) => write!(f, "{}", pattern)?,
            None => write!(f, "any mnemonic")?,
        }
        if let Some(feature) = self.feature {
            write!(f, " for {}", feature)?;
        }
        Ok(())
    }
}

/// One numbered row of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub index: usize,
    pub title: String,
    pub feature: Feature,
}

impl fmt::Display for ListingRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4} {:<28} {}", self.index, self.title, self.feature)
    }
}

/// All instruction forms, in catalog order and grouped by feature.
#[derive(Debug, Clone)]
pub struct Catalog {
    forms: Vec<InstructionForm>,
}

impl Catalog {
    /// The built-in catalog, parsed on first use and shared thereafter.
    pub fn standard() -> Result<&'static Catalog, GenerationError> {
        static STANDARD: OnceLock<Result<Catalog, GenerationError>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Catalog::build(STANDARD_TABLES))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Parse a catalog from source tables.
    ///
    /// Each group contributes its no-operand instructions first, then its
    /// operand-bearing forms. Indices run across the whole catalog; ordinals
    /// count operand-bearing forms per name stem.
    pub fn build(tables: &[TableGroup]) -> Result<Self, GenerationError> {
        let mut forms = Vec::new();
        let mut stems: HashMap<String, usize> = HashMap::new();

        for group in tables {
            for mnemonic in group.bare {
                forms.push(InstructionForm::new(mnemonic, &[], group.feature)?);
            }
            for (mnemonic, notations) in group.forms {
                let mut form = InstructionForm::new(mnemonic, notations, group.feature)?;
                let seen = stems.entry(form.name_stem()).or_insert(0);
                *seen += 1;
                form.ordinal = *seen;
                forms.push(form);
            }
        }

        for (position, form) in forms.iter_mut().enumerate() {
            form.index = position + 1;
        }

        log::debug!("catalog loaded: {} instruction forms", forms.len());
        Ok(Self { forms })
    }

    /// Every form, grouped by feature in catalog order.
    pub fn all(&self) -> &[InstructionForm] {
        &self.forms
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Every form with exactly this mnemonic.
    pub fn lookup(&self, mnemonic: &str) -> Vec<&InstructionForm> {
        let pattern = Pattern::Exact(mnemonic.split_whitespace().collect::<Vec<_>>().join(" "));
        self.forms.iter().filter(|form| pattern.matches(form)).collect()
    }

    pub fn by_feature(&self, feature: Feature) -> impl Iterator<Item = &InstructionForm> {
        self.forms.iter().filter(move |form| form.feature == feature)
    }

    /// Forms matched by `selection`, in catalog order.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&InstructionForm>, GenerationError> {
        let selected: Vec<_> = self.forms.iter().filter(|form| selection.matches(form)).collect();
        if selected.is_empty() {
            return Err(GenerationError::NoMatchingForms {
                selection: selection.to_string(),
            });
        }
        Ok(selected)
    }

    /// Numbered rows for the forms matched by `selection`.
    pub fn list(&self, selection: &Selection) -> Result<Vec<ListingRow>, GenerationError> {
        Ok(self
            .select(selection)?
            .into_iter()
            .map(|form| ListingRow {
                index: form.index,
                title: form.title(),
                feature: form.feature,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_standard_catalog_loads() {
        let catalog = Catalog::standard().unwrap();
        assert!(!catalog.is_empty());

        // Grouped by feature, in feature order
        let features: Vec<Feature> = catalog.all().iter().map(|form| form.feature).collect();
        let mut sorted = features.clone();
        sorted.sort();
        assert_eq!(features, sorted);

        // Indices are 1-based and dense
        for (position, form) in catalog.all().iter().enumerate() {
            assert_eq!(form.index, position + 1);
        }
    }

    #[test]
    fn test_lookup_adc() {
        let catalog = Catalog::standard().unwrap();
        let forms = catalog.lookup("adc");
        assert_eq!(forms.len(), 9);
        assert_eq!(forms[0].title(), "ADC r/m8, r8");
        assert_eq!(forms[0].base_name(), "ADC01");
        assert_eq!(forms[8].base_name(), "ADC09");
        assert!(forms.iter().all(|form| form.feature == Feature::Cpu8086));
    }

    #[rstest]
    #[case("LOOPNE", "LOOPN01")]
    #[case("LOOPNZ", "LOOPN02")]
    #[case("JCXZ", "JCXZ01")]
    #[case("FNSTCW", "FNSTC01")]
    #[case("LGDT", "LGDT01")]
    fn test_base_names(#[case] mnemonic: &str, #[case] expected: &str) {
        let catalog = Catalog::standard().unwrap();
        let forms = catalog.lookup(mnemonic);
        assert_eq!(forms[0].base_name(), expected);
    }

    #[test]
    fn test_duplicate_rows_get_distinct_ordinals() {
        let catalog = Catalog::standard().unwrap();
        let jz: Vec<String> = catalog.lookup("JZ").iter().map(|form| form.base_name()).collect();
        assert_eq!(jz, vec!["JZ01", "JZ02"]);

        // 80286 forms continue the 8086 numbering for the same stem
        let shl: Vec<String> = catalog.lookup("SHL").iter().map(|form| form.base_name()).collect();
        assert_eq!(shl.len(), 6);
        assert_eq!(shl[4], "SHL05");
    }

    #[test]
    fn test_base_names_are_unique() {
        let catalog = Catalog::standard().unwrap();
        let mut seen = HashSet::new();
        for form in catalog.all().iter().filter(|form| !form.is_bare()) {
            assert!(seen.insert(form.base_name()), "duplicate name {}", form.base_name());
        }
    }

    #[test]
    fn test_prefixed_mnemonic_is_collapsed() {
        let catalog = Catalog::standard().unwrap();
        let forms = catalog.lookup("rep  movsb");
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].mnemonic, "REP MOVSB");
        assert!(forms[0].is_bare());
    }

    #[rstest]
    #[case("adc", Pattern::Exact("ADC".into()))]
    #[case("AD*", Pattern::Prefix("AD".into()))]
    #[case("12", Pattern::Index(12))]
    #[case("rep   movsb", Pattern::Exact("REP MOVSB".into()))]
    fn test_pattern_parse(#[case] text: &str, #[case] expected: Pattern) {
        assert_eq!(text.parse::<Pattern>().unwrap(), expected);
    }

    #[test]
    fn test_selection_by_prefix_and_feature() {
        let catalog = Catalog::standard().unwrap();

        let shifts = catalog
            .select(&Selection::pattern(Pattern::Prefix("SH".into())).with_feature(Feature::Cpu286))
            .unwrap();
        assert_eq!(shifts.len(), 4);
        assert!(shifts.iter().all(|form| form.feature == Feature::Cpu286));

        let protected = catalog.select(&Selection::feature(Feature::Cpu286Protected)).unwrap();
        assert_eq!(protected[0].mnemonic, "CLTS");
        assert_eq!(protected.len(), 16);
    }

    #[test]
    fn test_by_feature_partitions_catalog() {
        let catalog = Catalog::standard().unwrap();

        let fpu287: Vec<&str> = catalog.by_feature(Feature::Fpu287).map(|form| form.mnemonic.as_str()).collect();
        assert_eq!(fpu287, vec!["FSETPM"]);
        assert_eq!(catalog.by_feature(Feature::Cpu286Protected).count(), 16);

        let total: usize = Feature::all().iter().map(|feature| catalog.by_feature(*feature).count()).sum();
        assert_eq!(total, catalog.len());
    }

    #[test]
    fn test_mnemonic_selection_includes_bare_form() {
        let catalog = Catalog::standard().unwrap();
        let fadd = catalog.select(&Selection::pattern(Pattern::Exact("FADD".into()))).unwrap();
        assert_eq!(fadd.len(), 5);
        assert!(fadd[0].is_bare());
    }

    #[test]
    fn test_selection_by_index() {
        let catalog = Catalog::standard().unwrap();
        let adc = catalog.lookup("ADC")[2].clone();

        let rows = catalog.list(&Selection::pattern(Pattern::Index(adc.index))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "ADC r8, r/m8");
        assert_eq!(rows[0].index, adc.index);
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let catalog = Catalog::standard().unwrap();
        let err = catalog
            .select(&Selection::pattern(Pattern::Exact("MOVSD".into())))
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::NoMatchingForms {
                selection: "`MOVSD`".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_notation_names_form() {
        const BAD: &[TableGroup] = &[TableGroup {
            feature: Feature::Cpu8086,
            bare: &[],
            forms: &[("ADD", &["r/m8", "r8"]), ("MOVZX", &["r16", "r/m8x"])],
        }];

        let err = Catalog::build(BAD).unwrap_err();
        assert_eq!(
            err,
            GenerationError::UnknownOperandTemplate {
                form: "MOVZX r16, r/m8x".to_string(),
                template: "r/m8x".to_string(),
            }
        );
    }
}
