//! Operand-space test generation and an equivalence oracle for 8086/80286
//! assembler and disassembler pairs.
//!
//! The crate has two halves. The generation half walks a static catalog of
//! instruction forms, expands every operand template into a deterministic set
//! of textual operands and composes self-contained assembler modules that
//! exercise each addressing mode and encoding path. The oracle half decides
//! whether an original source listing and the listing obtained by decoding its
//! binary image are equivalent, allowing for the alternate spellings a
//! disassembler is entitled to use.
//!
//! Encoding, linking and decoding are performed by external tools; this crate
//! only produces and consumes text.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use disasm_oracle::{catalog::{Pattern, Selection}, compare, generate, MatchResult};
//!
//! // Every module needed to cover the ADC forms
//! let selection = Selection::pattern(Pattern::Exact("ADC".into()));
//! let modules = generate(&selection).unwrap();
//!
//! for module in &modules {
//!     // Hand `module.source` to the assembler, linker and disassembler...
//!     let decoded: Vec<String> = Vec::new();
//!     let original = disasm_oracle::normalize::listing(&module.source);
//!
//!     match compare(&original, &decoded) {
//!         MatchResult::Matched => println!("{}: ok", module.name),
//!         MatchResult::Mismatch(m) => println!("{}: {}", module.name, m),
//!     }
//! }
//! ```

pub mod catalog;
pub mod compose;
pub mod config;
pub mod format;
pub mod normalize;
pub mod operand;
pub mod oracle;
mod large_tests;

pub use oracle::{MatchResult, Mismatch, MismatchKind, ModuleVerdict, Oracle};

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

/// Processor or coprocessor feature an instruction form depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    /// Base 8086 instruction set
    Cpu8086,
    /// 8087 numeric coprocessor
    Fpu8087,
    /// 80286 non-privileged extensions
    Cpu286,
    /// 80286 protected-mode (privileged) instructions
    Cpu286Protected,
    /// 80287 numeric coprocessor extensions
    Fpu287,
}

impl Feature {
    /// Processor directive a module must declare before using this feature.
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            Feature::Cpu8086 => None,
            // P286N keeps the assembler from emitting WAIT before coprocessor opcodes
            Feature::Fpu8087 | Feature::Cpu286 => Some("P286N"),
            Feature::Cpu286Protected | Feature::Fpu287 => Some("P286"),
        }
    }

    /// Name of the module that batches this feature's operand-less instructions.
    pub fn bare_module_name(&self) -> &'static str {
        match self {
            Feature::Cpu8086 => "8086",
            Feature::Fpu8087 => "8087",
            Feature::Cpu286 => "80286N",
            Feature::Cpu286Protected => "80286P",
            Feature::Fpu287 => "80287",
        }
    }

    /// All features in catalog order.
    pub fn all() -> &'static [Feature] {
        &[
            Feature::Cpu8086,
            Feature::Fpu8087,
            Feature::Cpu286,
            Feature::Cpu286Protected,
            Feature::Fpu287,
        ]
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Cpu8086 => write!(f, "8086"),
            Feature::Fpu8087 => write!(f, "8087"),
            Feature::Cpu286 => write!(f, "80286"),
            Feature::Cpu286Protected => write!(f, "80286 protected mode"),
            Feature::Fpu287 => write!(f, "80287"),
        }
    }
}

/// Mnemonic prefixes that belong to the mnemonic rather than the operand list.
const PREFIXES: [&str; 6] = ["rep", "repe", "repz", "repne", "repnz", "lock"];

/// One instruction or directive line in canonical form.
///
/// Canonical form is lower case with whitespace runs collapsed to a single
/// space; the operand list is separated by `", "`. Repeat and lock prefixes
/// are part of the mnemonic, so `REP   MOVSB` normalizes to the mnemonic
/// `rep movsb` with no operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedLine {
    text: String,
    /// Byte length of the mnemonic part of `text`
    split: usize,
}

impl NormalizedLine {
    /// Normalize one raw line. Comments and labels are not interpreted here;
    /// see [`normalize::listing`] for whole listings.
    pub fn new(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let mut tokens = lowered.split_whitespace().peekable();

        let mut mnemonic: Vec<&str> = Vec::new();
        while let Some(token) = tokens.next() {
            let is_prefix = PREFIXES.contains(&token);
            mnemonic.push(token);
            if !(is_prefix && tokens.peek().is_some()) {
                break;
            }
        }
        let rest = tokens.collect::<Vec<_>>().join(" ");
        let operands: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(|op| op.trim().to_string()).collect()
        };

        Self::from_parts(&mnemonic.join(" "), &operands)
    }

    /// Build a line from an already-canonical mnemonic and operand list.
    pub fn from_parts<S: AsRef<str>>(mnemonic: &str, operands: &[S]) -> Self {
        let mut text = mnemonic.to_string();
        let split = text.len();
        if !operands.is_empty() {
            text.push(' ');
            text.push_str(
                &operands
                    .iter()
                    .map(|op| op.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        Self { text, split }
    }

    /// The whole canonical line.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Mnemonic, including any repeat/lock prefix.
    pub fn mnemonic(&self) -> &str {
        &self.text[..self.split]
    }

    /// Operand list in order; empty for operand-less lines.
    pub fn operands(&self) -> Vec<&str> {
        if self.split == self.text.len() {
            Vec::new()
        } else {
            self.text[self.split + 1..].split(", ").collect()
        }
    }

    /// Same operands under a different mnemonic.
    pub fn with_mnemonic(&self, mnemonic: &str) -> Self {
        Self::from_parts(mnemonic, &self.operands())
    }
}

impl fmt::Display for NormalizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for NormalizedLine {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl Serialize for NormalizedLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// One composed assembler module, ready for the external encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedModule {
    /// Module name, without extension (8.3-safe)
    pub name: String,
    /// Complete module source text
    pub source: String,
    /// Feature of the forms this module exercises
    pub feature: Feature,
    /// Human-readable description of the covered form(s)
    pub title: String,
    /// Number of generated instruction lines, fillers excluded
    pub instructions: usize,
}

impl GeneratedModule {
    /// Feature the module requires beyond the base 8086, if any.
    pub fn required_feature(&self) -> Option<Feature> {
        match self.feature {
            Feature::Cpu8086 => None,
            other => Some(other),
        }
    }
}

/// Structural errors in catalog data or composition.
///
/// These indicate a defect in the catalog, never a runtime condition, and
/// abort a generation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// An operand template notation the generator does not recognize
    #[error("{form}: unknown operand template `{template}`")]
    UnknownOperandTemplate { form: String, template: String },

    /// A form violating composition arity or sharding assumptions
    #[error("{form}: malformed instruction form: {reason}")]
    MalformedForm { form: String, reason: String },

    /// A selection that matched nothing in the catalog
    #[error("no instruction forms match {selection}")]
    NoMatchingForms { selection: String },
}

/// Generate modules for `selection` from the standard catalog using the
/// default shard capacity.
pub fn generate(selection: &catalog::Selection) -> Result<Vec<GeneratedModule>, GenerationError> {
    let catalog = catalog::Catalog::standard()?;
    compose::Composer::default().generate(catalog, selection)
}

/// Compare an original listing against a decoded listing with the standard
/// alias table.
pub fn compare<A: AsRef<str>, B: AsRef<str>>(original: &[A], decoded: &[B]) -> MatchResult {
    Oracle::default().compare(original, decoded)
}
