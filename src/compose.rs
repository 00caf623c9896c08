//! Test case composition: turning instruction forms into assembler modules.
//!
//! A form's operand sets are combined as a Cartesian product in template
//! order. When one template is large (memory or register-or-memory), its
//! values drive the outer loop and are split into shards of at most
//! `capacity` values, each shard becoming its own module.

use std::convert::TryFrom;

use crate::catalog::{Catalog, InstructionForm, Selection};
use crate::operand::{OperandTemplate, TARGET_LABEL};
use crate::{Feature, GeneratedModule, GenerationError};

/// Outer operand values per module when no capacity is configured.
pub const DEFAULT_SHARD_CAPACITY: usize = 128;

/// Default entry label; the program-end directive names it.
pub const DEFAULT_ENTRY_LABEL: &str = "start";

const SHARD_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

const MAX_OPERANDS: usize = 3;

/// A form's operand slots, checked against composer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape<'a> {
    pub first: Option<&'a OperandTemplate>,
    pub second: Option<&'a OperandTemplate>,
    pub third: Option<&'a OperandTemplate>,
    /// Position of the template that drives sharding, if any
    pub outer: Option<usize>,
}

impl<'a> Shape<'a> {
    pub fn templates(&self) -> impl Iterator<Item = &'a OperandTemplate> {
        [self.first, self.second, self.third].into_iter().flatten()
    }
}

impl<'a> TryFrom<&'a InstructionForm> for Shape<'a> {
    type Error = GenerationError;

    fn try_from(form: &'a InstructionForm) -> Result<Self, Self::Error> {
        if form.templates.len() > MAX_OPERANDS {
            return Err(malformed(
                form,
                format!("{} operand templates, at most {} supported", form.templates.len(), MAX_OPERANDS),
            ));
        }

        let large: Vec<usize> = form
            .templates
            .iter()
            .enumerate()
            .filter(|(_, template)| template.is_large())
            .map(|(position, _)| position)
            .collect();
        if large.len() > 1 {
            return Err(malformed(form, "more than one large operand template".to_string()));
        }

        Ok(Shape {
            first: form.templates.first(),
            second: form.templates.get(1),
            third: form.templates.get(2),
            outer: large.first().copied(),
        })
    }
}

fn malformed(form: &InstructionForm, reason: String) -> GenerationError {
    GenerationError::MalformedForm {
        form: form.title(),
        reason,
    }
}

/// Builds module source text from catalog forms.
#[derive(Debug, Clone)]
pub struct Composer {
    capacity: usize,
    entry_label: String,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_CAPACITY)
    }
}

impl Composer {
    /// A composer placing at most `capacity` outer operand values in each
    /// module. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entry_label: DEFAULT_ENTRY_LABEL.to_string(),
        }
    }

    pub fn with_entry_label(mut self, label: &str) -> Self {
        self.entry_label = label.to_string();
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Compose every module for the forms `selection` matches.
    ///
    /// Modules come out feature by feature: the feature's batch of
    /// no-operand instructions first, then one or more modules per
    /// operand-bearing form in catalog order.
    pub fn generate(&self, catalog: &Catalog, selection: &Selection) -> Result<Vec<GeneratedModule>, GenerationError> {
        let mut modules = Vec::new();
        let mut matched = 0;

        for feature in Feature::all() {
            let group: Vec<&InstructionForm> = catalog.by_feature(*feature).filter(|form| selection.matches(form)).collect();
            matched += group.len();

            let bare: Vec<&InstructionForm> = group.iter().copied().filter(|form| form.is_bare()).collect();
            if !bare.is_empty() {
                modules.push(self.compose_bare(*feature, &bare));
            }

            for form in group.iter().filter(|form| !form.is_bare()) {
                modules.extend(self.compose_form(form)?);
            }
        }

        if matched == 0 {
            return Err(GenerationError::NoMatchingForms {
                selection: selection.to_string(),
            });
        }

        log::info!(
            "composed {} modules, {} instructions",
            modules.len(),
            modules.iter().map(|module| module.instructions).sum::<usize>()
        );
        Ok(modules)
    }

    /// One module batching operand-less instructions of a single feature.
    pub fn compose_bare(&self, feature: Feature, forms: &[&InstructionForm]) -> GeneratedModule {
        let title = format!("{} instructions without operands", feature);
        let lines: Vec<String> = forms.iter().map(|form| format!("    {}", form.mnemonic)).collect();
        log::debug!("{}: {} instructions", title, lines.len());

        GeneratedModule {
            name: feature.bare_module_name().to_string(),
            source: self.render(&title, feature.directive(), &lines),
            feature,
            title,
            instructions: lines.len(),
        }
    }

    /// Every module covering one operand-bearing form.
    pub fn compose_form(&self, form: &InstructionForm) -> Result<Vec<GeneratedModule>, GenerationError> {
        let shape = Shape::try_from(form)?;
        let sets: Vec<Vec<String>> = shape.templates().map(OperandTemplate::generate).collect();
        let title = form.title();

        let Some(outer) = shape.outer else {
            let lines = instruction_lines(&form.mnemonic, &product(&sets));
            log::debug!("{}: {} instructions", title, lines.len());
            return Ok(vec![self.module(form, form.base_name(), &title, lines)]);
        };

        let chunks: Vec<&[String]> = sets[outer].chunks(self.capacity).collect();
        if chunks.len() > SHARD_LETTERS.len() {
            return Err(malformed(
                form,
                format!(
                    "{} shards needed at capacity {}, at most {} available",
                    chunks.len(),
                    self.capacity,
                    SHARD_LETTERS.len()
                ),
            ));
        }
        log::debug!("{}: {} outer values in {} shard(s)", title, sets[outer].len(), chunks.len());

        let mut modules = Vec::with_capacity(chunks.len());
        for (letter, chunk) in SHARD_LETTERS.iter().zip(chunks) {
            let mut combinations = Vec::new();
            for value in chunk {
                let mut pinned = sets.clone();
                pinned[outer] = vec![value.clone()];
                combinations.extend(product(&pinned));
            }

            let name = format!("{}{}", form.base_name(), *letter as char);
            let lines = instruction_lines(&form.mnemonic, &combinations);
            modules.push(self.module(form, name, &title, lines));
        }
        Ok(modules)
    }

    fn module(&self, form: &InstructionForm, name: String, title: &str, lines: Vec<String>) -> GeneratedModule {
        GeneratedModule {
            source: self.render(title, form.feature.directive(), &lines),
            name,
            feature: form.feature,
            title: title.to_string(),
            instructions: lines.len(),
        }
    }

    fn render(&self, title: &str, directive: Option<&str>, lines: &[String]) -> String {
        let mut source = String::new();
        source.push_str("    IDEAL\n");
        source.push_str("    SEGMENT image\n");
        source.push_str("    ASSUME CS:image, DS:image, SS:image, ES:image\n");
        source.push_str("    ORG 0100h\n");
        source.push_str(&format!("{}:\n", self.entry_label));
        if let Some(directive) = directive {
            source.push_str(&format!("    {}\n", directive));
        }
        source.push_str(&format!("    ; {}\n\n", title));

        for line in lines {
            source.push_str(line);
            source.push('\n');
        }

        // Filler around the branch target so every placeholder resolves forward
        source.push_str("    nop\n");
        source.push_str("    nop\n");
        source.push_str(&format!("{}:\n", TARGET_LABEL));
        source.push_str("    nop\n");
        source.push_str("    nop\n");

        source.push_str("\n    ENDS\n\n");
        source.push_str(&format!("END {}\n", self.entry_label));
        source
    }
}

/// Cartesian product of operand sets, leftmost set varying slowest.
fn product(sets: &[Vec<String>]) -> Vec<Vec<String>> {
    sets.iter().fold(vec![Vec::new()], |rows, set| {
        rows.iter()
            .flat_map(|row| {
                set.iter().map(move |value| {
                    let mut extended = row.clone();
                    extended.push(value.clone());
                    extended
                })
            })
            .collect()
    })
}

fn instruction_lines(mnemonic: &str, combinations: &[Vec<String>]) -> Vec<String> {
    combinations
        .iter()
        .map(|operands| format!("    {:<6} {}", mnemonic, operands.join(", ")))
        .collect()
}
