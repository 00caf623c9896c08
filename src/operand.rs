//! Operand templates and the deterministic operand spaces generated from them.
//!
//! Templates are written in the notation of the processor reference manual
//! (`r/m8`, `imm16`, `Sreg`, ...). Each template expands to a fixed, ordered
//! list of textual operands chosen to reach every encoding path once rather
//! than every value.

use std::fmt;
use std::str::FromStr;

/// 8-bit general registers in encoding order.
pub const REG8: [&str; 8] = ["AL", "CL", "DL", "BL", "AH", "CH", "DH", "BH"];

/// 16-bit general registers in encoding order.
pub const REG16: [&str; 8] = ["AX", "CX", "DX", "BX", "SP", "BP", "SI", "DI"];

/// Segment registers that may be loaded.
pub const SREG: [&str; 3] = ["DS", "ES", "SS"];

/// Segment registers that may be stored, including CS.
pub const SREG_CS: [&str; 4] = ["DS", "ES", "SS", "CS"];

/// No override first, then each explicit segment override.
pub const SEGMENT_OVERRIDES: [&str; 5] = ["", "CS:", "DS:", "ES:", "SS:"];

/// 16-bit addressing bases in r/m encoding order.
pub const ADDRESSING_BASES: [&str; 8] = ["BX+SI", "BX+DI", "BP+SI", "BP+DI", "SI", "DI", "BP", "BX"];

/// Coprocessor stack operands: implicit top, position 0, adjacent, far.
pub const FPU_STACK: [&str; 4] = ["ST", "ST(0)", "ST(1)", "ST(7)"];

/// Label every relative branch target refers to.
pub const TARGET_LABEL: &str = "_target";

/// `BP` with mod=00 encodes a bare 16-bit address instead.
const DIRECT_BASE: &str = "BP";
const DIRECT_ADDRESS: &str = "1234h";
const DISP8: &str = "7fh";
const DISP16: &str = "7fffh";
const OFFSET_ADDRESS: &str = "90a0h";

/// A register class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// 8-bit general registers
    Byte,
    /// 16-bit general registers
    Word,
    /// Segment registers as a destination (CS excluded)
    Segment,
    /// Segment registers as a source (CS included)
    SegmentWithCode,
}

impl RegClass {
    /// Register names in canonical order.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            RegClass::Byte => &REG8,
            RegClass::Word => &REG16,
            RegClass::Segment => &SREG,
            RegClass::SegmentWithCode => &SREG_CS,
        }
    }
}

/// Memory element width, rendered as the size keyword inside the brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Fword,
    Qword,
    Tbyte,
}

impl Width {
    pub fn keyword(&self) -> &'static str {
        match self {
            Width::Byte => "BYTE",
            Width::Word => "WORD",
            Width::Dword => "DWORD",
            Width::Fword => "FWORD",
            Width::Qword => "QWORD",
            Width::Tbyte => "TBYTE",
        }
    }
}

/// Width of an operand that a general register could also fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Byte,
    Word,
}

impl Scalar {
    pub fn width(&self) -> Width {
        match self {
            Scalar::Byte => Width::Byte,
            Scalar::Word => Width::Word,
        }
    }

    fn registers(&self) -> &'static [&'static str] {
        match self {
            Scalar::Byte => &REG8,
            Scalar::Word => &REG16,
        }
    }
}

/// Kind of far pointer held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FarPointer {
    /// `m16:16`, a segment:offset pair
    SegmentOffset,
    /// `m16:32`, a descriptor-table pseudo-descriptor
    PseudoDescriptor,
}

impl FarPointer {
    fn width(&self) -> Width {
        match self {
            FarPointer::SegmentOffset => Width::Dword,
            FarPointer::PseudoDescriptor => Width::Fword,
        }
    }
}

/// Relative branch target encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// `rel8`: conditional jumps and loops, no override keyword
    Rel8,
    /// `short`: an explicitly short unconditional jump
    Short,
    /// `rel16`: a near jump or call
    Near,
}

/// Immediate operand widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    /// Signed 8-bit
    Imm8,
    /// Unsigned 8-bit, for byte counts such as ENTER's nesting level
    Imm8Unsigned,
    /// 16-bit
    Imm16,
}

impl Immediate {
    fn literal(&self) -> &'static str {
        match self {
            Immediate::Imm8 => "7fh",
            Immediate::Imm8Unsigned => "99h",
            Immediate::Imm16 => "7fffh",
        }
    }
}

/// What an instruction's operand slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandTemplate {
    /// A literal token that selects its own opcode, such as the `3` of `INT 3`
    Literal(&'static str),
    /// A register or count implied by the opcode (`AL`, `AX`, `CL`, `DX`, `ST`, `1`)
    Implicit(&'static str),
    /// Any register of a class
    Register(RegClass),
    /// A memory operand reached through ModR/M addressing
    Memory(Scalar),
    /// A far pointer in memory reached through ModR/M addressing
    FarPointer(FarPointer),
    /// Register or memory (`r/m8`, `r/m16`)
    RegisterOrMemory(Scalar),
    /// `moffs`: a bare offset used by the accumulator MOV forms
    MemoryOffset(Scalar),
    /// A coprocessor memory operand at a fixed address
    Direct(Width),
    /// A forward branch target
    Branch(Branch),
    /// An immediate value
    Immediate(Immediate),
    /// A coprocessor stack register
    FpuStack,
}

impl OperandTemplate {
    /// Generate the ordered operand set for this template.
    ///
    /// The result depends only on the template, never on previous calls.
    pub fn generate(&self) -> Vec<String> {
        match self {
            OperandTemplate::Literal(token) | OperandTemplate::Implicit(token) => vec![token.to_string()],
            OperandTemplate::Register(class) => owned(class.names()),
            OperandTemplate::Memory(scalar) => memory_operands(scalar.width()),
            OperandTemplate::FarPointer(kind) => memory_operands(kind.width()),
            OperandTemplate::RegisterOrMemory(scalar) => {
                let mut set = memory_operands(scalar.width());
                set.extend(owned(scalar.registers()));
                set
            }
            OperandTemplate::MemoryOffset(scalar) => direct_operand(scalar.width()),
            OperandTemplate::Direct(width) => direct_operand(*width),
            OperandTemplate::Branch(Branch::Rel8) => vec![TARGET_LABEL.to_string()],
            OperandTemplate::Branch(Branch::Short) => vec![format!("SHORT {}", TARGET_LABEL)],
            OperandTemplate::Branch(Branch::Near) => vec![format!("NEAR {}", TARGET_LABEL)],
            OperandTemplate::Immediate(imm) => vec![imm.literal().to_string()],
            OperandTemplate::FpuStack => owned(&FPU_STACK),
        }
    }

    /// Size of [`generate`](Self::generate)'s result, without generating it.
    pub fn cardinality(&self) -> usize {
        match self {
            OperandTemplate::Register(class) => class.names().len(),
            OperandTemplate::Memory(_) | OperandTemplate::FarPointer(_) => memory_cardinality(),
            OperandTemplate::RegisterOrMemory(_) => memory_cardinality() + REG8.len(),
            OperandTemplate::FpuStack => FPU_STACK.len(),
            _ => 1,
        }
    }

    /// Whether this template's set is large enough that its values must
    /// drive module sharding.
    pub fn is_large(&self) -> bool {
        matches!(
            self,
            OperandTemplate::Memory(_) | OperandTemplate::FarPointer(_) | OperandTemplate::RegisterOrMemory(_)
        )
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn memory_cardinality() -> usize {
    SEGMENT_OVERRIDES.len() * ADDRESSING_BASES.len() * 3
}

/// Every segment override, for each displacement class, for each base.
fn direct_operand(width: Width) -> Vec<String> {
    vec![format!("[{} {}]", width.keyword(), OFFSET_ADDRESS)]
}

fn memory_operands(width: Width) -> Vec<String> {
    let size = width.keyword();
    let mut result = Vec::with_capacity(memory_cardinality());
    for segment in SEGMENT_OVERRIDES {
        // mod=00: no displacement, except BP which means [disp16]
        for base in ADDRESSING_BASES {
            if base == DIRECT_BASE {
                result.push(format!("[{} {}{}]", size, segment, DIRECT_ADDRESS));
            } else {
                result.push(format!("[{} {}{}]", size, segment, base));
            }
        }
        // mod=01: disp8
        for base in ADDRESSING_BASES {
            result.push(format!("[{} {}{}+{}]", size, segment, base, DISP8));
        }
        // mod=10: disp16
        for base in ADDRESSING_BASES {
            result.push(format!("[{} {}{}+{}]", size, segment, base, DISP16));
        }
    }
    result
}

impl fmt::Display for OperandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notation = match self {
            OperandTemplate::Literal(token) | OperandTemplate::Implicit(token) => *token,
            OperandTemplate::Register(RegClass::Byte) => "r8",
            OperandTemplate::Register(RegClass::Word) => "r16",
            OperandTemplate::Register(RegClass::Segment) => "Sreg",
            OperandTemplate::Register(RegClass::SegmentWithCode) => "SregCS",
            OperandTemplate::Memory(Scalar::Byte) => "m8",
            OperandTemplate::Memory(Scalar::Word) => "m16",
            OperandTemplate::FarPointer(FarPointer::SegmentOffset) => "m16:16",
            OperandTemplate::FarPointer(FarPointer::PseudoDescriptor) => "m16:32",
            OperandTemplate::RegisterOrMemory(Scalar::Byte) => "r/m8",
            OperandTemplate::RegisterOrMemory(Scalar::Word) => "r/m16",
            OperandTemplate::MemoryOffset(Scalar::Byte) => "moffs8",
            OperandTemplate::MemoryOffset(Scalar::Word) => "moffs16",
            OperandTemplate::Direct(Width::Byte) => "byte",
            OperandTemplate::Direct(Width::Word) => "word",
            OperandTemplate::Direct(Width::Dword) => "dword",
            OperandTemplate::Direct(Width::Fword) => "fword",
            OperandTemplate::Direct(Width::Qword) => "qword",
            OperandTemplate::Direct(Width::Tbyte) => "tbyte",
            OperandTemplate::Branch(Branch::Rel8) => "rel8",
            OperandTemplate::Branch(Branch::Short) => "short",
            OperandTemplate::Branch(Branch::Near) => "rel16",
            OperandTemplate::Immediate(Immediate::Imm8) => "imm8",
            OperandTemplate::Immediate(Immediate::Imm8Unsigned) => "imm8u",
            OperandTemplate::Immediate(Immediate::Imm16) => "imm16",
            OperandTemplate::FpuStack => "stack",
        };
        f.write_str(notation)
    }
}

impl FromStr for OperandTemplate {
    /// The unrecognized notation
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let template = match s {
            "AL" => OperandTemplate::Implicit("AL"),
            "AX" => OperandTemplate::Implicit("AX"),
            "CL" => OperandTemplate::Implicit("CL"),
            "DX" => OperandTemplate::Implicit("DX"),
            "ST" => OperandTemplate::Implicit("ST"),
            "1" => OperandTemplate::Implicit("1"),
            "3" => OperandTemplate::Literal("3"),
            "r8" => OperandTemplate::Register(RegClass::Byte),
            "r16" => OperandTemplate::Register(RegClass::Word),
            "Sreg" => OperandTemplate::Register(RegClass::Segment),
            "SregCS" => OperandTemplate::Register(RegClass::SegmentWithCode),
            "m8" => OperandTemplate::Memory(Scalar::Byte),
            "m16" => OperandTemplate::Memory(Scalar::Word),
            "m16:16" => OperandTemplate::FarPointer(FarPointer::SegmentOffset),
            "m16:32" => OperandTemplate::FarPointer(FarPointer::PseudoDescriptor),
            "r/m8" => OperandTemplate::RegisterOrMemory(Scalar::Byte),
            "r/m16" => OperandTemplate::RegisterOrMemory(Scalar::Word),
            "moffs8" => OperandTemplate::MemoryOffset(Scalar::Byte),
            "moffs16" => OperandTemplate::MemoryOffset(Scalar::Word),
            "byte" => OperandTemplate::Direct(Width::Byte),
            "word" => OperandTemplate::Direct(Width::Word),
            "dword" => OperandTemplate::Direct(Width::Dword),
            "fword" => OperandTemplate::Direct(Width::Fword),
            "qword" => OperandTemplate::Direct(Width::Qword),
            "tbyte" => OperandTemplate::Direct(Width::Tbyte),
            "rel8" => OperandTemplate::Branch(Branch::Rel8),
            "short" => OperandTemplate::Branch(Branch::Short),
            "rel16" => OperandTemplate::Branch(Branch::Near),
            "imm8" => OperandTemplate::Immediate(Immediate::Imm8),
            "imm8u" => OperandTemplate::Immediate(Immediate::Imm8Unsigned),
            "imm16" => OperandTemplate::Immediate(Immediate::Imm16),
            "stack" => OperandTemplate::FpuStack,
            other => return Err(other.to_string()),
        };
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case(OperandTemplate::Memory(Scalar::Byte))]
    #[case(OperandTemplate::Memory(Scalar::Word))]
    #[case(OperandTemplate::FarPointer(FarPointer::PseudoDescriptor))]
    fn test_memory_set_has_120_distinct_renderings(#[case] template: OperandTemplate) {
        let set = template.generate();
        assert_eq!(set.len(), 120);

        let distinct: HashSet<_> = set.iter().collect();
        assert_eq!(distinct.len(), 120, "duplicate memory rendering");
    }

    #[rstest]
    #[case(RegClass::Byte, 8)]
    #[case(RegClass::Word, 8)]
    #[case(RegClass::Segment, 3)]
    #[case(RegClass::SegmentWithCode, 4)]
    fn test_register_class_sizes(#[case] class: RegClass, #[case] expected: usize) {
        let template = OperandTemplate::Register(class);
        let first = template.generate();
        assert_eq!(first.len(), expected);
        assert_eq!(template.cardinality(), expected);
        // Canonical order is stable across calls
        assert_eq!(first, template.generate());
    }

    #[test]
    fn test_memory_rendering_order() {
        let set = OperandTemplate::Memory(Scalar::Byte).generate();
        assert_eq!(set[0], "[BYTE BX+SI]");
        // BP without displacement is the direct-address form
        assert_eq!(set[6], "[BYTE 1234h]");
        assert_eq!(set[8], "[BYTE BX+SI+7fh]");
        assert_eq!(set[23], "[BYTE BX+7fffh]");
        // Second block carries the CS override
        assert_eq!(set[24], "[BYTE CS:BX+SI]");
        assert_eq!(set[30], "[BYTE CS:1234h]");
        assert_eq!(set[119], "[BYTE SS:BX+7fffh]");
    }

    #[test]
    fn test_register_or_memory_appends_registers() {
        let set = OperandTemplate::RegisterOrMemory(Scalar::Word).generate();
        assert_eq!(set.len(), 128);
        assert_eq!(&set[120..], &REG16.map(String::from)[..]);
        assert!(set[0].starts_with("[WORD "));
        assert_eq!(OperandTemplate::RegisterOrMemory(Scalar::Word).cardinality(), 128);
    }

    #[test]
    fn test_far_pointer_sizes() {
        let descriptor = OperandTemplate::FarPointer(FarPointer::PseudoDescriptor).generate();
        assert_eq!(descriptor.len(), 120);
        assert!(descriptor.iter().all(|op| op.starts_with("[FWORD ")));

        let far = OperandTemplate::FarPointer(FarPointer::SegmentOffset).generate();
        assert!(far.iter().all(|op| op.starts_with("[DWORD ")));
    }

    #[test]
    fn test_singleton_templates() {
        assert_eq!(OperandTemplate::Branch(Branch::Rel8).generate(), vec!["_target"]);
        assert_eq!(OperandTemplate::Branch(Branch::Short).generate(), vec!["SHORT _target"]);
        assert_eq!(OperandTemplate::Branch(Branch::Near).generate(), vec!["NEAR _target"]);
        assert_eq!(OperandTemplate::Immediate(Immediate::Imm8).generate(), vec!["7fh"]);
        assert_eq!(OperandTemplate::Immediate(Immediate::Imm8Unsigned).generate(), vec!["99h"]);
        assert_eq!(OperandTemplate::Immediate(Immediate::Imm16).generate(), vec!["7fffh"]);
        assert_eq!(OperandTemplate::MemoryOffset(Scalar::Byte).generate(), vec!["[BYTE 90a0h]"]);
        assert_eq!(OperandTemplate::Direct(Width::Qword).generate(), vec!["[QWORD 90a0h]"]);
        assert_eq!(OperandTemplate::Implicit("AL").generate(), vec!["AL"]);
        assert_eq!(OperandTemplate::Literal("3").generate(), vec!["3"]);
    }

    #[test]
    fn test_fpu_stack_set() {
        assert_eq!(OperandTemplate::FpuStack.generate(), vec!["ST", "ST(0)", "ST(1)", "ST(7)"]);
    }

    #[test]
    fn test_cardinality_matches_generate() {
        let notations = [
            "AL", "AX", "CL", "DX", "ST", "1", "3", "r8", "r16", "Sreg", "SregCS", "m8", "m16", "m16:16",
            "m16:32", "r/m8", "r/m16", "moffs8", "moffs16", "byte", "word", "dword", "fword", "qword", "tbyte", "rel8",
            "short", "rel16", "imm8", "imm8u", "imm16", "stack",
        ];
        for notation in notations {
            let template: OperandTemplate = notation.parse().unwrap();
            assert_eq!(template.cardinality(), template.generate().len(), "{notation}");
            assert_eq!(template.to_string(), notation);
        }
    }

    #[test]
    fn test_every_sized_template_round_trips() {
        let widths = [Width::Byte, Width::Word, Width::Dword, Width::Fword, Width::Qword, Width::Tbyte];
        let mut templates: Vec<OperandTemplate> = widths.iter().map(|width| OperandTemplate::Direct(*width)).collect();
        for scalar in [Scalar::Byte, Scalar::Word] {
            templates.push(OperandTemplate::Memory(scalar));
            templates.push(OperandTemplate::RegisterOrMemory(scalar));
            templates.push(OperandTemplate::MemoryOffset(scalar));
        }
        templates.push(OperandTemplate::FarPointer(FarPointer::SegmentOffset));
        templates.push(OperandTemplate::FarPointer(FarPointer::PseudoDescriptor));

        let mut notations = HashSet::new();
        for template in templates {
            let notation = template.to_string();
            assert_eq!(notation.parse::<OperandTemplate>(), Ok(template), "{notation}");
            assert!(notations.insert(notation));
        }
    }

    #[test]
    fn test_unknown_notation() {
        assert_eq!("r32".parse::<OperandTemplate>(), Err("r32".to_string()));
    }

    #[test]
    fn test_large_templates() {
        assert!(OperandTemplate::RegisterOrMemory(Scalar::Byte).is_large());
        assert!(OperandTemplate::Memory(Scalar::Word).is_large());
        assert!(OperandTemplate::FarPointer(FarPointer::PseudoDescriptor).is_large());
        assert!(!OperandTemplate::Register(RegClass::Word).is_large());
        assert!(!OperandTemplate::FpuStack.is_large());
    }
}
