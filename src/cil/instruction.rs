//! Decoded CIL instructions and their operands.
//!
//! Instructions live in a flat arena (`Vec<Instruction>`) owned by the
//! enclosing method body; branch operands and exception-handler
//! boundaries refer to other instructions by arena index. That models
//! the format's inherent reference cycles (a loop's back edge targets an
//! earlier instruction) without ownership cycles, and edits only ever
//! need index renumbering.

use std::fmt;

use crate::{
    cil::opcodes::{OpCode, OperandType},
    metadata::token::Token,
};

/// A branch destination through its resolution lifecycle.
///
/// Decoders first record the raw byte offset; the second pass rewrites
/// it to the index of the instruction starting there. An offset no
/// instruction starts at becomes [`Target::Orphan`] - a corruption
/// signal for that one edge, deliberately not a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A raw byte offset within the method body, not yet resolved.
    Offset(u32),
    /// Resolved: index of the target instruction in the body's arena.
    Instr(usize),
    /// Resolution failed - no instruction starts at this offset.
    Orphan(u32),
}

/// The operand of one instruction, shaped by the opcode's declared
/// operand kind.
///
/// Integer immediates are widened to `i32`/`i64` regardless of their
/// stored width - the opcode's [`OperandType`] keeps the on-disk size,
/// so encoding is lossless. Local and argument indices get distinct
/// variants because the short/long variable kinds are shared between
/// `ldloc`/`ldarg` families and only the opcode identity disambiguates.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand.
    None,
    /// An integer immediate (`ldc.i4`, `ldc.i4.s`, `unaligned.`).
    Int32(i32),
    /// A 64-bit immediate (`ldc.i8`).
    Int64(i64),
    /// A 32-bit float immediate (`ldc.r4`).
    Float32(f32),
    /// A 64-bit float immediate (`ldc.r8`).
    Float64(f64),
    /// A metadata token (fields, methods, types, signatures, strings).
    Token(Token),
    /// A local variable index.
    Local(u16),
    /// An argument index.
    Argument(u16),
    /// A branch target.
    Target(Target),
    /// The jump table of a `switch`.
    Switch(Vec<Target>),
}

/// One decoded instruction: its byte offset, opcode and operand.
///
/// The offset is assigned while decoding (a running counter) and
/// recomputed from scratch by
/// [`crate::cil::MethodBody::update_offsets`] after any edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of this instruction within the method's code.
    pub offset: u32,
    /// The opcode (copied out of the resolving table).
    pub opcode: OpCode,
    /// The decoded operand.
    pub operand: Operand,
}

impl Instruction {
    /// Builds an instruction from a standard-table opcode value and an
    /// operand, offset zero.
    #[must_use]
    pub fn new(value: u16, operand: Operand) -> Instruction {
        Instruction {
            offset: 0,
            opcode: *crate::cil::opcodes::opcode(value),
            operand,
        }
    }

    /// Builds an operand-less instruction from a standard-table opcode
    /// value.
    #[must_use]
    pub fn simple(value: u16) -> Instruction {
        Instruction::new(value, Operand::None)
    }

    /// Total encoded size of the instruction in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.opcode.size() + self.operand_size()
    }

    /// Encoded size of the operand alone.
    #[must_use]
    pub fn operand_size(&self) -> u32 {
        match self.opcode.operand {
            OperandType::InlineNone => 0,
            OperandType::ShortInlineI
            | OperandType::ShortInlineVar
            | OperandType::ShortInlineBrTarget => 1,
            OperandType::InlineVar => 2,
            OperandType::InlineI
            | OperandType::ShortInlineR
            | OperandType::InlineString
            | OperandType::InlineBrTarget
            | OperandType::InlineField
            | OperandType::InlineMethod
            | OperandType::InlineType
            | OperandType::InlineTok
            | OperandType::InlineSig => 4,
            OperandType::InlineI8 | OperandType::InlineR => 8,
            OperandType::InlineSwitch => match &self.operand {
                #[allow(clippy::cast_possible_truncation)]
                Operand::Switch(targets) => 4 + 4 * targets.len() as u32,
                _ => 4,
            },
        }
    }

    /// The branch target, if this instruction carries one.
    #[must_use]
    pub fn branch_target(&self) -> Option<Target> {
        match &self.operand {
            Operand::Target(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.is_unknown() {
            write!(f, "IL_{:04x}: .byte {:#06x}", self.offset, self.opcode.value)
        } else {
            write!(f, "IL_{:04x}: {}", self.offset, self.opcode.mnemonic)?;
            match &self.operand {
                Operand::None => Ok(()),
                Operand::Int32(value) => write!(f, " {value}"),
                Operand::Int64(value) => write!(f, " {value}"),
                Operand::Float32(value) => write!(f, " {value}"),
                Operand::Float64(value) => write!(f, " {value}"),
                Operand::Token(token) => write!(f, " {token}"),
                Operand::Local(index) => write!(f, " V_{index}"),
                Operand::Argument(index) => write!(f, " A_{index}"),
                Operand::Target(target) => write!(f, " {target:?}"),
                Operand::Switch(targets) => write!(f, " ({} targets)", targets.len()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cil::opcodes;

    #[test]
    fn sizes() {
        assert_eq!(Instruction::simple(opcodes::NOP).size(), 1);
        assert_eq!(Instruction::simple(opcodes::CEQ).size(), 2);
        assert_eq!(
            Instruction::new(opcodes::LDC_I4_S, Operand::Int32(5)).size(),
            2
        );
        assert_eq!(
            Instruction::new(opcodes::LDC_I4, Operand::Int32(5)).size(),
            5
        );
        assert_eq!(
            Instruction::new(opcodes::LDC_I8, Operand::Int64(5)).size(),
            9
        );
        assert_eq!(
            Instruction::new(opcodes::LDARG, Operand::Argument(2)).size(),
            4
        );
        assert_eq!(
            Instruction::new(opcodes::LDC_R4, Operand::Float32(1.0)).size(),
            5
        );
        assert_eq!(
            Instruction::new(
                opcodes::SWITCH,
                Operand::Switch(vec![Target::Offset(0), Target::Offset(4), Target::Offset(8)])
            )
            .size(),
            1 + 4 + 12
        );
    }

    #[test]
    fn display() {
        let mut instr = Instruction::new(opcodes::LDC_I4, Operand::Int32(42));
        instr.offset = 0x10;
        assert_eq!(format!("{instr}"), "IL_0010: ldc.i4 42");
    }
}
