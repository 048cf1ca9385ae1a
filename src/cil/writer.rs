//! Method body encoding - the inverse of [`crate::cil::BodyReader`].
//!
//! Encoding is mostly mechanical: refresh offsets, emit opcodes and
//! operands, pick the tiny or fat header, and serialize the exception
//! clauses in the smallest encoding that can represent them. Branch
//! displacements are computed against the refreshed offsets, so a body
//! edited through the normalizer round-trips without manual fixups.

use crate::{
    cil::{
        body::{MethodBody, MethodBodyFlags, SectionFlags, TINY_MAX_STACK},
        exceptions::{ExceptionHandler, ExceptionHandlerFlags},
        instruction::{Instruction, Operand, Target},
        opcodes::OperandType,
    },
    Result,
};

/// The serialized pieces of a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMethod {
    /// The method header (1 byte tiny, 12 bytes fat).
    pub header: Vec<u8>,
    /// The instruction stream.
    pub code: Vec<u8>,
    /// The exception sections, empty when the body has no handlers.
    /// Stored unaligned; [`EncodedMethod::to_bytes`] inserts the padding.
    pub exceptions: Vec<u8>,
}

impl EncodedMethod {
    /// The complete on-disk body: header, code, then the exception
    /// sections at the next 4-byte boundary.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            self.header.len() + self.code.len() + self.exceptions.len() + 3,
        );
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.code);

        if !self.exceptions.is_empty() {
            while bytes.len() % 4 != 0 {
                bytes.push(0);
            }
            bytes.extend_from_slice(&self.exceptions);
        }
        bytes
    }
}

/// Encoder for method bodies.
pub struct BodyWriter;

impl BodyWriter {
    /// The encoded size of the instruction stream, after refreshing
    /// offsets. Useful to size buffers before a full encode.
    pub fn code_size(body: &mut MethodBody) -> u32 {
        body.update_offsets()
    }

    /// Serializes a body into header, code and exception bytes.
    ///
    /// Offsets are recomputed first; the tiny header is chosen whenever
    /// the body qualifies (code under 64 bytes, max-stack within 8, no
    /// locals, no handlers).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when an operand does not fit
    /// its opcode's declared width (a short branch whose displacement
    /// overflows a signed byte, a short variable index above 255) or a
    /// branch targets an index outside the arena.
    pub fn encode(body: &mut MethodBody) -> Result<EncodedMethod> {
        body.update_offsets();

        let code = Self::encode_instructions(body)?;
        let exceptions = Self::encode_exceptions(body)?;

        let tiny_eligible = code.len() < 64
            && body.max_stack <= TINY_MAX_STACK
            && body.local_var_sig_token.is_null()
            && exceptions.is_empty();

        let header = if tiny_eligible {
            #[allow(clippy::cast_possible_truncation)]
            let tag = (code.len() as u8) << 2 | MethodBodyFlags::TINY_FORMAT.bits() as u8;
            vec![tag]
        } else {
            let mut flags = MethodBodyFlags::FAT_FORMAT.bits() | (3 << 12);
            if body.init_locals {
                flags |= MethodBodyFlags::INIT_LOCALS.bits();
            }
            if !exceptions.is_empty() {
                flags |= MethodBodyFlags::MORE_SECTS.bits();
            }

            let mut header = Vec::with_capacity(12);
            header.extend_from_slice(&flags.to_le_bytes());
            header.extend_from_slice(&body.max_stack.to_le_bytes());
            header.extend_from_slice(&(code.len() as u32).to_le_bytes());
            header.extend_from_slice(&body.local_var_sig_token.value().to_le_bytes());
            header
        };

        Ok(EncodedMethod {
            header,
            code,
            exceptions,
        })
    }

    fn encode_instructions(body: &MethodBody) -> Result<Vec<u8>> {
        let mut code = Vec::with_capacity(body.code_size as usize);

        for instruction in &body.instructions {
            if instruction.opcode.value > 0xFF {
                code.push(0xFE);
            }
            #[allow(clippy::cast_possible_truncation)]
            code.push(instruction.opcode.value as u8);

            Self::encode_operand(body, instruction, &mut code)?;
        }

        Ok(code)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode_operand(
        body: &MethodBody,
        instruction: &Instruction,
        code: &mut Vec<u8>,
    ) -> Result<()> {
        match instruction.opcode.operand {
            OperandType::InlineNone => {}
            OperandType::ShortInlineI => {
                let value = int_operand(instruction)?;
                let Ok(value) = i8::try_from(value) else {
                    return Err(malformed_error!(
                        "Operand {} does not fit '{}'",
                        value,
                        instruction.opcode.mnemonic
                    ));
                };
                code.push(value as u8);
            }
            OperandType::InlineI => {
                code.extend_from_slice(&int_operand(instruction)?.to_le_bytes());
            }
            OperandType::InlineI8 => {
                let Operand::Int64(value) = instruction.operand else {
                    return Err(operand_mismatch(instruction));
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::ShortInlineR => {
                let Operand::Float32(value) = instruction.operand else {
                    return Err(operand_mismatch(instruction));
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::InlineR => {
                let Operand::Float64(value) = instruction.operand else {
                    return Err(operand_mismatch(instruction));
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::InlineString
            | OperandType::InlineField
            | OperandType::InlineMethod
            | OperandType::InlineType
            | OperandType::InlineTok
            | OperandType::InlineSig => {
                let Operand::Token(token) = instruction.operand else {
                    return Err(operand_mismatch(instruction));
                };
                code.extend_from_slice(&token.value().to_le_bytes());
            }
            OperandType::ShortInlineVar => {
                let index = variable_index(instruction)?;
                let Ok(index) = u8::try_from(index) else {
                    return Err(malformed_error!(
                        "Variable index {} does not fit '{}'",
                        index,
                        instruction.opcode.mnemonic
                    ));
                };
                code.push(index);
            }
            OperandType::InlineVar => {
                code.extend_from_slice(&variable_index(instruction)?.to_le_bytes());
            }
            OperandType::ShortInlineBrTarget => {
                let next = instruction.offset + instruction.size();
                let displacement = Self::displacement(body, instruction, next)?;
                let Ok(displacement) = i8::try_from(displacement) else {
                    return Err(malformed_error!(
                        "Branch displacement {} does not fit '{}'",
                        displacement,
                        instruction.opcode.mnemonic
                    ));
                };
                code.push(displacement as u8);
            }
            OperandType::InlineBrTarget => {
                let next = instruction.offset + instruction.size();
                let displacement = Self::displacement(body, instruction, next)?;
                let Ok(displacement) = i32::try_from(displacement) else {
                    return Err(malformed_error!(
                        "Branch displacement {} does not fit '{}'",
                        displacement,
                        instruction.opcode.mnemonic
                    ));
                };
                code.extend_from_slice(&displacement.to_le_bytes());
            }
            OperandType::InlineSwitch => {
                let Operand::Switch(targets) = &instruction.operand else {
                    return Err(operand_mismatch(instruction));
                };

                code.extend_from_slice(&(targets.len() as u32).to_le_bytes());
                let base = i64::from(instruction.offset + instruction.size());
                for target in targets {
                    let offset = i64::from(target_offset(body, *target)?);
                    let Ok(displacement) = i32::try_from(offset - base) else {
                        return Err(malformed_error!("Switch displacement overflow"));
                    };
                    code.extend_from_slice(&displacement.to_le_bytes());
                }
            }
        }

        Ok(())
    }

    fn displacement(body: &MethodBody, instruction: &Instruction, next: u32) -> Result<i64> {
        let Operand::Target(target) = instruction.operand else {
            return Err(operand_mismatch(instruction));
        };

        Ok(i64::from(target_offset(body, target)?) - i64::from(next))
    }

    fn encode_exceptions(body: &MethodBody) -> Result<Vec<u8>> {
        if body.exception_handlers.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<ResolvedClause> = body
            .exception_handlers
            .iter()
            .map(|handler| ResolvedClause::from_handler(body, handler))
            .collect::<Result<_>>()?;

        // Small sections carry at most (255 - 4) / 12 = 20 clauses
        let small_eligible = clauses.len() <= 20 && clauses.iter().all(ResolvedClause::fits_small);

        let mut section = Vec::new();
        if small_eligible {
            #[allow(clippy::cast_possible_truncation)]
            let section_size = (4 + clauses.len() * 12) as u8;
            section.push(SectionFlags::EHTABLE.bits());
            section.push(section_size);
            section.extend_from_slice(&[0, 0]);

            for clause in &clauses {
                #[allow(clippy::cast_possible_truncation)]
                {
                    section.extend_from_slice(&(clause.flags as u16).to_le_bytes());
                    section.extend_from_slice(&(clause.try_offset as u16).to_le_bytes());
                    section.push(clause.try_length as u8);
                    section.extend_from_slice(&(clause.handler_offset as u16).to_le_bytes());
                    section.push(clause.handler_length as u8);
                    section.extend_from_slice(&clause.class_token_or_filter.to_le_bytes());
                }
            }
        } else {
            let section_size = 4 + clauses.len() * 24;
            if section_size > 0x00FF_FFFF {
                return Err(malformed_error!(
                    "Exception section size {} exceeds the 24-bit limit",
                    section_size
                ));
            }

            #[allow(clippy::cast_possible_truncation)]
            let size_word = (section_size as u32) << 8
                | u32::from(SectionFlags::EHTABLE.bits() | SectionFlags::FAT_FORMAT.bits());
            section.extend_from_slice(&size_word.to_le_bytes());

            for clause in &clauses {
                section.extend_from_slice(&clause.flags.to_le_bytes());
                section.extend_from_slice(&clause.try_offset.to_le_bytes());
                section.extend_from_slice(&clause.try_length.to_le_bytes());
                section.extend_from_slice(&clause.handler_offset.to_le_bytes());
                section.extend_from_slice(&clause.handler_length.to_le_bytes());
                section.extend_from_slice(&clause.class_token_or_filter.to_le_bytes());
            }
        }

        Ok(section)
    }
}

/// A handler with its boundaries resolved back to byte offsets.
struct ResolvedClause {
    flags: u32,
    try_offset: u32,
    try_length: u32,
    handler_offset: u32,
    handler_length: u32,
    class_token_or_filter: u32,
}

impl ResolvedClause {
    fn from_handler(body: &MethodBody, handler: &ExceptionHandler) -> Result<ResolvedClause> {
        let start = |index: Option<usize>| -> Result<u32> {
            match index {
                Some(index) => body
                    .instructions
                    .get(index)
                    .map(|instruction| instruction.offset)
                    .ok_or_else(|| malformed_error!("Handler references instruction {}", index)),
                None => Err(malformed_error!("Handler start must reference an instruction")),
            }
        };

        let try_offset = start(handler.try_start)?;
        let try_end = body.boundary_offset(handler.try_end);
        let handler_offset = start(handler.handler_start)?;
        let handler_end = body.boundary_offset(handler.handler_end);

        if try_end < try_offset || handler_end < handler_offset {
            return Err(malformed_error!("Handler region boundaries are inverted"));
        }

        let class_token_or_filter = if handler.flags.contains(ExceptionHandlerFlags::FILTER) {
            start(handler.filter_start)?
        } else {
            handler.catch_type.map_or(0, |token| token.value())
        };

        Ok(ResolvedClause {
            flags: u32::from(handler.flags.bits()),
            try_offset,
            try_length: try_end - try_offset,
            handler_offset,
            handler_length: handler_end - handler_offset,
            class_token_or_filter,
        })
    }

    fn fits_small(&self) -> bool {
        self.try_offset <= 0xFFFF
            && self.try_length <= 0xFF
            && self.handler_offset <= 0xFFFF
            && self.handler_length <= 0xFF
    }
}

fn operand_mismatch(instruction: &Instruction) -> crate::Error {
    malformed_error!(
        "Operand {:?} does not match '{}'",
        instruction.operand,
        instruction.opcode.mnemonic
    )
}

fn int_operand(instruction: &Instruction) -> Result<i32> {
    match instruction.operand {
        Operand::Int32(value) => Ok(value),
        _ => Err(operand_mismatch(instruction)),
    }
}

fn variable_index(instruction: &Instruction) -> Result<u16> {
    match instruction.operand {
        Operand::Local(index) | Operand::Argument(index) => Ok(index),
        _ => Err(operand_mismatch(instruction)),
    }
}

fn target_offset(body: &MethodBody, target: Target) -> Result<u32> {
    match target {
        Target::Instr(index) => body
            .instructions
            .get(index)
            .map(|instruction| instruction.offset)
            .ok_or_else(|| malformed_error!("Branch targets instruction {} outside the arena", index)),
        // Raw and orphan targets re-encode as the offset they carried
        Target::Offset(offset) | Target::Orphan(offset) => Ok(offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cil::{
        body::{BodyReader, NoLocals},
        opcodes,
    };
    use crate::metadata::token::Token;

    #[test]
    fn tiny_roundtrip() {
        let mut body = MethodBody::new();
        body.instructions = vec![
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::RET),
        ];

        let encoded = BodyWriter::encode(&mut body).unwrap();
        assert_eq!(encoded.header, vec![(2 << 2) | 0x2]);
        assert_eq!(encoded.code, vec![0x00, 0x2A]);
        assert!(encoded.exceptions.is_empty());

        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();
        assert!(!decoded.is_fat);
        assert_eq!(decoded.instructions, body.instructions);
    }

    #[test]
    fn fat_when_code_too_large() {
        let mut body = MethodBody::new();
        for _ in 0..64 {
            body.instructions.push(Instruction::simple(opcodes::NOP));
        }
        body.instructions.push(Instruction::simple(opcodes::RET));

        let encoded = BodyWriter::encode(&mut body).unwrap();
        assert_eq!(encoded.header.len(), 12);

        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();
        assert!(decoded.is_fat);
        assert_eq!(decoded.instructions.len(), 65);
    }

    #[test]
    fn branch_roundtrip() {
        let mut body = MethodBody::new();
        body.instructions = vec![
            Instruction::new(opcodes::BR, Operand::Target(Target::Instr(2))),
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::RET),
        ];

        let encoded = BodyWriter::encode(&mut body).unwrap();
        // br 5-byte instruction, displacement to offset 6 is +1
        assert_eq!(&encoded.code, &[0x38, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2A]);

        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();
        assert_eq!(
            decoded.instructions[0].operand,
            Operand::Target(Target::Instr(2))
        );
    }

    #[test]
    fn short_branch_overflow_rejected() {
        let mut body = MethodBody::new();
        body.instructions.push(Instruction::new(
            opcodes::BR_S,
            Operand::Target(Target::Instr(300)),
        ));
        for _ in 0..300 {
            body.instructions.push(Instruction::simple(opcodes::NOP));
        }

        assert!(BodyWriter::encode(&mut body).is_err());
    }

    #[test]
    fn switch_roundtrip() {
        let mut body = MethodBody::new();
        body.instructions = vec![
            Instruction::new(
                opcodes::SWITCH,
                Operand::Switch(vec![Target::Instr(1), Target::Instr(2)]),
            ),
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::RET),
        ];

        let encoded = BodyWriter::encode(&mut body).unwrap();
        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();

        assert_eq!(
            decoded.instructions[0].operand,
            Operand::Switch(vec![Target::Instr(1), Target::Instr(2)])
        );
    }

    #[test]
    fn exception_roundtrip_small() {
        let mut body = MethodBody::new();
        body.max_stack = 2;
        body.instructions = vec![
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::RET),
        ];
        body.exception_handlers = vec![ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: Some(0),
            try_end: Some(2),
            filter_start: None,
            handler_start: Some(2),
            handler_end: Some(3),
            catch_type: Some(Token::new(0x0200_0001)),
        }];

        let encoded = BodyWriter::encode(&mut body).unwrap();
        assert_eq!(encoded.exceptions[0], 0x01); // small EH section

        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();
        assert_eq!(decoded.exception_handlers, body.exception_handlers);
    }

    #[test]
    fn exception_fat_when_lengths_overflow() {
        let mut body = MethodBody::new();
        // 300 single-byte instructions force a handler length over 255
        for _ in 0..300 {
            body.instructions.push(Instruction::simple(opcodes::NOP));
        }
        body.instructions.push(Instruction::simple(opcodes::RET));
        body.exception_handlers = vec![ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start: Some(0),
            try_end: Some(2),
            filter_start: None,
            handler_start: Some(2),
            handler_end: Some(290),
            catch_type: None,
        }];

        let encoded = BodyWriter::encode(&mut body).unwrap();
        assert_eq!(encoded.exceptions[0] & 0x40, 0x40); // fat EH section

        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();
        assert_eq!(decoded.exception_handlers, body.exception_handlers);
    }

    #[test]
    fn general_form_roundtrip() {
        let mut body = MethodBody::new();
        body.max_stack = 3;
        body.instructions = vec![
            Instruction::new(opcodes::LDC_I4, Operand::Int32(-5)),
            Instruction::new(opcodes::LDC_I8, Operand::Int64(1 << 40)),
            Instruction::new(opcodes::LDC_R8, Operand::Float64(2.5)),
            Instruction::new(opcodes::LDARG, Operand::Argument(1)),
            Instruction::new(opcodes::LDLOC, Operand::Local(0)),
            Instruction::new(opcodes::LDSTR, Operand::Token(Token::new(0x7000_0001))),
            Instruction::new(opcodes::CALL, Operand::Token(Token::new(0x0600_0002))),
            Instruction::simple(opcodes::RET),
        ];
        let original = body.instructions.clone();

        let encoded = BodyWriter::encode(&mut body).unwrap();
        let decoded = BodyReader::new()
            .read(&encoded.to_bytes(), None, &NoLocals)
            .unwrap();

        // Offsets were assigned by encode; compare against the updated body
        assert_eq!(decoded.instructions, body.instructions);
        assert_eq!(decoded.instructions.len(), original.len());
    }
}
