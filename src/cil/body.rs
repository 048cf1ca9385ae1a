//! CIL method bodies: header decode, instruction stream and exception
//! sections (II.25.4).
//!
//! Failure semantics are deliberately asymmetric. A malformed *header*
//! aborts the method with [`crate::Error::Malformed`] - nothing after it
//! can be addressed. Malformed *content* degrades gracefully: an
//! unassigned opcode byte decodes to the `unknown` sentinel, a branch to
//! nowhere becomes an orphan target, an ill-formed exception clause is
//! dropped, and a truncated instruction ends the stream with a partial
//! body. Obfuscated and hand-crafted files are a primary use case; one
//! corrupt method must never prevent loading the rest of an assembly.

use bitflags::bitflags;

use crate::{
    cil::{
        exceptions::{ExceptionHandler, ExceptionHandlerFlags, RawExceptionClause},
        instruction::{Instruction, Operand, Target},
        opcodes::{self, OpcodeSet, OperandType},
    },
    file::{io::read_le, parser::Parser},
    metadata::token::Token,
    Error::OutOfBounds,
    Result,
};

bitflags! {
    /// Method body header flags (fat headers carry the full 12 bits).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny header format tag.
        const TINY_FORMAT = 0x0002;
        /// Fat header format tag.
        const FAT_FORMAT = 0x0003;
        /// More sections (exception handler data) follow the code.
        const MORE_SECTS = 0x0008;
        /// Locals are zero-initialized on entry.
        const INIT_LOCALS = 0x0010;
    }
}

bitflags! {
    /// Flags of a method data section header (II.25.4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// The section holds an exception clause list.
        const EHTABLE = 0x01;
        /// Reserved legacy section kind.
        const OPTILTABLE = 0x02;
        /// Clauses use the fat (24-byte) encoding.
        const FAT_FORMAT = 0x40;
        /// Another section follows this one.
        const MORE_SECTS = 0x80;
    }
}

/// Max-stack value implied by a tiny header.
pub const TINY_MAX_STACK: u16 = 8;

/// One local variable, as resolved by the metadata collaborator.
///
/// Signature grammar decoding lives outside this crate; a local is the
/// slot index plus whatever type token the resolver could attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    /// Zero-based slot index.
    pub index: u16,
    /// The local's type, when the resolver knows it.
    pub type_token: Option<Token>,
}

/// Collaborator resolving a `StandAloneSig` token to the method's local
/// variable list.
pub trait LocalsResolver {
    /// The locals described by `token`, or `None` if the token cannot be
    /// resolved (the body still decodes, with an empty local list).
    fn resolve_locals(&self, token: Token) -> Option<Vec<LocalVar>>;
}

/// A resolver that knows nothing - for raw decoding without metadata.
pub struct NoLocals;

impl LocalsResolver for NoLocals {
    fn resolve_locals(&self, _token: Token) -> Option<Vec<LocalVar>> {
        None
    }
}

/// A decoded method body: header fields, the instruction arena and the
/// exception handler list.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Maximum operand stack depth.
    pub max_stack: u16,
    /// Zero-initialize locals on entry.
    pub init_locals: bool,
    /// Whether the decoded header was fat.
    pub is_fat: bool,
    /// Header size in bytes (1 or a multiple of 4).
    pub header_size: u32,
    /// Code size in bytes as decoded.
    pub code_size: u32,
    /// The locals signature token; null when the method has no locals.
    pub local_var_sig_token: Token,
    /// The resolved locals (empty without a resolver).
    pub locals: Vec<LocalVar>,
    /// The instruction arena, in offset order.
    pub instructions: Vec<Instruction>,
    /// Exception handler regions referencing the arena.
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// An empty body for building methods from scratch.
    #[must_use]
    pub fn new() -> MethodBody {
        MethodBody {
            max_stack: TINY_MAX_STACK,
            init_locals: true,
            is_fat: false,
            header_size: 1,
            code_size: 0,
            local_var_sig_token: Token::new(0),
            locals: Vec::new(),
            instructions: Vec::new(),
            exception_handlers: Vec::new(),
        }
    }

    /// Recomputes every instruction's byte offset from scratch, in arena
    /// order, and returns the resulting code size.
    ///
    /// Must be called after any edit that changes instruction sizes;
    /// branch shortening iterates this until a fixed point.
    pub fn update_offsets(&mut self) -> u32 {
        let mut offset = 0_u32;
        for instruction in &mut self.instructions {
            instruction.offset = offset;
            offset += instruction.size();
        }
        self.code_size = offset;
        offset
    }

    /// The arena index of the instruction starting at `offset`, via
    /// binary search over the (monotonic) offset order.
    #[must_use]
    pub fn instruction_at_offset(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |instruction| instruction.offset)
            .ok()
    }

    /// The byte offset of arena index `index`, or the end of the code
    /// for `None` (the "end of method" handler boundary).
    #[must_use]
    pub fn boundary_offset(&self, index: Option<usize>) -> u32 {
        match index {
            Some(index) => self
                .instructions
                .get(index)
                .map_or(self.code_size, |instruction| instruction.offset),
            None => self.code_size,
        }
    }
}

impl Default for MethodBody {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder for method body byte ranges.
///
/// Carries the opcode tables to resolve against - the standard set by
/// default, or a caller-owned overlay for experimental opcodes.
pub struct BodyReader<'a> {
    opcodes: OpcodeSet<'a>,
}

impl BodyReader<'static> {
    /// A reader over the standard opcode tables.
    #[must_use]
    pub fn new() -> BodyReader<'static> {
        BodyReader {
            opcodes: OpcodeSet::standard(),
        }
    }
}

impl Default for BodyReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BodyReader<'a> {
    /// A reader resolving against a caller-owned opcode set.
    #[must_use]
    pub fn with_opcodes(opcodes: OpcodeSet<'a>) -> BodyReader<'a> {
        BodyReader { opcodes }
    }

    /// Decodes a full method body.
    ///
    /// `data` starts at the method header. `eh_data` optionally supplies
    /// handler sections stored outside the code blob; when `None`, the
    /// sections are read from `data` at the first 4-byte-aligned offset
    /// after the code (if the header announces any).
    ///
    /// # Errors
    /// Only structural failures error: an empty input, a header that is
    /// neither tiny nor fat, or a header whose announced sizes pass the
    /// end of `data`.
    pub fn read(
        &self,
        data: &[u8],
        eh_data: Option<&[u8]>,
        resolver: &dyn LocalsResolver,
    ) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        let mut body = match first_byte & 0b11 {
            0b10 => {
                let size_code = u32::from(first_byte >> 2);
                if size_code as usize + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                let mut body = MethodBody::new();
                body.max_stack = TINY_MAX_STACK;
                body.header_size = 1;
                body.code_size = size_code;
                body
            }
            0b11 => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = u32::from(first_duo >> 12) * 4;
                if size_header < 12 {
                    return Err(malformed_error!(
                        "Fat header size {} below the 12-byte minimum",
                        size_header
                    ));
                }

                let flags = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);
                let size_code = read_le::<u32>(&data[4..])?;
                let Some(total) = (size_code as usize).checked_add(size_header as usize) else {
                    return Err(OutOfBounds);
                };
                if data.len() < total {
                    return Err(OutOfBounds);
                }

                let mut body = MethodBody::new();
                body.is_fat = true;
                body.max_stack = read_le::<u16>(&data[2..])?;
                body.init_locals = flags.contains(MethodBodyFlags::INIT_LOCALS);
                body.header_size = size_header;
                body.code_size = size_code;
                body.local_var_sig_token = Token::new(read_le::<u32>(&data[8..])?);
                body
            }
            tag => {
                return Err(malformed_error!(
                    "MethodHeader is neither FAT nor TINY - tag {}",
                    tag
                ))
            }
        };

        if !body.local_var_sig_token.is_null() {
            body.locals = resolver
                .resolve_locals(body.local_var_sig_token)
                .unwrap_or_default();
        }

        let code_start = body.header_size as usize;
        let code_end = code_start + body.code_size as usize;
        body.instructions = self.decode_instructions(&data[code_start..code_end]);
        resolve_branches(&mut body);

        let has_more_sects = body.is_fat && {
            let first_duo = read_le::<u16>(data)?;
            MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF)
                .contains(MethodBodyFlags::MORE_SECTS)
        };

        if let Some(eh_bytes) = eh_data {
            read_exception_sections(&mut body, eh_bytes, 0);
        } else if has_more_sects {
            let aligned = (code_end + 3) & !3;
            read_exception_sections(&mut body, data, aligned);
        }

        Ok(body)
    }

    /// Decodes the raw code bytes of a method, offsets starting at 0.
    ///
    /// Content-level corruption ends the stream early instead of
    /// failing: the instructions decoded so far are returned.
    fn decode_instructions(&self, code: &[u8]) -> Vec<Instruction> {
        let mut parser = Parser::new(code);
        let mut instructions = Vec::new();

        while parser.has_more_data() {
            #[allow(clippy::cast_possible_truncation)]
            let offset = parser.pos() as u32;

            let Ok(first_byte) = parser.read_le::<u8>() else {
                break;
            };

            let opcode = if first_byte == 0xFE {
                let Ok(second_byte) = parser.read_le::<u8>() else {
                    break;
                };
                self.opcodes.lookup(0xFE00 | u16::from(second_byte))
            } else {
                self.opcodes.lookup(u16::from(first_byte))
            };

            let Ok(operand) = decode_operand(&mut parser, opcode.value, opcode.operand) else {
                // A truncated operand ends the stream; the body stays
                // partially decoded
                break;
            };

            instructions.push(Instruction {
                offset,
                opcode: *opcode,
                operand,
            });
        }

        instructions
    }
}

/// Decodes one operand of the given kind at the cursor.
///
/// Branch displacements are turned into absolute byte offsets here
/// (relative to the next instruction; for `switch`, relative to the end
/// of the whole instruction).
fn decode_operand(parser: &mut Parser, opcode: u16, kind: OperandType) -> Result<Operand> {
    Ok(match kind {
        OperandType::InlineNone => Operand::None,
        OperandType::ShortInlineI => Operand::Int32(i32::from(parser.read_le::<i8>()?)),
        OperandType::InlineI => Operand::Int32(parser.read_le::<i32>()?),
        OperandType::InlineI8 => Operand::Int64(parser.read_le::<i64>()?),
        OperandType::ShortInlineR => Operand::Float32(parser.read_le::<f32>()?),
        OperandType::InlineR => Operand::Float64(parser.read_le::<f64>()?),
        OperandType::InlineString
        | OperandType::InlineField
        | OperandType::InlineMethod
        | OperandType::InlineType
        | OperandType::InlineTok
        | OperandType::InlineSig => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::ShortInlineVar => {
            let index = u16::from(parser.read_le::<u8>()?);
            variable_operand(opcode, index)
        }
        OperandType::InlineVar => {
            let index = parser.read_le::<u16>()?;
            variable_operand(opcode, index)
        }
        OperandType::ShortInlineBrTarget => {
            let displacement = i64::from(parser.read_le::<i8>()?);
            Operand::Target(branch_target(parser.pos(), displacement))
        }
        OperandType::InlineBrTarget => {
            let displacement = i64::from(parser.read_le::<i32>()?);
            Operand::Target(branch_target(parser.pos(), displacement))
        }
        OperandType::InlineSwitch => {
            let count = parser.read_le::<u32>()? as usize;
            if count
                .checked_mul(4)
                .map_or(true, |bytes| parser.pos() + bytes > parser.len())
            {
                return Err(OutOfBounds);
            }

            let mut displacements = Vec::with_capacity(count);
            for _ in 0..count {
                displacements.push(i64::from(parser.read_le::<i32>()?));
            }

            // Targets are relative to the first byte after the whole
            // switch instruction
            let base = parser.pos();
            Operand::Switch(
                displacements
                    .into_iter()
                    .map(|displacement| branch_target(base, displacement))
                    .collect(),
            )
        }
    })
}

/// Whether a variable-kind operand means a local or an argument follows
/// from the opcode identity, not the operand kind.
fn variable_operand(opcode: u16, index: u16) -> Operand {
    match opcode {
        opcodes::LDARG_S
        | opcodes::LDARGA_S
        | opcodes::STARG_S
        | opcodes::LDARG
        | opcodes::LDARGA
        | opcodes::STARG => Operand::Argument(index),
        _ => Operand::Local(index),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn branch_target(next_offset: usize, displacement: i64) -> Target {
    // Negative absolutes cannot resolve and surface as orphans after the
    // fixup pass; the wrap keeps the raw value observable
    Target::Offset((next_offset as i64 + displacement) as u32)
}

/// The second pass: rewrite every raw branch offset to the arena index
/// of the instruction starting there, or an orphan marker.
fn resolve_branches(body: &mut MethodBody) {
    let offsets: Vec<u32> = body
        .instructions
        .iter()
        .map(|instruction| instruction.offset)
        .collect();

    let resolve = |target: Target| -> Target {
        match target {
            Target::Offset(offset) => match offsets.binary_search(&offset) {
                Ok(index) => Target::Instr(index),
                Err(_) => Target::Orphan(offset),
            },
            resolved => resolved,
        }
    };

    for instruction in &mut body.instructions {
        match &mut instruction.operand {
            Operand::Target(target) => *target = resolve(*target),
            Operand::Switch(targets) => {
                for target in targets {
                    *target = resolve(*target);
                }
            }
            _ => {}
        }
    }
}

/// Parses the method data sections at `cursor`, appending well-formed
/// exception handlers to the body. Ill-formed clauses and trailers are
/// dropped silently.
fn read_exception_sections(body: &mut MethodBody, data: &[u8], mut cursor: usize) {
    while data.len() > cursor + 4 {
        let section_byte = data[cursor];
        let flags = SectionFlags::from_bits_truncate(section_byte);

        // Low 6 bits must name an exception clause list or the whole
        // trailer is ignored
        if section_byte & 0x3F != SectionFlags::EHTABLE.bits() {
            break;
        }

        if flags.contains(SectionFlags::FAT_FORMAT) {
            let Ok(size_word) = read_le::<u32>(&data[cursor + 1..]) else {
                break;
            };
            let section_size = (size_word & 0x00FF_FFFF) as usize;
            if section_size < 4 || data.len() < cursor + section_size {
                break;
            }

            let mut offset = cursor + 4;
            for _ in 0..(section_size - 4) / 24 {
                let Some(clause) = read_fat_clause(data, &mut offset) else {
                    break;
                };
                append_handler(body, clause);
            }
            cursor += section_size;
        } else {
            let section_size = usize::from(data[cursor + 1]);
            if section_size < 4 || data.len() < cursor + section_size {
                break;
            }

            let mut offset = cursor + 4;
            for _ in 0..(section_size - 4) / 12 {
                let Some(clause) = read_small_clause(data, &mut offset) else {
                    break;
                };
                append_handler(body, clause);
            }
            cursor += section_size;
        }

        if !flags.contains(SectionFlags::MORE_SECTS) {
            break;
        }

        // The next section starts 4-byte aligned
        cursor = (cursor + 3) & !3;
    }
}

fn read_fat_clause(data: &[u8], offset: &mut usize) -> Option<RawExceptionClause> {
    use crate::file::io::read_le_at;

    #[allow(clippy::cast_possible_truncation)]
    let flags = read_le_at::<u32>(data, offset).ok()? as u16;

    Some(RawExceptionClause {
        flags,
        try_offset: read_le_at::<u32>(data, offset).ok()?,
        try_length: read_le_at::<u32>(data, offset).ok()?,
        handler_offset: read_le_at::<u32>(data, offset).ok()?,
        handler_length: read_le_at::<u32>(data, offset).ok()?,
        class_token_or_filter: read_le_at::<u32>(data, offset).ok()?,
    })
}

fn read_small_clause(data: &[u8], offset: &mut usize) -> Option<RawExceptionClause> {
    use crate::file::io::read_le_at;

    Some(RawExceptionClause {
        flags: read_le_at::<u16>(data, offset).ok()?,
        try_offset: u32::from(read_le_at::<u16>(data, offset).ok()?),
        try_length: u32::from(read_le_at::<u8>(data, offset).ok()?),
        handler_offset: u32::from(read_le_at::<u16>(data, offset).ok()?),
        handler_length: u32::from(read_le_at::<u8>(data, offset).ok()?),
        class_token_or_filter: read_le_at::<u32>(data, offset).ok()?,
    })
}

/// Resolves a raw clause against the instruction arena and appends it,
/// unless the clause is ill-formed (then it is dropped, not fatal).
fn append_handler(body: &mut MethodBody, clause: RawExceptionClause) {
    if !clause.is_well_formed() {
        return;
    }

    let boundary = |offset: u32| -> Option<usize> {
        if offset >= body.code_size {
            // End of method
            None
        } else {
            body.instruction_at_offset(offset)
        }
    };

    let flags = ExceptionHandlerFlags::from_bits_truncate(clause.flags);
    let is_filter = flags.contains(ExceptionHandlerFlags::FILTER);
    let is_catch = clause.flags & 0x0007 == 0;

    body.exception_handlers.push(ExceptionHandler {
        flags,
        try_start: body.instruction_at_offset(clause.try_offset),
        try_end: boundary(clause.try_offset.saturating_add(clause.try_length)),
        filter_start: if is_filter {
            body.instruction_at_offset(clause.class_token_or_filter)
        } else {
            None
        },
        handler_start: body.instruction_at_offset(clause.handler_offset),
        handler_end: boundary(clause.handler_offset.saturating_add(clause.handler_length)),
        catch_type: if is_catch {
            Some(Token::new(clause.class_token_or_filter))
        } else {
            None
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cil::opcodes::{self};

    fn read(data: &[u8]) -> MethodBody {
        BodyReader::new().read(data, None, &NoLocals).unwrap()
    }

    /// Builds a fat header in front of `code`, optionally followed by an
    /// aligned exception section.
    fn fat_body(code: &[u8], locals_token: u32, eh_section: Option<&[u8]>) -> Vec<u8> {
        let mut flags = 0x3003_u16 | u16::from(MethodBodyFlags::INIT_LOCALS.bits());
        if eh_section.is_some() {
            flags |= u16::from(MethodBodyFlags::MORE_SECTS.bits());
        }

        let mut data = Vec::new();
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&4_u16.to_le_bytes()); // max stack
        data.extend_from_slice(&(code.len() as u32).to_le_bytes());
        data.extend_from_slice(&locals_token.to_le_bytes());
        data.extend_from_slice(code);

        if let Some(section) = eh_section {
            while data.len() % 4 != 0 {
                data.push(0);
            }
            data.extend_from_slice(section);
        }
        data
    }

    #[test]
    fn tiny_header() {
        // 0x2A: low bits 0b10 (tiny), code size 0x2A >> 2 = 10
        let mut data = vec![0x2A_u8];
        data.extend_from_slice(&[0x00; 9]);
        data.push(0x2A); // ret as the 10th code byte

        let body = read(&data);
        assert!(!body.is_fat);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.header_size, 1);
        assert_eq!(body.code_size, 10);
        assert!(body.local_var_sig_token.is_null());
        assert_eq!(body.instructions.len(), 10);
        assert_eq!(body.instructions[9].opcode.mnemonic, "ret");
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn invalid_header_tag() {
        assert!(BodyReader::new().read(&[0x01], None, &NoLocals).is_err());
        assert!(BodyReader::new().read(&[], None, &NoLocals).is_err());
    }

    #[test]
    fn truncated_tiny_rejected() {
        // Claims 10 code bytes, provides 2
        let data = [0x2A, 0x00, 0x00];
        assert!(BodyReader::new().read(&data, None, &NoLocals).is_err());
    }

    #[test]
    fn fat_header_with_locals() {
        struct TwoLocals;
        impl LocalsResolver for TwoLocals {
            fn resolve_locals(&self, token: Token) -> Option<Vec<LocalVar>> {
                assert_eq!(token.value(), 0x1100_0002);
                Some(vec![
                    LocalVar { index: 0, type_token: None },
                    LocalVar { index: 1, type_token: None },
                ])
            }
        }

        let data = fat_body(&[0x00, 0x2A], 0x1100_0002, None);
        let body = BodyReader::new().read(&data, None, &TwoLocals).unwrap();

        assert!(body.is_fat);
        assert!(body.init_locals);
        assert_eq!(body.max_stack, 4);
        assert_eq!(body.header_size, 12);
        assert_eq!(body.code_size, 2);
        assert_eq!(body.locals.len(), 2);
        assert_eq!(body.instructions.len(), 2);
    }

    #[test]
    fn branch_fixup() {
        // 0: nop, 1: br.s +1 (to 4), 3: ret, 4: ret
        let body = read(&fat_body(&[0x00, 0x2B, 0x01, 0x2A, 0x2A], 0, None));

        assert_eq!(body.instructions.len(), 4);
        assert_eq!(
            body.instructions[1].operand,
            Operand::Target(Target::Instr(3))
        );
    }

    #[test]
    fn backward_branch_fixup() {
        // 0: nop, 1: br.s -3 (to 0)
        let body = read(&fat_body(&[0x00, 0x2B, 0xFD], 0, None));
        assert_eq!(
            body.instructions[1].operand,
            Operand::Target(Target::Instr(0))
        );
    }

    #[test]
    fn orphan_branch_target() {
        // br.s into the middle of the following ldc.i4
        let body = read(&fat_body(&[0x2B, 0x01, 0x20, 0xAA, 0xBB, 0xCC, 0xDD], 0, None));
        assert_eq!(
            body.instructions[0].operand,
            Operand::Target(Target::Orphan(3))
        );
    }

    #[test]
    fn switch_targets() {
        // 0: switch [+0, +2], 13: nop, 14: ret, 15: ret
        let mut code = vec![0x45];
        code.extend_from_slice(&2_u32.to_le_bytes());
        code.extend_from_slice(&0_i32.to_le_bytes());
        code.extend_from_slice(&2_i32.to_le_bytes());
        code.extend_from_slice(&[0x00, 0x2A, 0x2A]);

        let body = read(&fat_body(&code, 0, None));
        assert_eq!(body.instructions.len(), 4);
        match &body.instructions[0].operand {
            Operand::Switch(targets) => {
                assert_eq!(targets[0], Target::Instr(1));
                assert_eq!(targets[1], Target::Instr(3));
            }
            other => panic!("expected switch operand, got {other:?}"),
        }
    }

    #[test]
    fn variable_operands_disambiguated() {
        // ldarg.s 2, ldloc.s 3, FE ldarg 4, FE stloc 5
        let code = [
            0x0E, 0x02, 0x11, 0x03, 0xFE, 0x09, 0x04, 0x00, 0xFE, 0x0E, 0x05, 0x00,
        ];
        let body = read(&fat_body(&code, 0, None));

        assert_eq!(body.instructions[0].operand, Operand::Argument(2));
        assert_eq!(body.instructions[1].operand, Operand::Local(3));
        assert_eq!(body.instructions[2].operand, Operand::Argument(4));
        assert_eq!(body.instructions[3].operand, Operand::Local(5));
    }

    #[test]
    fn unknown_opcode_is_sentinel() {
        let body = read(&fat_body(&[0x24, 0x2A], 0, None));
        assert_eq!(body.instructions.len(), 2);
        assert!(body.instructions[0].opcode.is_unknown());
        assert_eq!(body.instructions[1].opcode.mnemonic, "ret");
    }

    #[test]
    fn truncated_operand_yields_partial_body() {
        // nop, then ldc.i4 with only one operand byte
        let body = read(&fat_body(&[0x00, 0x20, 0x01], 0, None));
        assert_eq!(body.instructions.len(), 1);
        assert_eq!(body.instructions[0].opcode.mnemonic, "nop");
    }

    #[test]
    fn fat_exception_clause() {
        // 12 nops; catch clause try [0,6), handler [6,10)
        let mut section = vec![0x41, 28, 0, 0]; // fat EH section, 28 bytes
        for value in [
            0_u32,       // flags: catch
            0,           // try offset
            6,           // try length
            6,           // handler offset
            4,           // handler length
            0x0200_0001, // catch type token
        ] {
            section.extend_from_slice(&value.to_le_bytes());
        }

        let body = read(&fat_body(&[0x00; 12], 0, Some(&section)));
        assert_eq!(body.exception_handlers.len(), 1);

        let handler = &body.exception_handlers[0];
        assert!(handler.is_catch());
        assert_eq!(handler.try_start, Some(0));
        assert_eq!(handler.try_end, Some(6));
        assert_eq!(handler.handler_start, Some(6));
        assert_eq!(handler.handler_end, Some(10));
        assert_eq!(handler.catch_type, Some(Token::new(0x0200_0001)));
        assert_eq!(handler.filter_start, None);
    }

    #[test]
    fn small_exception_clause_to_end_of_method() {
        // finally clause whose handler runs to the end of the method
        let mut section = vec![0x01, 16, 0, 0]; // small EH section, 16 bytes
        section.extend_from_slice(&2_u16.to_le_bytes()); // finally
        section.extend_from_slice(&0_u16.to_le_bytes()); // try offset
        section.push(2); // try length
        section.extend_from_slice(&2_u16.to_le_bytes()); // handler offset
        section.push(2); // handler length
        section.extend_from_slice(&0_u32.to_le_bytes());

        let body = read(&fat_body(&[0x00, 0x00, 0x00, 0x2A], 0, Some(&section)));
        assert_eq!(body.exception_handlers.len(), 1);

        let handler = &body.exception_handlers[0];
        assert!(handler.is_finally());
        assert_eq!(handler.try_end, Some(2));
        assert_eq!(handler.handler_end, None); // end of method
        assert_eq!(handler.catch_type, None);
    }

    #[test]
    fn ill_formed_clauses_dropped() {
        // Two clauses: one with handler length 0, one filter starting
        // after its handler - both must be dropped
        let mut section = vec![0x01, 28, 0, 0];
        // clause 1: zero-length handler
        section.extend_from_slice(&0_u16.to_le_bytes());
        section.extend_from_slice(&0_u16.to_le_bytes());
        section.push(2);
        section.extend_from_slice(&2_u16.to_le_bytes());
        section.push(0);
        section.extend_from_slice(&0_u32.to_le_bytes());
        // clause 2: filter at/after handler start
        section.extend_from_slice(&1_u16.to_le_bytes());
        section.extend_from_slice(&0_u16.to_le_bytes());
        section.push(2);
        section.extend_from_slice(&2_u16.to_le_bytes());
        section.push(2);
        section.extend_from_slice(&2_u32.to_le_bytes());

        let body = read(&fat_body(&[0x00; 4], 0, Some(&section)));
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn non_eh_trailer_ignored() {
        let section = [0x02_u8, 8, 0, 0, 0, 0, 0, 0]; // OPTILTABLE kind
        let body = read(&fat_body(&[0x00, 0x2A], 0, Some(&section)));
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn separate_eh_buffer() {
        let mut section = vec![0x01, 16, 0, 0];
        section.extend_from_slice(&2_u16.to_le_bytes());
        section.extend_from_slice(&0_u16.to_le_bytes());
        section.push(1);
        section.extend_from_slice(&1_u16.to_le_bytes());
        section.push(1);
        section.extend_from_slice(&0_u32.to_le_bytes());

        // Tiny body, handler data supplied out of band
        let data = [0x0A_u8, 0x00, 0x2A]; // tiny, 2 code bytes
        let body = BodyReader::new()
            .read(&data, Some(&section), &NoLocals)
            .unwrap();
        assert_eq!(body.exception_handlers.len(), 1);
    }

    #[test]
    fn offsets_update() {
        let mut body = MethodBody::new();
        body.instructions = vec![
            Instruction::new(opcodes::LDC_I4, Operand::Int32(1)),
            Instruction::simple(opcodes::NOP),
            Instruction::simple(opcodes::RET),
        ];

        assert_eq!(body.update_offsets(), 7);
        assert_eq!(body.instructions[1].offset, 5);
        assert_eq!(body.instructions[2].offset, 6);
        assert_eq!(body.instruction_at_offset(6), Some(2));
        assert_eq!(body.instruction_at_offset(3), None);
    }
}
