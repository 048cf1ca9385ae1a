//! Macro instruction normalization - compact and general opcode forms.
//!
//! Two inverse, idempotent, whole-method transforms over the instruction
//! arena. [`MethodBody::simplify_macros`] rewrites every compact opcode
//! (`ldc.i4.3`, `ldarg.0`, `br.s`) into its general form with an explicit
//! operand, which makes rewriting passes uniform.
//! [`MethodBody::optimize_macros`] collapses back to the compact forms
//! where the operand permits, and [`MethodBody::optimize_branches`]
//! shrinks long branches to their short forms.
//!
//! Branch shrinking is a fixed point: shortening one branch moves every
//! later instruction, which can bring other branches into short range.
//! The loop therefore recomputes all offsets from scratch, scans, and
//! repeats the whole pass until nothing changes. Shortening is monotone
//! (displacements only shrink), so the loop terminates.

use crate::cil::{
    body::MethodBody,
    instruction::{Operand, Target},
    opcodes::{self, opcode},
};

impl MethodBody {
    /// Rewrites every compact opcode to its general form and every short
    /// branch to the long form. Instruction count and semantics are
    /// unchanged; running it twice is a no-op.
    pub fn simplify_macros(&mut self) {
        for instruction in &mut self.instructions {
            let (general, operand) = match instruction.opcode.value {
                opcodes::LDARG_0..=opcodes::LDARG_3 => (
                    opcodes::LDARG,
                    Operand::Argument((instruction.opcode.value - opcodes::LDARG_0) as u16),
                ),
                opcodes::LDLOC_0..=opcodes::LDLOC_3 => (
                    opcodes::LDLOC,
                    Operand::Local((instruction.opcode.value - opcodes::LDLOC_0) as u16),
                ),
                opcodes::STLOC_0..=opcodes::STLOC_3 => (
                    opcodes::STLOC,
                    Operand::Local((instruction.opcode.value - opcodes::STLOC_0) as u16),
                ),
                opcodes::LDARG_S => (opcodes::LDARG, instruction.operand.clone()),
                opcodes::LDARGA_S => (opcodes::LDARGA, instruction.operand.clone()),
                opcodes::STARG_S => (opcodes::STARG, instruction.operand.clone()),
                opcodes::LDLOC_S => (opcodes::LDLOC, instruction.operand.clone()),
                opcodes::LDLOCA_S => (opcodes::LDLOCA, instruction.operand.clone()),
                opcodes::STLOC_S => (opcodes::STLOC, instruction.operand.clone()),
                opcodes::LDC_I4_M1..=opcodes::LDC_I4_8 => (
                    opcodes::LDC_I4,
                    Operand::Int32(i32::from(instruction.opcode.value as i16) - i32::from(opcodes::LDC_I4_0 as i16)),
                ),
                opcodes::LDC_I4_S => (opcodes::LDC_I4, instruction.operand.clone()),
                _ => continue,
            };

            instruction.opcode = *opcode(general);
            instruction.operand = operand;
        }

        self.simplify_branches();
    }

    /// Rewrites every short-form branch to its long form.
    pub fn simplify_branches(&mut self) {
        for instruction in &mut self.instructions {
            if let Some(long) = long_branch(instruction.opcode.value) {
                instruction.opcode = *opcode(long);
            }
        }
        self.update_offsets();
    }

    /// Collapses general forms back to compact opcodes where the operand
    /// value permits, then shrinks long branches to short form. The
    /// maximally-compacted result is a fixed point of this transform.
    pub fn optimize_macros(&mut self) {
        for instruction in &mut self.instructions {
            let value = instruction.opcode.value;
            let replacement = match (&instruction.operand, value) {
                (Operand::Argument(index), opcodes::LDARG | opcodes::LDARG_S) => {
                    if *index <= 3 {
                        Some((opcodes::LDARG_0 + index, Operand::None))
                    } else if *index <= 0xFF && value == opcodes::LDARG {
                        Some((opcodes::LDARG_S, instruction.operand.clone()))
                    } else {
                        None
                    }
                }
                (Operand::Argument(index), opcodes::LDARGA) if *index <= 0xFF => {
                    Some((opcodes::LDARGA_S, instruction.operand.clone()))
                }
                (Operand::Argument(index), opcodes::STARG) if *index <= 0xFF => {
                    Some((opcodes::STARG_S, instruction.operand.clone()))
                }
                (Operand::Local(index), opcodes::LDLOC | opcodes::LDLOC_S) => {
                    if *index <= 3 {
                        Some((opcodes::LDLOC_0 + index, Operand::None))
                    } else if *index <= 0xFF && value == opcodes::LDLOC {
                        Some((opcodes::LDLOC_S, instruction.operand.clone()))
                    } else {
                        None
                    }
                }
                (Operand::Local(index), opcodes::STLOC | opcodes::STLOC_S) => {
                    if *index <= 3 {
                        Some((opcodes::STLOC_0 + index, Operand::None))
                    } else if *index <= 0xFF && value == opcodes::STLOC {
                        Some((opcodes::STLOC_S, instruction.operand.clone()))
                    } else {
                        None
                    }
                }
                (Operand::Local(index), opcodes::LDLOCA) if *index <= 0xFF => {
                    Some((opcodes::LDLOCA_S, instruction.operand.clone()))
                }
                (Operand::Int32(value_i4), opcodes::LDC_I4 | opcodes::LDC_I4_S) => {
                    if (-1..=8).contains(value_i4) {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let compact = (i32::from(opcodes::LDC_I4_0) + value_i4) as u16;
                        Some((compact, Operand::None))
                    } else if i8::try_from(*value_i4).is_ok() && value == opcodes::LDC_I4 {
                        Some((opcodes::LDC_I4_S, instruction.operand.clone()))
                    } else {
                        None
                    }
                }
                _ => None,
            };

            if let Some((compact, operand)) = replacement {
                instruction.opcode = *opcode(compact);
                instruction.operand = operand;
            }
        }

        self.optimize_branches();
    }

    /// Shrinks long branches whose displacement fits a signed byte.
    ///
    /// Runs "recompute offsets, scan, mutate, repeat" until a full pass
    /// changes nothing - shortening one branch moves everything after it
    /// and may bring further branches into range.
    pub fn optimize_branches(&mut self) {
        loop {
            self.update_offsets();

            let mut modified = false;
            for index in 0..self.instructions.len() {
                let Some(short) = short_branch(self.instructions[index].opcode.value) else {
                    continue;
                };
                let Operand::Target(target) = self.instructions[index].operand else {
                    continue;
                };

                // An unresolved target keeps its raw byte offset
                let target_offset = match target {
                    Target::Instr(target_index) => {
                        match self.instructions.get(target_index) {
                            Some(instruction) => instruction.offset,
                            None => continue,
                        }
                    }
                    Target::Offset(offset) | Target::Orphan(offset) => offset,
                };

                // Displacement as it would be after shortening: a short
                // branch is opcode (1) + displacement (1) bytes
                let next = i64::from(self.instructions[index].offset) + 2;
                let displacement = i64::from(target_offset) - next;
                if (-128..=127).contains(&displacement) {
                    self.instructions[index].opcode = *opcode(short);
                    modified = true;
                }
            }

            if !modified {
                break;
            }
        }
    }
}

/// The short form of a long branch opcode.
fn short_branch(value: u16) -> Option<u16> {
    Some(match value {
        opcodes::BR => opcodes::BR_S,
        opcodes::BRFALSE => opcodes::BRFALSE_S,
        opcodes::BRTRUE => opcodes::BRTRUE_S,
        opcodes::BEQ => opcodes::BEQ_S,
        opcodes::BGE => opcodes::BGE_S,
        opcodes::BGT => opcodes::BGT_S,
        opcodes::BLE => opcodes::BLE_S,
        opcodes::BLT => opcodes::BLT_S,
        opcodes::BNE_UN => opcodes::BNE_UN_S,
        opcodes::BGE_UN => opcodes::BGE_UN_S,
        opcodes::BGT_UN => opcodes::BGT_UN_S,
        opcodes::BLE_UN => opcodes::BLE_UN_S,
        opcodes::BLT_UN => opcodes::BLT_UN_S,
        opcodes::LEAVE => opcodes::LEAVE_S,
        _ => return None,
    })
}

/// The long form of a short branch opcode.
fn long_branch(value: u16) -> Option<u16> {
    Some(match value {
        opcodes::BR_S => opcodes::BR,
        opcodes::BRFALSE_S => opcodes::BRFALSE,
        opcodes::BRTRUE_S => opcodes::BRTRUE,
        opcodes::BEQ_S => opcodes::BEQ,
        opcodes::BGE_S => opcodes::BGE,
        opcodes::BGT_S => opcodes::BGT,
        opcodes::BLE_S => opcodes::BLE,
        opcodes::BLT_S => opcodes::BLT,
        opcodes::BNE_UN_S => opcodes::BNE_UN,
        opcodes::BGE_UN_S => opcodes::BGE_UN,
        opcodes::BGT_UN_S => opcodes::BGT_UN,
        opcodes::BLE_UN_S => opcodes::BLE_UN,
        opcodes::BLT_UN_S => opcodes::BLT_UN,
        opcodes::LEAVE_S => opcodes::LEAVE,
        _ => return None,
    })
}
