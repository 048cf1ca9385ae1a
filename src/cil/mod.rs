//! The CIL instruction codec: opcode tables, method body decode/encode
//! and macro normalization.
//!
//! # Key Types
//! - [`MethodBody`] - header fields, instruction arena, exception handlers
//! - [`BodyReader`] / [`BodyWriter`] - the two directions of the codec
//! - [`Instruction`] / [`Operand`] / [`Target`] - the arena contents
//! - [`opcodes`] - the fixed one-byte and `0xFE`-prefixed tables
//!
//! # Example
//!
//! ```rust
//! use dotmeta::cil::{BodyReader, NoLocals};
//!
//! // Tiny method: 0x0A header (2 code bytes), nop, ret
//! let body = BodyReader::new().read(&[0x0A, 0x00, 0x2A], None, &NoLocals)?;
//! assert_eq!(body.instructions.len(), 2);
//! assert_eq!(body.instructions[1].opcode.mnemonic, "ret");
//! # Ok::<(), dotmeta::Error>(())
//! ```

mod body;
mod exceptions;
mod instruction;
mod normalize;
pub mod opcodes;
mod writer;

pub use body::{
    BodyReader, LocalVar, LocalsResolver, MethodBody, MethodBodyFlags, NoLocals, SectionFlags,
    TINY_MAX_STACK,
};
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use instruction::{Instruction, Operand, Target};
pub use opcodes::{FlowControl, OpCode, OpcodeSet, OperandType};
pub use writer::{BodyWriter, EncodedMethod};
