use thiserror::Error;

use crate::metadata::tables::{CodedIndexKind, TableId};

/// The generic Error type, covering every failure this library can return.
///
/// The taxonomy follows the on-disk format: *structural* problems (a bad
/// metadata signature, a truncated tables header, a method header that is
/// neither tiny nor fat) abort the surrounding decode with one of these
/// variants, while *local* corruption (a single bad row reference, an
/// unknown opcode byte, a rejected exception clause) is absorbed by the
/// decoders and surfaces as a sentinel value instead — see the module
/// documentation of [`crate::cil`] for details.
///
/// # Examples
///
/// ```rust
/// use dotmeta::{Error, metadata::reader::CilMetadata};
///
/// match CilMetadata::from(&[0u8; 4]) {
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("bad metadata: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => unreachable!("four zero bytes are not a metadata root"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be parsed.
    ///
    /// Carries the source location where the malformation was detected,
    /// which is the only practical way to debug hand-crafted or
    /// obfuscated inputs.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This input is not supported (e.g. an unknown tables-stream version).
    #[error("This input is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error while mapping or reading a backing buffer.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A table was passed to a coded-index encode that is not a member of
    /// the target category.
    #[error("Table {table:?} is not encodable under the {kind:?} coded index")]
    CodedIndexTable {
        /// The coded index category that was being encoded
        kind: CodedIndexKind,
        /// The table that is not part of the category
        table: TableId,
    },

    /// A coded-index tag selected a slot that names no table of the
    /// category (a reserved slot, or past the end of the candidate set).
    #[error("Tag {tag} is not a valid {kind:?} table selector")]
    CodedIndexTag {
        /// The coded index category that was being decoded
        kind: CodedIndexKind,
        /// The offending tag value
        tag: u32,
    },

    /// A row id does not fit the 24-bit rid range (`0x00FF_FFFF`).
    #[error("Row id {0} exceeds the 24-bit rid range")]
    RidOutOfRange(u32),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
