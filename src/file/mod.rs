//! Backing storage and byte-level access for metadata blobs.
//!
//! The crate never performs I/O mid-decode: every decoder runs over a byte
//! slice supplied by the caller (typically the `.cormeta` range located by
//! a PE reader). This module provides the two pieces around that contract:
//!
//! - [`Buffer`] - an owned backing store, either heap memory or a
//!   `memmap2` file mapping, for callers that want this crate to hold the
//!   bytes (see [`crate::metadata::document::MetadataDocument`]).
//! - [`io`] and [`parser`] - the bounds-checked reading/writing primitives
//!   every decoder is built on.

pub mod io;
pub mod parser;

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{Error::Empty, Result};

/// An owned, immutable byte buffer backing a loaded metadata blob.
///
/// Two backings exist: an in-memory vector (bytes the caller already had)
/// and a read-only file mapping (large images that should not be copied).
/// Both expose the same slice-based access; after construction the bytes
/// never change.
///
/// # Examples
///
/// ```rust
/// use dotmeta::file::Buffer;
///
/// let buffer = Buffer::from_vec(vec![0x42, 0x53, 0x4A, 0x42])?;
/// assert_eq!(buffer.len(), 4);
/// assert_eq!(buffer.data_slice(0, 2)?, &[0x42, 0x53]);
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub enum Buffer {
    /// Bytes owned on the heap.
    Memory(Vec<u8>),
    /// A read-only memory mapping of a file.
    Mapped(Mmap),
}

impl Buffer {
    /// Wraps an in-memory byte vector.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty vector.
    pub fn from_vec(data: Vec<u8>) -> Result<Buffer> {
        if data.is_empty() {
            return Err(Empty);
        }

        Ok(Buffer::Memory(data))
    }

    /// Memory-maps a file read-only.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// mapped, or [`crate::Error::Empty`] for an empty file.
    pub fn from_file(path: &Path) -> Result<Buffer> {
        let file = fs::File::open(path)?;

        // Mapping a zero-length file fails on some platforms; reject early.
        if file.metadata()?.len() == 0 {
            return Err(Empty);
        }

        let mapping = unsafe { Mmap::map(&file)? };
        Ok(Buffer::Mapped(mapping))
    }

    /// The full contents of the buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Buffer::Memory(vec) => vec,
            Buffer::Mapped(map) => map,
        }
    }

    /// Total length of the buffer in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// A bounds-checked sub-slice of the buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + len` passes the
    /// end of the buffer.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data();
        match offset.checked_add(len) {
            Some(end) if end <= data.len() => Ok(&data[offset..end]),
            _ => Err(out_of_bounds_error!()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_buffer() {
        let buffer = Buffer::from_vec(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.len(), 4);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.data_slice(1, 2).unwrap(), &[2, 3]);
        assert!(buffer.data_slice(3, 2).is_err());
        assert!(buffer.data_slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn empty_rejected() {
        assert!(Buffer::from_vec(Vec::new()).is_err());
    }
}
