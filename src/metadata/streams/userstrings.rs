//! User string heap (`#US`) - UTF-16 string literals (II.24.2.4).

use widestring::U16String;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#US` heap: length-prefixed UTF-16 string literals referenced by
/// the `ldstr` instruction's token.
///
/// Each entry starts with an ECMA-335 compressed length counting the
/// payload bytes; the payload is UTF-16LE code units followed by one
/// terminal flag byte (odd total length). Entries are decoded to owned
/// [`U16String`]s because heap offsets carry no alignment guarantee.
///
/// # Examples
///
/// ```rust
/// use dotmeta::metadata::streams::UserStrings;
///
/// let data = [0x00, 0x03, 0x41, 0x00, 0x00];
/// let us = UserStrings::from(&data)?;
/// assert_eq!(us.get(1)?.to_string_lossy(), "A");
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wraps a `#US` heap slice.
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not begin with the
    /// mandated leading null byte.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(OutOfBounds);
        }

        Ok(UserStrings { data })
    }

    /// The string whose entry starts at byte offset `index`.
    ///
    /// Offset 0 yields the empty string (the reserved leading entry).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] past the heap or
    /// [`crate::Error::Malformed`] for a corrupt length prefix.
    pub fn get(&self, index: usize) -> Result<U16String> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        if index == 0 {
            return Ok(U16String::new());
        }

        let mut parser = Parser::new(&self.data[index..]);
        let byte_len = parser.read_compressed_uint()? as usize;
        let payload_start = index + parser.pos();

        let Some(payload) = self.data.get(payload_start..payload_start + byte_len) else {
            return Err(OutOfBounds);
        };

        // Odd lengths carry a trailing flag byte, not character data
        let char_bytes = payload.len() & !1;
        let units: Vec<u16> = payload[..char_bytes]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(U16String::from_vec(units))
    }

    /// Iterator over all entries as `(offset, string)` pairs.
    pub fn iter(&self) -> UserStringIterator<'_, 'a> {
        UserStringIterator {
            heap: self,
            position: 1,
        }
    }
}

/// Iterator over the entries of a [`UserStrings`] heap.
pub struct UserStringIterator<'h, 'a> {
    heap: &'h UserStrings<'a>,
    position: usize,
}

impl Iterator for UserStringIterator<'_, '_> {
    type Item = Result<(usize, U16String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.heap.data.len() {
            return None;
        }

        let start = self.position;
        let mut parser = Parser::new(&self.heap.data[start..]);
        let byte_len = match parser.read_compressed_uint() {
            Ok(len) => len as usize,
            Err(e) => {
                self.position = self.heap.data.len();
                return Some(Err(e));
            }
        };

        match self.heap.get(start) {
            Ok(value) => {
                self.position = start + parser.pos() + byte_len;
                Some(Ok((start, value)))
            }
            Err(e) => {
                self.position = self.heap.data.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use widestring::u16str;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 29] = [
            0x00,
            0x1B, // 27 bytes: 13 UTF-16 units + flag byte
            0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F, 0x00, 0x2C, 0x00, 0x20, 0x00,
            0x57, 0x00, 0x6F, 0x00, 0x72, 0x00, 0x6C, 0x00, 0x64, 0x00, 0x21, 0x00,
            0x00, // flag byte
        ];

        let us = UserStrings::from(&data).unwrap();
        assert_eq!(us.get(1).unwrap(), u16str!("Hello, World!"));
        assert_eq!(us.get(0).unwrap(), u16str!(""));
    }

    #[test]
    fn iterate_entries() {
        // "A" (3 bytes) followed by "BC" (5 bytes)
        let data = [
            0x00, 0x03, 0x41, 0x00, 0x00, 0x05, 0x42, 0x00, 0x43, 0x00, 0x00,
        ];
        let us = UserStrings::from(&data).unwrap();

        let entries: Vec<_> = us.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 1);
        assert_eq!(entries[0].1, u16str!("A"));
        assert_eq!(entries[1].0, 5);
        assert_eq!(entries[1].1, u16str!("BC"));
    }

    #[test]
    fn invalid() {
        assert!(UserStrings::from(&[]).is_err());
        assert!(UserStrings::from(&[0x22, 0x00]).is_err());

        // Length prefix claims more bytes than the heap holds
        let truncated = [0x00, 0x0A, 0x41, 0x00];
        let us = UserStrings::from(&truncated).unwrap();
        assert!(us.get(1).is_err());
    }
}
