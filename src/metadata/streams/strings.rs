//! String heap (`#Strings`) - null-terminated UTF-8 names (II.24.2.3).

use crate::{Error::OutOfBounds, Result};

/// The `#Strings` heap: a byte blob of null-terminated UTF-8 strings,
/// addressed by byte offset. Index 0 is reserved for the empty string by
/// convention - it is a valid lookup, not an error.
///
/// # Examples
///
/// ```rust
/// use dotmeta::metadata::streams::Strings;
///
/// let data = [0x00, b'N', b'a', b'm', b'e', 0x00];
/// let strings = Strings::from(&data)?;
/// assert_eq!(strings.get(1)?, "Name");
/// assert_eq!(strings.get(0)?, "");
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wraps a `#Strings` heap slice.
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not begin with the
    /// mandated leading null byte.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Strings heap"));
        }

        Ok(Strings { data })
    }

    /// The string starting at byte offset `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] past the heap, or
    /// [`crate::Error::Malformed`] for invalid UTF-8 or a missing
    /// terminator.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let Some(terminator) = self.data[index..].iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!(
                "Unterminated string at heap offset {}",
                index
            ));
        };

        match std::str::from_utf8(&self.data[index..index + terminator]) {
            Ok(value) => Ok(value),
            Err(_) => Err(malformed_error!(
                "Invalid UTF-8 string at heap offset {}",
                index
            )),
        }
    }

    /// Total heap size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; construction rejects empty heaps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
