//! GUID heap (`#GUID`) - 1-based 16-byte entries (II.24.2.5).

use crate::{Error::OutOfBounds, Result};

/// The `#GUID` heap: a flat array of 16-byte GUIDs addressed by a 1-based
/// index. Index 0 means "no GUID" and is never a valid lookup here - the
/// caller decides what absence means.
///
/// # Examples
///
/// ```rust
/// use dotmeta::metadata::streams::Guid;
///
/// let data = [0xAA_u8; 16];
/// let heap = Guid::from(&data)?;
/// let mvid = heap.get(1)?;
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wraps a `#GUID` heap slice. An empty slice is allowed - some
    /// modules carry no GUIDs.
    ///
    /// # Errors
    /// Returns an error if the heap size is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// The GUID at 1-based `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for index 0 or past the heap.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index == 0 {
            return Err(OutOfBounds);
        }

        let offset = (index - 1) * 16;
        let Some(bytes) = self.data.get(offset..offset + 16) else {
            return Err(OutOfBounds);
        };

        let mut buffer = [0_u8; 16];
        buffer.copy_from_slice(bytes);
        Ok(uguid::Guid::from_bytes(buffer))
    }

    /// Number of GUIDs in the heap.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = [0_u8; 32];
        data[0..16].copy_from_slice(&[
            0x8E, 0x90, 0x37, 0xD4, 0xE6, 0x65, 0x7C, 0x48, 0x97, 0x35, 0x7B, 0xDF, 0xF6, 0x99,
            0xBE, 0xA5,
        ]);
        data[16..32].copy_from_slice(&[0xAA; 16]);

        let heap = Guid::from(&data).unwrap();
        assert_eq!(heap.count(), 2);
        assert_eq!(
            heap.get(1).unwrap(),
            uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5")
        );
        assert_eq!(
            heap.get(2).unwrap(),
            uguid::guid!("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA")
        );
        assert!(heap.get(0).is_err());
        assert!(heap.get(3).is_err());
    }

    #[test]
    fn invalid_size() {
        assert!(Guid::from(&[0_u8; 15]).is_err());
        assert!(Guid::from(&[]).is_ok());
    }
}
