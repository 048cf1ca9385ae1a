//! Stream headers - the name/offset/size directory entries of the
//! metadata root (II.24.2.2).

use crate::{file::io::read_le, Error::OutOfBounds, Result};

/// The stream names a conforming metadata root can carry.
const KNOWN_STREAMS: &[&str] = &["#~", "#-", "#Strings", "#US", "#Blob", "#GUID", "#Pdb"];

/// One entry of the stream directory: a name plus the byte range of the
/// stream, relative to the metadata root.
///
/// The on-disk size of a header is not fixed - the name is a
/// null-terminated string padded to a 4-byte boundary.
pub struct StreamHeader {
    /// Offset of the stream, relative to the start of the metadata root.
    pub offset: u32,
    /// Size of the stream in bytes.
    pub size: u32,
    /// Stream name, at most 32 characters.
    pub name: String,
}

impl StreamHeader {
    /// Parses one stream header from the front of `data`.
    ///
    /// # Errors
    /// Returns an error if the data is too short or the name is not one of
    /// the stream names the format defines.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let mut name = String::with_capacity(32);
        for counter in 0..std::cmp::min(32, data.len() - 8) {
            let name_char = read_le::<u8>(&data[8 + counter..])?;
            if name_char == 0 {
                break;
            }

            name.push(char::from(name_char));
        }

        if !KNOWN_STREAMS.contains(&name.as_str()) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Bytes this header occupies on disk: 8 fixed bytes plus the
    /// null-terminated name padded to a 4-byte boundary.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x7E, 0x00,
        ];

        let parsed_header = StreamHeader::from(&header_bytes).unwrap();

        assert_eq!(parsed_header.offset, 0x6C);
        assert_eq!(parsed_header.size, 0x45A4);
        assert_eq!(parsed_header.name, "#~");
        assert_eq!(parsed_header.byte_size(), 12);
    }

    #[test]
    fn enc_stream_name() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x2D, 0x00,
        ];

        let parsed_header = StreamHeader::from(&header_bytes).unwrap();
        assert_eq!(parsed_header.name, "#-");
    }

    #[test]
    fn crafted_invalid() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x24, 0x7E, 0x00,
        ];

        if StreamHeader::from(&header_bytes).is_ok() {
            panic!("This should not be valid!")
        }
    }
}
