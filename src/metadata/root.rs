//! Metadata root header and stream directory (II.24.2.1).
//!
//! The root is the entry point of the `.cormeta` byte range: the `BSJB`
//! signature, a version string and the directory of named streams. It is
//! the first thing parsed, and the only place where a failure aborts the
//! whole load - everything else addresses its bytes through this
//! directory.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The magic value opening physical metadata ('BSJB').
pub const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// The parsed metadata root: signature, version string and the stream
/// directory.
///
/// # Examples
///
/// ```rust
/// use dotmeta::metadata::root::Root;
///
/// let root = Root::read(&[
///     0x42, 0x53, 0x4A, 0x42, // BSJB
///     0x01, 0x00, 0x01, 0x00, // v1.1
///     0x00, 0x00, 0x00, 0x00, // reserved
///     0x04, 0x00, 0x00, 0x00, // version string length
///     b'v', b'4', 0x00, 0x00, // "v4"
///     0x00, 0x00,             // flags
///     0x01, 0x00,             // one stream
///     0x20, 0x00, 0x00, 0x00, // offset
///     0x04, 0x00, 0x00, 0x00, // size
///     0x23, 0x7E, 0x00, 0x00, // "#~"
/// ])?;
/// assert_eq!(root.version, "v4");
/// assert_eq!(root.stream_headers.len(), 1);
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// Major version of the metadata format
    pub major_version: u16,
    /// Minor version of the metadata format
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// Number of bytes allocated to hold the version string
    pub length: u32,
    /// The version string, e.g. "v4.0.30319"
    pub version: String,
    /// Reserved flags, always 0
    pub flags: u16,
    /// Number of streams
    pub stream_number: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parses a metadata root from the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the signature is wrong, the version string
    /// length is inconsistent, or the stream directory is truncated.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != METADATA_SIGNATURE {
            return Err(malformed_error!(
                "Invalid metadata signature - {:#010x}",
                signature
            ));
        }

        let length = read_le::<u32>(&data[12..])?;
        // The version string field is documented as at most 255 bytes;
        // clamp harder to defend offset arithmetic below
        if length > 0x1000 {
            return Err(malformed_error!("Version string length - {}", length));
        }

        let version_end = 16_usize + length as usize;
        if data.len() < version_end + 4 {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version = match version_bytes.iter().position(|byte| *byte == 0) {
            Some(terminator) => String::from_utf8_lossy(&version_bytes[..terminator]).into_owned(),
            None => String::from_utf8_lossy(version_bytes).into_owned(),
        };

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_number = read_le_at::<u16>(data, &mut offset)?;

        let mut stream_headers = Vec::with_capacity(stream_number as usize);
        for _ in 0..stream_number {
            if offset >= data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[offset..])?;
            offset += header.byte_size();
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            length,
            version,
            flags,
            stream_number,
            stream_headers,
        })
    }

    /// The directory entry with the given stream name, if present.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crafted_root() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&METADATA_SIGNATURE.to_le_bytes());
        data.extend_from_slice(&1_u16.to_le_bytes()); // major
        data.extend_from_slice(&1_u16.to_le_bytes()); // minor
        data.extend_from_slice(&0_u32.to_le_bytes()); // reserved
        data.extend_from_slice(&12_u32.to_le_bytes()); // version length
        data.extend_from_slice(b"v4.0.30319\0\0");
        data.extend_from_slice(&0_u16.to_le_bytes()); // flags
        data.extend_from_slice(&2_u16.to_le_bytes()); // streams
        // #~
        data.extend_from_slice(&0x6C_u32.to_le_bytes());
        data.extend_from_slice(&0x100_u32.to_le_bytes());
        data.extend_from_slice(b"#~\0\0");
        // #Strings
        data.extend_from_slice(&0x16C_u32.to_le_bytes());
        data.extend_from_slice(&0x40_u32.to_le_bytes());
        data.extend_from_slice(b"#Strings\0\0\0\0");
        data
    }

    #[test]
    fn crafted() {
        let data = crafted_root();
        let root = Root::read(&data).unwrap();

        assert_eq!(root.signature, METADATA_SIGNATURE);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.minor_version, 1);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_number, 2);
        assert_eq!(root.stream_headers.len(), 2);

        let tables = root.stream("#~").unwrap();
        assert_eq!(tables.offset, 0x6C);
        assert_eq!(tables.size, 0x100);

        let strings = root.stream("#Strings").unwrap();
        assert_eq!(strings.offset, 0x16C);
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn bad_signature() {
        let mut data = crafted_root();
        data[0] = 0x43;
        assert!(Root::read(&data).is_err());
    }

    #[test]
    fn truncated_directory() {
        let mut data = crafted_root();
        data.truncate(data.len() - 8);
        assert!(Root::read(&data).is_err());
    }
}
