//! Owned metadata documents - buffer plus borrowed view in one value.
//!
//! [`crate::metadata::reader::CilMetadata`] borrows from the caller's
//! bytes, which is the right shape for embedding into a PE reader. For
//! standalone use (tools, tests, fuzzers) this module bundles a backing
//! [`crate::file::Buffer`] together with the metadata view borrowed from
//! it, so a single value can be loaded from a file or a vector and moved
//! around freely.

use std::path::Path;

use ouroboros::self_referencing;

use crate::{file::Buffer, metadata::reader::CilMetadata, Result};

#[self_referencing]
/// A metadata root loaded from an owned buffer.
///
/// # Examples
///
/// ```rust,no_run
/// use dotmeta::metadata::document::MetadataDocument;
///
/// let document = MetadataDocument::from_file("extracted.cormeta".as_ref())?;
/// let metadata = document.metadata();
/// println!("version {}", metadata.root().version);
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub struct MetadataDocument {
    /// The backing bytes (heap memory or a file mapping).
    buffer: Buffer,
    /// The parsed view borrowing from the buffer.
    #[borrows(buffer)]
    #[covariant]
    metadata: CilMetadata<'this>,
}

impl MetadataDocument {
    /// Loads a metadata root from a file (memory-mapped).
    ///
    /// # Errors
    /// Propagates I/O failures and every structural parse error of
    /// [`CilMetadata::from`].
    pub fn from_file(path: &Path) -> Result<MetadataDocument> {
        Self::load(Buffer::from_file(path)?)
    }

    /// Loads a metadata root from an owned byte vector.
    ///
    /// # Errors
    /// Propagates every structural parse error of [`CilMetadata::from`].
    pub fn from_vec(data: Vec<u8>) -> Result<MetadataDocument> {
        Self::load(Buffer::from_vec(data)?)
    }

    fn load(buffer: Buffer) -> Result<MetadataDocument> {
        MetadataDocumentTryBuilder {
            buffer,
            metadata_builder: |buffer: &Buffer| CilMetadata::from(buffer.data()),
        }
        .try_build()
    }

    /// The parsed metadata view.
    #[must_use]
    pub fn metadata(&self) -> &CilMetadata<'_> {
        self.borrow_metadata()
    }
}
