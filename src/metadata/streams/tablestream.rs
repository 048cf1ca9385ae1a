//! The metadata tables stream (`#~` / `#-`) - header and table slicing
//! (II.24.2.6).
//!
//! The stream starts with a 24-byte header (version, heap-size flags,
//! presence and sorted bitvecs) followed by one `u32` row count per
//! present table and then the packed table rows themselves. Everything
//! about row addressing is derived here exactly once - see
//! [`crate::metadata::tables::TableInfo`] - and frozen for the lifetime
//! of the stream.
//!
//! Two incompatible layouts share this header: the optimized `#~` stream
//! and the edit-and-continue `#-` stream with its pointer-table
//! indirection. Which one is in effect is decided by the stream *name*
//! at load time and recorded as an immutable [`StreamVariant`]; the
//! range-computation differences live in [`crate::metadata::reader`].

use std::sync::Arc;

use bitflags::bitflags;
use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{MDTable, RawRow, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

bitflags! {
    /// Header flags of the tables stream (the `HeapSizes` byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TablesStreamFlags: u8 {
        /// `#Strings` indexes are 4 bytes wide.
        const BIG_STRINGS = 0x01;
        /// `#GUID` indexes are 4 bytes wide.
        const BIG_GUID = 0x02;
        /// `#Blob` indexes are 4 bytes wide.
        const BIG_BLOB = 0x04;
        /// Reserved padding bit.
        const PADDING = 0x08;
        /// The stream only holds changes relative to a base image.
        const DELTA_ONLY = 0x20;
        /// An extra 4-byte value follows the row counts.
        const EXTRA_DATA = 0x40;
        /// Rows may be logically deleted (edit-and-continue streams).
        const HAS_DELETE = 0x80;
    }
}

/// Which of the two mutually exclusive stream layouts is present,
/// selected by the stream name and held immutably for the file's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamVariant {
    /// The common, optimized `#~` layout: direct parent→child ranges, no
    /// indirection tables, no row deletion.
    Compressed,
    /// The `#-` layout: optional `*Ptr` indirection tables and logically
    /// deleted rows.
    EditAndContinue,
}

/// The decoded tables stream: header fields plus one [`MDTable`] per
/// table kind (empty for absent tables).
///
/// # Examples
///
/// ```rust,ignore
/// let stream = TablesStream::from(data, StreamVariant::Compressed)?;
/// let typedefs = stream.table(TableId::TypeDef);
/// println!("{} types", typedefs.row_count());
/// ```
pub struct TablesStream<'a> {
    /// Major version of the table schema.
    pub major_version: u8,
    /// Minor version of the table schema.
    pub minor_version: u8,
    /// The `HeapSizes` flag byte.
    pub flags: TablesStreamFlags,
    /// Bit vector of present tables.
    pub valid: u64,
    /// Bit vector of nominally sorted tables. Unreliable for at least
    /// `GenericParam` under `#-`; never trust it without a fallback.
    pub sorted: u64,
    variant: StreamVariant,
    info: TableInfoRef,
    tables: Vec<MDTable<'a>>,
}

impl<'a> TablesStream<'a> {
    /// Parses a tables stream.
    ///
    /// `variant` comes from the stream name in the metadata root
    /// directory (`#~` or `#-`).
    ///
    /// # Errors
    /// A corrupt header is fatal - every other structure's addressing
    /// depends on it. Truncated data, an empty presence mask or row
    /// ranges past the end of the stream all fail here.
    pub fn from(data: &'a [u8], variant: StreamVariant) -> Result<TablesStream<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let flags = TablesStreamFlags::from_bits_truncate(data[6]);
        let info: TableInfoRef = Arc::new(TableInfo::new(data, valid)?);

        let mut offset = 24 + valid.count_ones() as usize * 4;
        if flags.contains(TablesStreamFlags::EXTRA_DATA) {
            offset += 4;
        }

        let mut tables = Vec::with_capacity(TableId::iter().count());
        for table_id in TableId::iter() {
            let rows = info.rows(table_id);
            if rows == 0 {
                tables.push(MDTable::empty(table_id, info.clone()));
                continue;
            }

            if offset > data.len() {
                return Err(OutOfBounds);
            }

            let table = MDTable::new(&data[offset..], table_id, rows, info.clone())?;
            offset += table.size() as usize;
            tables.push(table);
        }

        Ok(TablesStream {
            major_version: data[4],
            minor_version: data[5],
            flags,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            variant,
            info,
            tables,
        })
    }

    /// The stream layout in effect.
    #[must_use]
    pub fn variant(&self) -> StreamVariant {
        self.variant
    }

    /// The frozen sizing information of this stream.
    #[must_use]
    pub fn info(&self) -> &TableInfoRef {
        &self.info
    }

    /// The table of the given kind; absent tables come back empty.
    #[must_use]
    pub fn table(&self, table_id: TableId) -> &MDTable<'a> {
        &self.tables[table_id as usize]
    }

    /// Returns `true` if the presence mask names this table.
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        (self.valid & (1_u64 << (table_id as u8))) != 0
    }

    /// Returns `true` if the header claims this table is sorted.
    ///
    /// The claim is unreliable on some real-world files; use the
    /// reader's keyed lookups instead of trusting it directly.
    #[must_use]
    pub fn is_sorted(&self, table_id: TableId) -> bool {
        (self.sorted & (1_u64 << (table_id as u8))) != 0
    }

    /// Number of present tables.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Row count of a table (0 when absent).
    #[must_use]
    pub fn row_count(&self, table_id: TableId) -> u32 {
        self.info.rows(table_id)
    }

    /// Iterator over the table kinds present in this stream.
    pub fn present_tables(&self) -> impl Iterator<Item = TableId> + '_ {
        TableId::iter().filter(|table_id| self.has_table(*table_id))
    }

    /// Reads one cell; `None` for absent tables, rid 0 or out-of-range
    /// rids/columns.
    #[must_use]
    pub fn cell(&self, table_id: TableId, rid: u32, col: usize) -> Option<u32> {
        self.table(table_id).cell(rid, col)
    }

    /// Reads one full row; `None` for absent tables, rid 0 or
    /// out-of-range rids.
    #[must_use]
    pub fn row(&self, table_id: TableId, rid: u32) -> Option<RawRow> {
        self.table(table_id).row(rid)
    }
}
