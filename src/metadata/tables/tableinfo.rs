//! Per-file resolution of the variable-width table schema.
//!
//! The tables stream is self-describing: a handful of header bytes (three
//! heap-size flags) plus the row count of every present table determine
//! the byte width of every column in the file. [`TableInfo`] performs that
//! computation exactly once per loaded stream and is immutable afterwards;
//! every later row read seeks directly with the frozen offsets.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{
        schema::{self, ColumnType, SchemaVersion},
        CodedIndexKind, TableId,
    },
    Error::OutOfBounds,
    Result,
};

/// Row count and index width of one table.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table (0 when absent).
    pub rows: u32,
    /// If rows exceed `u16::MAX`, simple indexes into this table take
    /// 4 bytes instead of 2.
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates the row info for a table with `rows` rows.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        Self {
            rows,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// One column with its per-file placement: schema descriptor plus the
/// resolved byte offset and width inside a row.
#[derive(Debug, Clone, Copy)]
pub struct ColumnInfo {
    /// Column name (diagnostic only).
    pub name: &'static str,
    /// The column's logical size category.
    pub ty: ColumnType,
    /// Byte offset of the column within a row.
    pub offset: u32,
    /// Resolved byte width (1, 2 or 4).
    pub size: u8,
}

/// The resolved layout of one table: columns with offsets, and the row
/// byte size. Columns are laid out in declared order with no padding,
/// unlike in-memory structs.
#[derive(Debug, Clone)]
pub struct TableLayout {
    /// The table this layout belongs to.
    pub table: TableId,
    /// The resolved columns, offsets strictly increasing.
    pub columns: Vec<ColumnInfo>,
    /// Total bytes per row.
    pub row_size: u32,
}

/// Frozen sizing information for a whole tables stream: row counts, heap
/// index widths, coded index widths and the layout of every table.
///
/// Built once by [`TableInfo::new`] (or [`TableInfo::new_test`] in unit
/// tests) and shared behind a [`TableInfoRef`].
#[derive(Clone)]
pub struct TableInfo {
    version: SchemaVersion,
    rows: Vec<TableRowInfo>,
    layouts: Vec<TableLayout>,
    coded_bytes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Cheap-copy reference to a [`TableInfo`].
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Builds the sizing information from a tables-stream header.
    ///
    /// `data` is the full stream starting at the header; `valid_bitvec`
    /// is the header's table presence mask. The schema revision is taken
    /// from the header version bytes *before* any width is computed.
    ///
    /// # Errors
    /// Returns an error if the header is truncated or the presence mask
    /// names tables outside the revision's table set.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let version = SchemaVersion::from_stream_version(data[4], data[5]);
        let max_tables = version.table_count();
        if valid_bitvec >> max_tables != 0 {
            return Err(malformed_error!(
                "Presence mask {:#018x} names tables outside the {}-table set",
                valid_bitvec,
                max_tables
            ));
        }

        let mut rows = vec![TableRowInfo::default(); TableId::COUNT];
        let mut next_row_offset = 24;
        for table_id in TableId::iter() {
            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if row_count == 0 {
                // Present-but-empty tables do occur in hand-written files
                continue;
            }

            rows[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = data[6];
        Ok(Self::resolve(
            version,
            rows,
            heap_size_flags & 0x01 != 0,
            heap_size_flags & 0x02 != 0,
            heap_size_flags & 0x04 != 0,
        ))
    }

    /// Builds sizing information directly from row counts and heap flags,
    /// for unit tests that fabricate table bytes.
    #[cfg(test)]
    #[must_use]
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut rows = vec![TableRowInfo::default(); TableId::COUNT];
        for (table, count) in valid_tables {
            rows[*table as usize] = TableRowInfo::new(*count);
        }

        Self::resolve(SchemaVersion::V2, rows, large_str, large_guid, large_blob)
    }

    fn resolve(
        version: SchemaVersion,
        rows: Vec<TableRowInfo>,
        large_str: bool,
        large_guid: bool,
        large_blob: bool,
    ) -> Self {
        let mut info = TableInfo {
            version,
            rows,
            layouts: Vec::with_capacity(TableId::COUNT),
            coded_bytes: vec![0; CodedIndexKind::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for kind in CodedIndexKind::iter() {
            let max_rows = kind
                .tables()
                .iter()
                .flatten()
                .map(|table| info.rows[*table as usize].rows)
                .max()
                .unwrap_or(0);

            info.coded_bytes[kind as usize] =
                if u64::from(max_rows) << kind.tag_bits() > 0xFFFF {
                    4
                } else {
                    2
                };
        }

        let mut layouts = Vec::with_capacity(TableId::COUNT);
        for table in TableId::iter() {
            layouts.push(info.layout_table(table));
        }
        info.layouts = layouts;

        info
    }

    fn layout_table(&self, table: TableId) -> TableLayout {
        let defs = schema::columns(table, self.version);
        let mut columns = Vec::with_capacity(defs.len());
        let mut offset = 0_u32;

        for def in defs {
            let size = match def.ty {
                ColumnType::UInt8 => 1,
                ColumnType::UInt16 => 2,
                ColumnType::UInt32 => 4,
                ColumnType::Strings => self.str_bytes(),
                ColumnType::Guid => self.guid_bytes(),
                ColumnType::Blob => self.blob_bytes(),
                ColumnType::Table(target) => self.table_index_bytes(target),
                ColumnType::Coded(kind) => self.coded_index_bytes(kind),
            };

            columns.push(ColumnInfo {
                name: def.name,
                ty: def.ty,
                offset,
                size,
            });
            offset += u32::from(size);
        }

        TableLayout {
            table,
            columns,
            row_size: offset,
        }
    }

    /// The schema revision this stream follows.
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// The resolved layout of a table.
    #[must_use]
    pub fn layout(&self, table: TableId) -> &TableLayout {
        &self.layouts[table as usize]
    }

    /// Row count and index width of a table.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Row count of a table (0 when absent).
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Returns `true` if simple indexes into `table` take 4 bytes.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Byte width of simple indexes into `table` (2 or 4).
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> u8 {
        if self.rows[table as usize].is_large {
            4
        } else {
            2
        }
    }

    /// Byte width of stored `kind` coded indexes (2 or 4).
    #[must_use]
    pub fn coded_index_bytes(&self, kind: CodedIndexKind) -> u8 {
        self.coded_bytes[kind as usize]
    }

    /// Returns `true` if `#Strings` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Returns `true` if `#GUID` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Returns `true` if `#Blob` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Byte width of `#Strings` heap indexes.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Byte width of `#GUID` heap indexes.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Byte width of `#Blob` heap indexes.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }
}
