//! Raw metadata tables with typed cell access.
//!
//! An [`MDTable`] wraps the byte range of one table together with the
//! frozen per-file layout. Rows are never materialized eagerly: `row` and
//! `cell` seek directly using the offsets resolved by
//! [`crate::metadata::tables::TableInfo`], and both the sequential and the
//! rayon-parallel iterator parse rows on demand.

use rayon::iter::{plumbing, IndexedParallelIterator, ParallelIterator};

use crate::{
    metadata::{
        tables::{schema::MAX_COLUMNS, TableId, TableInfoRef},
        token::Token,
    },
    Error::OutOfBounds,
    Result,
};

/// One decoded table row: the rid, its token and the raw column values.
///
/// Column values are plain `u32`s regardless of their stored width; what
/// a value *means* (heap offset, rid, coded index) is described by the
/// table's layout. Out-of-range column access returns `None` rather than
/// panicking - this type is on the corrupt-file recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRow {
    /// The 1-based row id.
    pub rid: u32,
    /// The metadata token addressing this row.
    pub token: Token,
    values: [u32; MAX_COLUMNS],
    len: u8,
}

impl RawRow {
    /// The value of column `index`, or `None` past the column count.
    #[must_use]
    pub fn col(&self, index: usize) -> Option<u32> {
        if index < self.len as usize {
            Some(self.values[index])
        } else {
            None
        }
    }

    /// Number of columns in this row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`; every table of the schema has at least one column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The raw byte range of one metadata table plus its resolved layout.
///
/// # Examples
///
/// ```rust,ignore
/// let table = stream.table(TableId::TypeDef);
/// for row in table.iter() {
///     println!("TypeDef {}: flags {:#x}", row.rid, row.col(0).unwrap());
/// }
/// ```
pub struct MDTable<'a> {
    /// The table kind.
    id: TableId,
    /// Raw row bytes, exactly `row_count * row_size` long.
    data: &'a [u8],
    /// Total number of rows.
    row_count: u32,
    /// Bytes per row, frozen at load.
    row_size: u32,
    /// Shared sizing information.
    info: TableInfoRef,
}

impl<'a> MDTable<'a> {
    /// Wraps the raw bytes of a table.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than
    /// `row_count * row_size`.
    pub fn new(data: &'a [u8], id: TableId, row_count: u32, info: TableInfoRef) -> Result<Self> {
        let row_size = info.layout(id).row_size;
        if (u64::from(row_count) * u64::from(row_size)) > data.len() as u64 {
            return Err(OutOfBounds);
        }

        Ok(MDTable {
            id,
            data,
            row_count,
            row_size,
            info,
        })
    }

    /// An empty table of the given kind (used for absent tables, so every
    /// lookup path works uniformly).
    #[must_use]
    pub fn empty(id: TableId, info: TableInfoRef) -> Self {
        let row_size = info.layout(id).row_size;
        MDTable {
            id,
            data: &[],
            row_count: 0,
            row_size,
            info,
        }
    }

    /// The table kind.
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Total number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Bytes per row.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Total size of the table in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Reads one cell: the value of column `col` in row `rid`.
    ///
    /// Fails silently (`None`) for rid 0, an out-of-range rid or column -
    /// this accessor is used defensively during corrupt-file recovery.
    #[must_use]
    pub fn cell(&self, rid: u32, col: usize) -> Option<u32> {
        if rid == 0 || rid > self.row_count {
            return None;
        }

        let layout = self.info.layout(self.id);
        let column = layout.columns.get(col)?;
        let start = (rid as usize - 1) * self.row_size as usize + column.offset as usize;

        Some(match column.size {
            1 => u32::from(*self.data.get(start)?),
            2 => {
                let bytes = self.data.get(start..start + 2)?;
                u32::from(u16::from_le_bytes([bytes[0], bytes[1]]))
            }
            _ => {
                let bytes = self.data.get(start..start + 4)?;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
        })
    }

    /// Reads one full row, or `None` for rid 0 / out-of-range rids.
    #[must_use]
    pub fn row(&self, rid: u32) -> Option<RawRow> {
        if rid == 0 || rid > self.row_count {
            return None;
        }

        let layout = self.info.layout(self.id);
        let mut values = [0_u32; MAX_COLUMNS];
        for (index, _) in layout.columns.iter().enumerate() {
            values[index] = self.cell(rid, index)?;
        }

        #[allow(clippy::cast_possible_truncation)]
        let len = layout.columns.len() as u8;

        Some(RawRow {
            rid,
            token: self.id.token(rid),
            values,
            len,
        })
    }

    /// Sequential iterator over all rows.
    #[must_use]
    pub fn iter(&self) -> RowIterator<'_, 'a> {
        RowIterator {
            table: self,
            next_rid: 1,
        }
    }

    /// Rayon parallel iterator over all rows.
    #[must_use]
    pub fn par_iter(&self) -> RowParIterator<'_, 'a> {
        RowParIterator {
            table: self,
            range: 0..self.row_count,
        }
    }
}

impl<'t, 'a> IntoIterator for &'t MDTable<'a> {
    type Item = RawRow;
    type IntoIter = RowIterator<'t, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sequential iterator over the rows of an [`MDTable`].
pub struct RowIterator<'t, 'a> {
    table: &'t MDTable<'a>,
    next_rid: u32,
}

impl Iterator for RowIterator<'_, '_> {
    type Item = RawRow;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.table.row(self.next_rid)?;
        self.next_rid += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .table
            .row_count
            .saturating_sub(self.next_rid.saturating_sub(1)) as usize;
        (remaining, Some(remaining))
    }
}

/// Rayon parallel iterator over the rows of an [`MDTable`].
///
/// Rows are plain data ([`RawRow`]), so the work-splitting producer can
/// hand out disjoint rid ranges without synchronization.
pub struct RowParIterator<'t, 'a> {
    table: &'t MDTable<'a>,
    range: std::ops::Range<u32>,
}

impl ParallelIterator for RowParIterator<'_, '_> {
    type Item = RawRow;

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: plumbing::UnindexedConsumer<Self::Item>,
    {
        plumbing::bridge(self, consumer)
    }
}

impl IndexedParallelIterator for RowParIterator<'_, '_> {
    fn len(&self) -> usize {
        self.range.len()
    }

    fn drive<C>(self, consumer: C) -> C::Result
    where
        C: plumbing::Consumer<Self::Item>,
    {
        plumbing::bridge(self, consumer)
    }

    fn with_producer<CB>(self, callback: CB) -> CB::Output
    where
        CB: plumbing::ProducerCallback<Self::Item>,
    {
        callback.callback(RowProducer {
            table: self.table,
            range: self.range,
        })
    }
}

struct RowProducer<'t, 'a> {
    table: &'t MDTable<'a>,
    range: std::ops::Range<u32>,
}

impl<'t, 'a> plumbing::Producer for RowProducer<'t, 'a> {
    type Item = RawRow;
    type IntoIter = RowProducerIterator<'t, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        RowProducerIterator {
            table: self.table,
            range: self.range,
        }
    }

    fn split_at(self, index: usize) -> (Self, Self) {
        #[allow(clippy::cast_possible_truncation)]
        let mid = self.range.start + index as u32;
        (
            RowProducer {
                table: self.table,
                range: self.range.start..mid,
            },
            RowProducer {
                table: self.table,
                range: mid..self.range.end,
            },
        )
    }
}

struct RowProducerIterator<'t, 'a> {
    table: &'t MDTable<'a>,
    range: std::ops::Range<u32>,
}

impl Iterator for RowProducerIterator<'_, '_> {
    type Item = RawRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }

        let rid = self.range.start + 1;
        self.range.start += 1;
        self.table.row(rid)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.range.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for RowProducerIterator<'_, '_> {}

impl DoubleEndedIterator for RowProducerIterator<'_, '_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }

        self.range.end -= 1;
        self.table.row(self.range.end + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TableInfo;
    use std::sync::Arc;

    fn field_table(info: TableInfoRef, data: &[u8], rows: u32) -> MDTable<'_> {
        MDTable::new(data, TableId::Field, rows, info).unwrap()
    }

    #[test]
    fn crafted_short() {
        let data = vec![
            0x01, 0x01, // flags
            0x02, 0x02, // name
            0x03, 0x03, // signature
        ];
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, 1)], false, false, false));
        let table = field_table(info, &data, 1);

        let row = table.row(1).unwrap();
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0400_0001);
        assert_eq!(row.col(0), Some(0x0101));
        assert_eq!(row.col(1), Some(0x0202));
        assert_eq!(row.col(2), Some(0x0303));
        assert_eq!(row.col(3), None);
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x01, 0x01, // flags
            0x02, 0x02, 0x02, 0x02, // name
            0x03, 0x03, 0x03, 0x03, // signature
        ];
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, 1)], true, true, true));
        let table = field_table(info, &data, 1);

        let row = table.row(1).unwrap();
        assert_eq!(row.col(0), Some(0x0101));
        assert_eq!(row.col(1), Some(0x0202_0202));
        assert_eq!(row.col(2), Some(0x0303_0303));
    }

    #[test]
    fn rid_bounds() {
        let data = vec![0_u8; 6];
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, 1)], false, false, false));
        let table = field_table(info, &data, 1);

        assert!(table.row(0).is_none());
        assert!(table.row(2).is_none());
        assert!(table.cell(0, 0).is_none());
        assert!(table.cell(1, 9).is_none());
    }

    #[test]
    fn truncated_data_rejected() {
        let data = vec![0_u8; 5];
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, 1)], false, false, false));
        assert!(MDTable::new(&data, TableId::Field, 1, info).is_err());
    }

    #[test]
    fn iteration() {
        let data = vec![
            0x01, 0x00, 0x10, 0x00, 0x20, 0x00, // row 1
            0x02, 0x00, 0x11, 0x00, 0x21, 0x00, // row 2
            0x03, 0x00, 0x12, 0x00, 0x22, 0x00, // row 3
        ];
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, 3)], false, false, false));
        let table = field_table(info, &data, 3);

        let rows: Vec<RawRow> = table.iter().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].col(0), Some(1));
        assert_eq!(rows[2].col(2), Some(0x22));
    }

    #[test]
    fn parallel_iteration() {
        let rows = 64_u32;
        let mut data = Vec::new();
        for rid in 1..=rows {
            data.extend_from_slice(&(rid as u16).to_le_bytes());
            data.extend_from_slice(&[0, 0, 0, 0]);
        }
        let info = Arc::new(TableInfo::new_test(&[(TableId::Field, rows)], false, false, false));
        let table = field_table(info, &data, rows);

        let sum: u32 = table.par_iter().map(|row| row.col(0).unwrap()).sum();
        assert_eq!(sum, (1..=rows).sum::<u32>());
    }

    #[test]
    fn empty_table() {
        let info = Arc::new(TableInfo::new_test(&[], false, false, false));
        let table = MDTable::empty(TableId::Field, info);
        assert_eq!(table.row_count(), 0);
        assert!(table.row(1).is_none());
        assert_eq!(table.iter().count(), 0);
    }
}
