//! The metadata tables: identifiers, schema, sizing and raw row access.
//!
//! The tables stream stores a relational schema whose column widths are
//! not fixed by the format but derived, per file, from three heap-size
//! flags and the row count of every table. This module contains the
//! pieces that reconstruct and serve that schema:
//!
//! - [`TableId`] - the fixed set of 45 table kinds
//! - [`schema`] - the constant column descriptors and the version fork
//! - [`TableInfo`] / [`TableLayout`] - per-file width and offset resolution
//! - [`MDTable`] / [`RawRow`] - raw row and cell reads over table bytes
//! - [`CodedIndexKind`] / [`CodedIndex`] - the packed cross-table references
//! - [`RidList`] - parent→child rid ranges, contiguous or explicit
//!
//! The stream header parsing that produces these lives in
//! [`crate::metadata::streams::TablesStream`]; the owner-range queries and
//! variant strategies on top live in [`crate::metadata::reader`].

mod codedindex;
mod ridlist;
pub mod schema;
mod table;
mod tableid;
mod tableinfo;

pub use codedindex::{decode_coded_index, encode_coded_index, CodedIndex, CodedIndexKind};
pub use ridlist::{RidIterator, RidList};
pub use table::{MDTable, RawRow, RowIterator, RowParIterator};
pub use tableid::TableId;
pub use tableinfo::{ColumnInfo, TableInfo, TableInfoRef, TableLayout, TableRowInfo};
