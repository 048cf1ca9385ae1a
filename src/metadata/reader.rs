//! The metadata reader: streams wired together, variant strategies and
//! derived queries.
//!
//! [`CilMetadata`] parses a full metadata root byte range (as carved out
//! of a PE image by the container collaborator), wires up the heaps and
//! the tables stream, and implements the queries that need more than one
//! stream:
//!
//! - parent→child rid lists with the "until the next row's pointer" rule
//! - the edit-and-continue differences: `*Ptr` indirection and logically
//!   deleted rows, each applied only when actually present
//! - lazily built child→owner reverse maps (compute once, publish once)
//! - keyed lookups over nominally sorted tables with a linear fallback,
//!   because the header's sorted bit lies on some real-world files
//!
//! Which rule set applies is fixed at load time from the stream name
//! (`#~` vs `#-`) and never consulted per call after that.

use std::sync::OnceLock;

use crate::{
    metadata::{
        root::Root,
        streams::{
            Blob, Guid, StreamVariant, Strings, TablesStream, TablesStreamFlags, UserStrings,
        },
        tables::{schema::column, RidList, TableId},
    },
    Result,
};

/// Name prefix marking a logically deleted row in edit-and-continue
/// metadata.
const DELETED_NAME_PREFIX: &str = "_Deleted";

#[derive(Default)]
struct OwnerMaps {
    field: OnceLock<Box<[u32]>>,
    method: OnceLock<Box<[u32]>>,
    param: OnceLock<Box<[u32]>>,
    event: OnceLock<Box<[u32]>>,
    property: OnceLock<Box<[u32]>>,
}

/// A fully wired metadata view over one root byte range.
///
/// All streams borrow from the input slice; the only mutable state are
/// the publish-once reverse-map caches, which makes a loaded value safe
/// to share across threads.
///
/// # Examples
///
/// ```rust,ignore
/// let metadata = CilMetadata::from(cormeta_bytes)?;
/// let fields = metadata.field_list(1); // fields of the first TypeDef
/// for rid in &fields {
///     let name_offset = metadata.tables().cell(TableId::Field, rid, 1).unwrap();
///     println!("{}", metadata.strings().unwrap().get(name_offset as usize)?);
/// }
/// ```
pub struct CilMetadata<'a> {
    root: Root,
    strings: Option<Strings<'a>>,
    user_strings: Option<UserStrings<'a>>,
    guids: Option<Guid<'a>>,
    blobs: Option<Blob<'a>>,
    tables: TablesStream<'a>,
    owners: OwnerMaps,
}

impl<'a> CilMetadata<'a> {
    /// Parses a metadata root byte range.
    ///
    /// The stream layout is selected here, once: a `#-` directory entry
    /// makes this an edit-and-continue view, otherwise `#~` is required.
    ///
    /// # Errors
    /// Fails on a bad signature, a truncated stream directory, a stream
    /// range past the end of the input, or a missing tables stream - the
    /// structural failures every other address depends on.
    pub fn from(data: &'a [u8]) -> Result<CilMetadata<'a>> {
        let root = Root::read(data)?;

        let slice_of = |name: &str| -> Result<Option<&'a [u8]>> {
            match root.stream(name) {
                Some(header) => {
                    let start = header.offset as usize;
                    let Some(end) = start.checked_add(header.size as usize) else {
                        return Err(out_of_bounds_error!());
                    };
                    if end > data.len() {
                        return Err(out_of_bounds_error!());
                    }
                    Ok(Some(&data[start..end]))
                }
                None => Ok(None),
            }
        };

        let tables = if let Some(enc) = slice_of("#-")? {
            TablesStream::from(enc, StreamVariant::EditAndContinue)?
        } else if let Some(compressed) = slice_of("#~")? {
            TablesStream::from(compressed, StreamVariant::Compressed)?
        } else {
            return Err(malformed_error!("Neither '#~' nor '#-' stream is present"));
        };

        let strings = match slice_of("#Strings")? {
            Some(slice) => Some(Strings::from(slice)?),
            None => None,
        };
        let user_strings = match slice_of("#US")? {
            Some(slice) => Some(UserStrings::from(slice)?),
            None => None,
        };
        let guids = match slice_of("#GUID")? {
            Some(slice) => Some(Guid::from(slice)?),
            None => None,
        };
        let blobs = match slice_of("#Blob")? {
            Some(slice) => Some(Blob::from(slice)?),
            None => None,
        };

        Ok(CilMetadata {
            root,
            strings,
            user_strings,
            guids,
            blobs,
            tables,
            owners: OwnerMaps::default(),
        })
    }

    /// The parsed metadata root header.
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The tables stream.
    #[must_use]
    pub fn tables(&self) -> &TablesStream<'a> {
        &self.tables
    }

    /// The `#Strings` heap, if present.
    #[must_use]
    pub fn strings(&self) -> Option<&Strings<'a>> {
        self.strings.as_ref()
    }

    /// The `#US` heap, if present.
    #[must_use]
    pub fn user_strings(&self) -> Option<&UserStrings<'a>> {
        self.user_strings.as_ref()
    }

    /// The `#GUID` heap, if present.
    #[must_use]
    pub fn guids(&self) -> Option<&Guid<'a>> {
        self.guids.as_ref()
    }

    /// The `#Blob` heap, if present.
    #[must_use]
    pub fn blobs(&self) -> Option<&Blob<'a>> {
        self.blobs.as_ref()
    }

    /// The fields owned by a `TypeDef` row.
    #[must_use]
    pub fn field_list(&self, typedef_rid: u32) -> RidList {
        self.rid_list(
            TableId::TypeDef,
            typedef_rid,
            column::TYPEDEF_FIELD_LIST,
            TableId::Field,
        )
    }

    /// The methods owned by a `TypeDef` row.
    #[must_use]
    pub fn method_list(&self, typedef_rid: u32) -> RidList {
        self.rid_list(
            TableId::TypeDef,
            typedef_rid,
            column::TYPEDEF_METHOD_LIST,
            TableId::MethodDef,
        )
    }

    /// The parameters owned by a `Method` row.
    #[must_use]
    pub fn param_list(&self, method_rid: u32) -> RidList {
        self.rid_list(
            TableId::MethodDef,
            method_rid,
            column::METHOD_PARAM_LIST,
            TableId::Param,
        )
    }

    /// The events owned by an `EventMap` row.
    #[must_use]
    pub fn event_list(&self, eventmap_rid: u32) -> RidList {
        self.rid_list(
            TableId::EventMap,
            eventmap_rid,
            column::EVENTMAP_EVENT_LIST,
            TableId::Event,
        )
    }

    /// The properties owned by a `PropertyMap` row.
    #[must_use]
    pub fn property_list(&self, propertymap_rid: u32) -> RidList {
        self.rid_list(
            TableId::PropertyMap,
            propertymap_rid,
            column::PROPERTYMAP_PROPERTY_LIST,
            TableId::Property,
        )
    }

    /// The children of `parent_rid` through a list column.
    ///
    /// Implements the "list runs until the next row's pointer, or the end
    /// of the child table" rule, clamped against corrupt pointers. Under
    /// the edit-and-continue layout the logical indices are remapped
    /// through the child's pointer table if - and only if - that table
    /// has rows, and logically deleted children are filtered if - and
    /// only if - the stream flags say deletion is possible.
    #[must_use]
    pub fn rid_list(
        &self,
        parent: TableId,
        parent_rid: u32,
        list_col: usize,
        child: TableId,
    ) -> RidList {
        match self.tables.variant() {
            StreamVariant::Compressed => self.rid_list_direct(parent, parent_rid, list_col, child),
            StreamVariant::EditAndContinue => {
                self.rid_list_enc(parent, parent_rid, list_col, child)
            }
        }
    }

    /// The direct range rule over `bound` (the table whose row count
    /// limits the stored indices).
    fn rid_list_direct(
        &self,
        parent: TableId,
        parent_rid: u32,
        list_col: usize,
        bound: TableId,
    ) -> RidList {
        let rows = self.tables.row_count(bound);
        let Some(start) = self.tables.cell(parent, parent_rid, list_col) else {
            return RidList::EMPTY;
        };

        if start == 0 || start > rows {
            return RidList::EMPTY;
        }

        let end = match self.tables.cell(parent, parent_rid + 1, list_col) {
            Some(next) => next.clamp(start, rows + 1),
            None => rows + 1,
        };

        RidList::contiguous(start, end - start)
    }

    fn rid_list_enc(
        &self,
        parent: TableId,
        parent_rid: u32,
        list_col: usize,
        child: TableId,
    ) -> RidList {
        let remap = indirection_table(child).filter(|ptr| self.tables.row_count(*ptr) > 0);
        let bound = remap.unwrap_or(child);

        let logical = self.rid_list_direct(parent, parent_rid, list_col, bound);
        let filter_deleted = self.tables.flags.contains(TablesStreamFlags::HAS_DELETE)
            && deletable_name_column(child).is_some();

        if remap.is_none() && !filter_deleted {
            return logical;
        }

        let child_rows = self.tables.row_count(child);
        let mut rids = Vec::with_capacity(logical.len());
        for index in &logical {
            let physical = match remap {
                Some(ptr) => self.tables.cell(ptr, index, 0).unwrap_or(0),
                None => index,
            };

            // A broken pointer entry drops that one child, not the list
            if physical == 0 || physical > child_rows {
                continue;
            }

            if filter_deleted && self.is_row_deleted(child, physical) {
                continue;
            }

            rids.push(physical);
        }

        RidList::explicit(rids)
    }

    /// Returns `true` if a row is logically deleted.
    ///
    /// Deleted rows stay resolvable by direct rid lookup; only
    /// enumeration through [`CilMetadata::rid_list`] filters them. A row
    /// counts as deleted when the stream allows deletion, the table kind
    /// supports it, and its name carries the `_Deleted` sentinel.
    #[must_use]
    pub fn is_row_deleted(&self, table: TableId, rid: u32) -> bool {
        if !self.tables.flags.contains(TablesStreamFlags::HAS_DELETE) {
            return false;
        }

        let Some(name_col) = deletable_name_column(table) else {
            return false;
        };

        let Some(name_offset) = self.tables.cell(table, rid, name_col) else {
            return false;
        };

        let Some(strings) = self.strings.as_ref() else {
            return false;
        };

        match strings.get(name_offset as usize) {
            Ok(name) => name.starts_with(DELETED_NAME_PREFIX),
            Err(_) => false,
        }
    }

    /// The `TypeDef` rid owning a `Field` row, or `None` if no type
    /// claims it.
    #[must_use]
    pub fn field_owner(&self, field_rid: u32) -> Option<u32> {
        let map = self.owners.field.get_or_init(|| {
            self.build_owner_map(TableId::Field, |owner| {
                (owner, self.field_list(owner))
            })
        });
        lookup_owner(map, field_rid)
    }

    /// The `TypeDef` rid owning a `Method` row.
    #[must_use]
    pub fn method_owner(&self, method_rid: u32) -> Option<u32> {
        let map = self.owners.method.get_or_init(|| {
            self.build_owner_map(TableId::MethodDef, |owner| {
                (owner, self.method_list(owner))
            })
        });
        lookup_owner(map, method_rid)
    }

    /// The `Method` rid owning a `Param` row.
    #[must_use]
    pub fn param_owner(&self, param_rid: u32) -> Option<u32> {
        let map = self.owners.param.get_or_init(|| {
            let rows = self.tables.row_count(TableId::MethodDef);
            let mut map = vec![0_u32; self.tables.row_count(TableId::Param) as usize + 1];
            for owner in 1..=rows {
                record_owners(&mut map, owner, &self.param_list(owner));
            }
            map.into_boxed_slice()
        });
        lookup_owner(map, param_rid)
    }

    /// The `TypeDef` rid owning an `Event` row, resolved through
    /// `EventMap`.
    #[must_use]
    pub fn event_owner(&self, event_rid: u32) -> Option<u32> {
        let map = self.owners.event.get_or_init(|| {
            let mut map = vec![0_u32; self.tables.row_count(TableId::Event) as usize + 1];
            for map_rid in 1..=self.tables.row_count(TableId::EventMap) {
                let Some(parent) =
                    self.tables.cell(TableId::EventMap, map_rid, column::EVENTMAP_PARENT)
                else {
                    continue;
                };
                record_owners(&mut map, parent, &self.event_list(map_rid));
            }
            map.into_boxed_slice()
        });
        lookup_owner(map, event_rid)
    }

    /// The `TypeDef` rid owning a `Property` row, resolved through
    /// `PropertyMap`.
    #[must_use]
    pub fn property_owner(&self, property_rid: u32) -> Option<u32> {
        let map = self.owners.property.get_or_init(|| {
            let mut map = vec![0_u32; self.tables.row_count(TableId::Property) as usize + 1];
            for map_rid in 1..=self.tables.row_count(TableId::PropertyMap) {
                let Some(parent) = self
                    .tables
                    .cell(TableId::PropertyMap, map_rid, column::PROPERTYMAP_PARENT)
                else {
                    continue;
                };
                record_owners(&mut map, parent, &self.property_list(map_rid));
            }
            map.into_boxed_slice()
        });
        lookup_owner(map, property_rid)
    }

    fn build_owner_map(
        &self,
        child: TableId,
        lists: impl Fn(u32) -> (u32, RidList),
    ) -> Box<[u32]> {
        let mut map = vec![0_u32; self.tables.row_count(child) as usize + 1];
        for owner in 1..=self.tables.row_count(TableId::TypeDef) {
            let (owner_rid, list) = lists(owner);
            record_owners(&mut map, owner_rid, &list);
        }
        map.into_boxed_slice()
    }

    /// Finds the first row whose `key_col` value equals `key`.
    ///
    /// Binary search is attempted only when the header claims the table
    /// is sorted and the claim is not known-bad (`GenericParam` under
    /// `#-` can be unsorted regardless). A binary-search miss falls back
    /// to a linear scan instead of reporting absence, so an unreliable
    /// sorted bit can cost time but never correctness.
    #[must_use]
    pub fn find_row_by_sorted_key(&self, table: TableId, key_col: usize, key: u32) -> Option<u32> {
        match self.find_rows_by_sorted_key(table, key_col, key) {
            list if list.is_empty() => None,
            list => list.get(0),
        }
    }

    /// Finds every row whose `key_col` value equals `key`.
    ///
    /// Returns a contiguous list when the binary search succeeds and an
    /// explicit one from the linear fallback (matches can be scattered
    /// in an unsorted table).
    #[must_use]
    pub fn find_rows_by_sorted_key(&self, table: TableId, key_col: usize, key: u32) -> RidList {
        let rows = self.tables.row_count(table);
        if rows == 0 {
            return RidList::EMPTY;
        }

        let trusted = self.tables.is_sorted(table)
            && !(self.tables.variant() == StreamVariant::EditAndContinue
                && table == TableId::GenericParam);

        if trusted {
            if let Some(hit) = self.binary_search(table, key_col, key, rows) {
                let mut first = hit;
                while first > 1 && self.tables.cell(table, first - 1, key_col) == Some(key) {
                    first -= 1;
                }
                let mut last = hit;
                while last < rows && self.tables.cell(table, last + 1, key_col) == Some(key) {
                    last += 1;
                }
                return RidList::contiguous(first, last - first + 1);
            }
            // Sorted bit may be lying; verify the miss the slow way
        }

        let matches: Vec<u32> = (1..=rows)
            .filter(|rid| self.tables.cell(table, *rid, key_col) == Some(key))
            .collect();
        RidList::explicit(matches)
    }

    fn binary_search(&self, table: TableId, key_col: usize, key: u32, rows: u32) -> Option<u32> {
        let mut lo = 1_u32;
        let mut hi = rows;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let value = self.tables.cell(table, mid, key_col)?;
            match value.cmp(&key) {
                std::cmp::Ordering::Equal => return Some(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => {
                    if mid == 1 {
                        return None;
                    }
                    hi = mid - 1;
                }
            }
        }
        None
    }
}

/// The indirection table remapping logical child indices, if the child
/// kind has one.
fn indirection_table(child: TableId) -> Option<TableId> {
    match child {
        TableId::Field => Some(TableId::FieldPtr),
        TableId::MethodDef => Some(TableId::MethodPtr),
        TableId::Param => Some(TableId::ParamPtr),
        TableId::Event => Some(TableId::EventPtr),
        TableId::Property => Some(TableId::PropertyPtr),
        _ => None,
    }
}

/// The name column of tables whose rows can be logically deleted.
fn deletable_name_column(table: TableId) -> Option<usize> {
    match table {
        TableId::TypeDef => Some(column::TYPEDEF_NAME),
        TableId::Field => Some(column::FIELD_NAME),
        TableId::MethodDef => Some(column::METHOD_NAME),
        TableId::Event => Some(column::EVENT_NAME),
        TableId::Property => Some(column::PROPERTY_NAME),
        _ => None,
    }
}

fn record_owners(map: &mut [u32], owner: u32, list: &RidList) {
    for rid in list {
        if let Some(slot) = map.get_mut(rid as usize) {
            // First owner wins; later claims on the same child are corrupt
            if *slot == 0 {
                *slot = owner;
            }
        }
    }
}

fn lookup_owner(map: &[u32], rid: u32) -> Option<u32> {
    match map.get(rid as usize) {
        Some(0) | None => None,
        Some(owner) => Some(*owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::schema::column;

    fn le16(value: u32) -> [u8; 2] {
        #[allow(clippy::cast_possible_truncation)]
        let value = value as u16;
        value.to_le_bytes()
    }

    /// TypeDef row with all simple 2-byte indexes.
    fn typedef_row(name: u32, field_list: u32, method_list: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&0_u32.to_le_bytes()); // Flags
        row.extend_from_slice(&le16(name));
        row.extend_from_slice(&le16(0)); // Namespace
        row.extend_from_slice(&le16(0)); // Extends
        row.extend_from_slice(&le16(field_list));
        row.extend_from_slice(&le16(method_list));
        row
    }

    fn field_row(flags: u32, name: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&le16(flags));
        row.extend_from_slice(&le16(name));
        row.extend_from_slice(&le16(0)); // Signature
        row
    }

    fn method_row(name: u32, param_list: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&0_u32.to_le_bytes()); // RVA
        row.extend_from_slice(&le16(0)); // ImplFlags
        row.extend_from_slice(&le16(0)); // Flags
        row.extend_from_slice(&le16(name));
        row.extend_from_slice(&le16(0)); // Signature
        row.extend_from_slice(&le16(param_list));
        row
    }

    /// Builds a full metadata root: tables stream (+ optional strings
    /// heap) behind a directory. Tables must come in `TableId` order.
    fn build_metadata(
        enc: bool,
        heap_flags: u8,
        sorted: u64,
        tables: &[(TableId, Vec<Vec<u8>>)],
        strings: &[u8],
    ) -> Vec<u8> {
        let mut valid = 0_u64;
        for (id, _) in tables {
            valid |= 1 << (*id as u8);
        }

        let mut stream = Vec::new();
        stream.extend_from_slice(&0_u32.to_le_bytes());
        stream.push(2); // major
        stream.push(0); // minor
        stream.push(heap_flags);
        stream.push(1);
        stream.extend_from_slice(&valid.to_le_bytes());
        stream.extend_from_slice(&sorted.to_le_bytes());
        for (_, rows) in tables {
            stream.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        }
        for (_, rows) in tables {
            for row in rows {
                stream.extend_from_slice(row);
            }
        }

        let tables_name: &[u8] = if enc { b"#-\0\0" } else { b"#~\0\0" };
        let with_strings = !strings.is_empty();

        let mut data = Vec::new();
        data.extend_from_slice(&0x424A_5342_u32.to_le_bytes());
        data.extend_from_slice(&1_u16.to_le_bytes());
        data.extend_from_slice(&1_u16.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&4_u32.to_le_bytes());
        data.extend_from_slice(b"v4\0\0");
        data.extend_from_slice(&0_u16.to_le_bytes());
        data.extend_from_slice(&(1 + u16::from(with_strings)).to_le_bytes());

        let directory_len = 12 + if with_strings { 20 } else { 0 };
        let tables_offset = data.len() + directory_len;
        let strings_offset = tables_offset + stream.len();

        data.extend_from_slice(&(tables_offset as u32).to_le_bytes());
        data.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        data.extend_from_slice(tables_name);
        if with_strings {
            data.extend_from_slice(&(strings_offset as u32).to_le_bytes());
            data.extend_from_slice(&(strings.len() as u32).to_le_bytes());
            data.extend_from_slice(b"#Strings\0\0\0\0");
        }

        data.extend_from_slice(&stream);
        data.extend_from_slice(strings);
        data
    }

    #[test]
    fn owner_ranges_partition_children() {
        // 3 types: fields [1,2], [], [3,4]; methods [1], [2,3], []
        let data = build_metadata(
            false,
            0,
            0,
            &[
                (
                    TableId::TypeDef,
                    vec![
                        typedef_row(0, 1, 1),
                        typedef_row(0, 3, 2),
                        typedef_row(0, 3, 4),
                    ],
                ),
                (
                    TableId::Field,
                    vec![field_row(0, 0), field_row(0, 0), field_row(0, 0), field_row(0, 0)],
                ),
                (
                    TableId::MethodDef,
                    vec![method_row(0, 1), method_row(0, 1), method_row(0, 1)],
                ),
            ],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(metadata.tables().variant(), StreamVariant::Compressed);

        assert_eq!(metadata.field_list(1), RidList::contiguous(1, 2));
        assert_eq!(metadata.field_list(2), RidList::EMPTY);
        assert_eq!(metadata.field_list(3), RidList::contiguous(3, 2));
        assert_eq!(metadata.field_list(4), RidList::EMPTY); // no such parent

        assert_eq!(metadata.method_list(1), RidList::contiguous(1, 1));
        assert_eq!(metadata.method_list(2), RidList::contiguous(2, 2));
        assert_eq!(metadata.method_list(3), RidList::EMPTY);

        // Every field rid appears in exactly one list
        let mut seen = vec![false; 5];
        for parent in 1..=3 {
            for rid in &metadata.field_list(parent) {
                assert!(!seen[rid as usize], "field {rid} claimed twice");
                seen[rid as usize] = true;
            }
        }
        assert!(seen[1..].iter().all(|claimed| *claimed));

        assert_eq!(metadata.field_owner(1), Some(1));
        assert_eq!(metadata.field_owner(2), Some(1));
        assert_eq!(metadata.field_owner(3), Some(3));
        assert_eq!(metadata.field_owner(4), Some(3));
        assert_eq!(metadata.field_owner(5), None);
        assert_eq!(metadata.method_owner(2), Some(2));
        assert_eq!(metadata.method_owner(3), Some(2));
    }

    #[test]
    fn corrupt_list_pointers_clamp() {
        // Row 1 points past the child table; row 2's range runs
        // backwards (next < start)
        let data = build_metadata(
            false,
            0,
            0,
            &[
                (
                    TableId::TypeDef,
                    vec![
                        typedef_row(0, 9, 0),
                        typedef_row(0, 2, 0),
                        typedef_row(0, 1, 0),
                    ],
                ),
                (TableId::Field, vec![field_row(0, 0), field_row(0, 0)]),
            ],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(metadata.field_list(1), RidList::EMPTY); // start > rows
        assert_eq!(metadata.field_list(2), RidList::EMPTY); // clamped to empty
        assert_eq!(metadata.field_list(3), RidList::contiguous(1, 2));
    }

    #[test]
    fn enc_pointer_table_remaps() {
        // FieldPtr reverses the two fields of the single type
        let data = build_metadata(
            true,
            0,
            0,
            &[
                (TableId::TypeDef, vec![typedef_row(0, 1, 0)]),
                (TableId::FieldPtr, vec![le16(2).to_vec(), le16(1).to_vec()]),
                (TableId::Field, vec![field_row(0, 0), field_row(0, 0)]),
            ],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(metadata.tables().variant(), StreamVariant::EditAndContinue);
        assert_eq!(metadata.field_list(1), RidList::explicit(vec![2, 1]));
        assert_eq!(metadata.field_owner(1), Some(1));
        assert_eq!(metadata.field_owner(2), Some(1));
    }

    #[test]
    fn enc_without_pointer_table_stays_contiguous() {
        let data = build_metadata(
            true,
            0,
            0,
            &[
                (TableId::TypeDef, vec![typedef_row(0, 1, 0)]),
                (TableId::Field, vec![field_row(0, 0), field_row(0, 0)]),
            ],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(metadata.field_list(1), RidList::contiguous(1, 2));
    }

    #[test]
    fn enc_deleted_rows_filtered_from_enumeration() {
        // #Strings: offset 1 = "x", offset 3 = "_DeletedField"
        let mut strings = vec![0_u8];
        strings.extend_from_slice(b"x\0_DeletedField\0");

        let data = build_metadata(
            true,
            0x80, // HAS_DELETE
            0,
            &[
                (TableId::TypeDef, vec![typedef_row(1, 1, 0)]),
                (TableId::Field, vec![field_row(0x0400, 3), field_row(0, 1)]),
            ],
            &strings,
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert!(metadata.is_row_deleted(TableId::Field, 1));
        assert!(!metadata.is_row_deleted(TableId::Field, 2));

        // Enumeration filters the deleted row, direct lookup still works
        assert_eq!(metadata.field_list(1), RidList::explicit(vec![2]));
        assert!(metadata.tables().row(TableId::Field, 1).is_some());
    }

    #[test]
    fn delete_filter_requires_stream_flag() {
        let mut strings = vec![0_u8];
        strings.extend_from_slice(b"_DeletedField\0");

        let data = build_metadata(
            true,
            0, // no HAS_DELETE
            0,
            &[
                (TableId::TypeDef, vec![typedef_row(0, 1, 0)]),
                (TableId::Field, vec![field_row(0x0400, 1)]),
            ],
            &strings,
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert!(!metadata.is_row_deleted(TableId::Field, 1));
        assert_eq!(metadata.field_list(1), RidList::contiguous(1, 1));
    }

    #[test]
    fn sorted_key_lookup_binary() {
        // InterfaceImpl sorted by Class: 1, 2, 2, 5
        let impl_row = |class: u32| {
            let mut row = Vec::new();
            row.extend_from_slice(&le16(class));
            row.extend_from_slice(&le16(0));
            row
        };

        let data = build_metadata(
            false,
            0,
            1 << TableId::InterfaceImpl as u8,
            &[(
                TableId::InterfaceImpl,
                vec![impl_row(1), impl_row(2), impl_row(2), impl_row(5)],
            )],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(
            metadata.find_rows_by_sorted_key(TableId::InterfaceImpl, 0, 2),
            RidList::contiguous(2, 2)
        );
        assert_eq!(
            metadata.find_row_by_sorted_key(TableId::InterfaceImpl, 0, 5),
            Some(4)
        );
        assert_eq!(
            metadata.find_row_by_sorted_key(TableId::InterfaceImpl, 0, 3),
            None
        );
    }

    #[test]
    fn lying_sorted_bit_falls_back_to_linear() {
        let impl_row = |class: u32| {
            let mut row = Vec::new();
            row.extend_from_slice(&le16(class));
            row.extend_from_slice(&le16(0));
            row
        };

        // Sorted bit set, data unsorted: 5, 1, 3
        let data = build_metadata(
            false,
            0,
            1 << TableId::InterfaceImpl as u8,
            &[(
                TableId::InterfaceImpl,
                vec![impl_row(5), impl_row(1), impl_row(3)],
            )],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        // A binary search for 5 walks right past it and misses; the
        // fallback scan still finds it
        assert_eq!(
            metadata.find_row_by_sorted_key(TableId::InterfaceImpl, 0, 5),
            Some(1)
        );
        assert_eq!(
            metadata.find_rows_by_sorted_key(TableId::InterfaceImpl, 0, 5),
            RidList::explicit(vec![1])
        );
    }

    #[test]
    fn generic_param_under_enc_never_trusts_sorted_bit() {
        let gp_row = |owner: u32| {
            let mut row = Vec::new();
            row.extend_from_slice(&le16(0)); // Number
            row.extend_from_slice(&le16(0)); // Flags
            row.extend_from_slice(&le16(owner));
            row.extend_from_slice(&le16(0)); // Name
            row
        };

        let data = build_metadata(
            true,
            0,
            1 << TableId::GenericParam as u8,
            &[(TableId::GenericParam, vec![gp_row(9), gp_row(2), gp_row(4)])],
            &[],
        );

        let metadata = CilMetadata::from(&data).unwrap();
        assert_eq!(
            metadata.find_row_by_sorted_key(
                TableId::GenericParam,
                column::GENERICPARAM_OWNER,
                2
            ),
            Some(2)
        );
    }

    #[test]
    fn missing_tables_stream_is_fatal() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x424A_5342_u32.to_le_bytes());
        data.extend_from_slice(&1_u16.to_le_bytes());
        data.extend_from_slice(&1_u16.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&4_u32.to_le_bytes());
        data.extend_from_slice(b"v4\0\0");
        data.extend_from_slice(&0_u16.to_le_bytes());
        data.extend_from_slice(&0_u16.to_le_bytes()); // no streams

        assert!(CilMetadata::from(&data).is_err());
    }

    #[test]
    fn stream_range_past_input_is_fatal() {
        let data = build_metadata(
            false,
            0,
            0,
            &[(TableId::TypeDef, vec![typedef_row(0, 0, 0)])],
            &[],
        );

        // Cut the tables stream short
        let truncated = &data[..data.len() - 4];
        assert!(CilMetadata::from(truncated).is_err());
    }
}
