//! Coded indices - compact cross-table references (II.24.2.6).
//!
//! A coded index packs a table selector and a row id into one value: the
//! low `tag_bits` bits pick a table out of the category's fixed candidate
//! set, the remaining bits carry the rid. Which categories exist, which
//! tables each can name, and in which order, is fixed by the standard and
//! reproduced here; only the *byte width* of a stored coded index varies
//! per file (see [`crate::metadata::tables::TableInfo`]).

use strum::{EnumCount, EnumIter};

use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{TableId, TableInfoRef},
        token::{Token, RID_MAX},
    },
    Error, Result,
};

/// The coded index categories defined by the CLI metadata specification.
///
/// Each category is an ordered set of candidate tables plus a tag width.
/// `HasCustomAttribute` is the widest with 22 candidates (5 tag bits);
/// most categories fit 2 bits.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexKind {
    /// `TypeDef`, `TypeRef` or `TypeSpec` - the unified type reference.
    TypeDefOrRef,
    /// `Field`, `Param` or `Property` - entities carrying constants.
    HasConstant,
    /// Any of the 22 entity kinds that can carry custom attributes.
    HasCustomAttribute,
    /// `Field` or `Param` - entities carrying marshalling descriptors.
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef` or `Assembly` - security attribute targets.
    HasDeclSecurity,
    /// Parent of a `MemberRef` row.
    MemberRefParent,
    /// `Event` or `Property` - targets of semantic methods.
    HasSemantics,
    /// `MethodDef` or `MemberRef`.
    MethodDefOrRef,
    /// `Field` or `MethodDef` - P/Invoke forwarded members.
    MemberForwarded,
    /// `File`, `AssemblyRef` or `ExportedType` - export locations.
    Implementation,
    /// Custom attribute constructors. Tags 0, 1 and 4 are reserved and
    /// name no table; only `MethodDef` (tag 2) and `MemberRef` (tag 3)
    /// are valid.
    CustomAttributeType,
    /// Scope a `TypeRef` resolves in.
    ResolutionScope,
    /// `TypeDef` or `MethodDef` - generic parameter owners.
    TypeOrMethodDef,
}

impl CodedIndexKind {
    /// The tag slot table of this category, in encoding order.
    ///
    /// `None` marks a reserved slot: it widens the tag but can never be
    /// produced by [`encode_coded_index`] nor accepted by
    /// [`decode_coded_index`].
    #[must_use]
    pub fn tables(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexKind::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexKind::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexKind::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                // The standard labels this slot 'Permission'; no table of
                // that name exists, DeclSecurity is what is meant.
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexKind::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexKind::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexKind::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexKind::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexKind::MethodDefOrRef => &[Some(TableId::MethodDef), Some(TableId::MemberRef)],
            CodedIndexKind::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexKind::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexKind::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexKind::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexKind::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits used as the table selector.
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        let len = self.tables().len() as u32;
        // ceil(log2(len)) via leading zeros; every category has >= 2 slots
        (32 - (len - 1).leading_zeros()) as u8
    }
}

/// Encodes `(table, rid)` under a coded index category.
///
/// # Errors
/// - [`crate::Error::CodedIndexTable`] if the table is not a member of the
///   category
/// - [`crate::Error::RidOutOfRange`] if the rid does not fit 24 bits
///
/// # Examples
///
/// ```rust
/// use dotmeta::metadata::tables::{encode_coded_index, CodedIndexKind, TableId};
///
/// let coded = encode_coded_index(CodedIndexKind::TypeDefOrRef, TableId::TypeDef, 5)?;
/// assert_eq!(coded, 20); // (5 << 2) | 0
/// # Ok::<(), dotmeta::Error>(())
/// ```
pub fn encode_coded_index(kind: CodedIndexKind, table: TableId, rid: u32) -> Result<u32> {
    if rid > RID_MAX {
        return Err(Error::RidOutOfRange(rid));
    }

    let Some(tag) = kind.tables().iter().position(|slot| *slot == Some(table)) else {
        return Err(Error::CodedIndexTable { kind, table });
    };

    let tag = tag as u32;
    Ok((rid << kind.tag_bits()) | tag)
}

/// Decodes a coded index value into its table and rid.
///
/// Rid 0 decodes successfully - it is the legitimate "no target" value
/// and must stay distinguishable from a decode failure.
///
/// # Errors
/// - [`crate::Error::CodedIndexTag`] if the tag selects a reserved slot or
///   lies past the candidate set
/// - [`crate::Error::RidOutOfRange`] if the rid part does not fit 24 bits
pub fn decode_coded_index(kind: CodedIndexKind, value: u32) -> Result<CodedIndex> {
    let bits = kind.tag_bits();
    let tag = value & ((1 << bits) - 1);
    let rid = value >> bits;

    let Some(Some(table)) = kind.tables().get(tag as usize) else {
        return Err(Error::CodedIndexTag { kind, tag });
    };

    if rid > RID_MAX {
        return Err(Error::RidOutOfRange(rid));
    }

    Ok(CodedIndex::new(*table, rid))
}

/// A decoded coded index: target table, row id and the equivalent token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The table this index refers to.
    pub table: TableId,
    /// The 1-based row id within that table; 0 is the null reference.
    pub rid: u32,
    /// The metadata token addressing the same row.
    pub token: Token,
}

impl CodedIndex {
    /// Builds a coded index from its parts, computing the token.
    #[must_use]
    pub fn new(table: TableId, rid: u32) -> CodedIndex {
        CodedIndex {
            table,
            rid,
            token: table.token(rid),
        }
    }

    /// Reads a coded index column from raw row bytes.
    ///
    /// The stored width (2 or 4 bytes) comes from the per-file
    /// [`crate::metadata::tables::TableInfo`]; the value is then decoded
    /// under `kind`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer, or the
    /// decode errors of [`decode_coded_index`].
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        info: &TableInfoRef,
        kind: CodedIndexKind,
    ) -> Result<Self> {
        let value = read_le_at_dyn(data, offset, info.coded_index_bytes(kind) == 4)?;
        decode_coded_index(kind, value)
    }
}
