//! The fixed table schema (II.22) - column names, kinds and the version
//! fork.
//!
//! Column *identity* is constant: every `TypeDef` row everywhere has six
//! columns in the same order. What varies per file is the byte width of
//! heap, table and coded-index columns, which
//! [`crate::metadata::tables::TableInfo`] resolves from the heap-size
//! flags and row counts. This module only carries the constant half: the
//! per-table column descriptors, plus the single version-dependent fork
//! the format ever had (the `GenericParam` shape and the shortened table
//! set of 1.0 streams).

use crate::metadata::tables::{CodedIndexKind, TableId};

/// Logical size category of a table column.
///
/// Fixed-width columns are stored as-is; the other categories resolve to
/// 2 or 4 bytes once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// A fixed 1-byte value.
    UInt8,
    /// A fixed 2-byte value.
    UInt16,
    /// A fixed 4-byte value.
    UInt32,
    /// An index into the `#Strings` heap.
    Strings,
    /// An index into the `#GUID` heap.
    Guid,
    /// An index into the `#Blob` heap.
    Blob,
    /// A simple index into one fixed table.
    Table(TableId),
    /// A coded index choosing among the category's candidate tables.
    Coded(CodedIndexKind),
}

/// One column of a table: its diagnostic name and size category.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name as given by the standard (diagnostic only).
    pub name: &'static str,
    /// The column's logical size category.
    pub ty: ColumnType,
}

macro_rules! cols {
    ($($name:literal => $ty:expr),* $(,)?) => {
        &[$(ColumnDef { name: $name, ty: $ty }),*]
    };
}

/// The schema revision of a tables stream, selected by the stream's
/// major/minor version bytes *before* any column width is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Metadata 1.0 - table set ends at `NestedClass`.
    V1_0,
    /// Metadata 1.1 - full table set, `GenericParam` carries a `Kind`
    /// column.
    V1_1,
    /// Metadata 2.0 and later - full table set, 4-column `GenericParam`.
    V2,
}

impl SchemaVersion {
    /// Selects the schema revision for a stream version pair.
    #[must_use]
    pub fn from_stream_version(major: u8, minor: u8) -> SchemaVersion {
        match (major, minor) {
            (1, 0) => SchemaVersion::V1_0,
            (1, 1) => SchemaVersion::V1_1,
            _ => SchemaVersion::V2,
        }
    }

    /// Number of table kinds this revision can contain.
    #[must_use]
    pub fn table_count(&self) -> usize {
        match self {
            SchemaVersion::V1_0 => TableId::NestedClass as usize + 1,
            _ => TableId::GenericParamConstraint as usize + 1,
        }
    }

    /// Returns `true` if the revision's table set includes `table`.
    #[must_use]
    pub fn contains(&self, table: TableId) -> bool {
        (table as usize) < self.table_count()
    }
}

use self::ColumnType::{Blob, Coded, Guid, Strings, Table, UInt16, UInt32, UInt8};

/// The column descriptors of a table under the given schema revision.
#[must_use]
pub fn columns(table: TableId, version: SchemaVersion) -> &'static [ColumnDef] {
    match table {
        TableId::Module => cols![
            "Generation" => UInt16,
            "Name" => Strings,
            "Mvid" => Guid,
            "EncId" => Guid,
            "EncBaseId" => Guid,
        ],
        TableId::TypeRef => cols![
            "ResolutionScope" => Coded(CodedIndexKind::ResolutionScope),
            "Name" => Strings,
            "Namespace" => Strings,
        ],
        TableId::TypeDef => cols![
            "Flags" => UInt32,
            "Name" => Strings,
            "Namespace" => Strings,
            "Extends" => Coded(CodedIndexKind::TypeDefOrRef),
            "FieldList" => Table(TableId::Field),
            "MethodList" => Table(TableId::MethodDef),
        ],
        TableId::FieldPtr => cols!["Field" => Table(TableId::Field)],
        TableId::Field => cols![
            "Flags" => UInt16,
            "Name" => Strings,
            "Signature" => Blob,
        ],
        TableId::MethodPtr => cols!["Method" => Table(TableId::MethodDef)],
        TableId::MethodDef => cols![
            "RVA" => UInt32,
            "ImplFlags" => UInt16,
            "Flags" => UInt16,
            "Name" => Strings,
            "Signature" => Blob,
            "ParamList" => Table(TableId::Param),
        ],
        TableId::ParamPtr => cols!["Param" => Table(TableId::Param)],
        TableId::Param => cols![
            "Flags" => UInt16,
            "Sequence" => UInt16,
            "Name" => Strings,
        ],
        TableId::InterfaceImpl => cols![
            "Class" => Table(TableId::TypeDef),
            "Interface" => Coded(CodedIndexKind::TypeDefOrRef),
        ],
        TableId::MemberRef => cols![
            "Class" => Coded(CodedIndexKind::MemberRefParent),
            "Name" => Strings,
            "Signature" => Blob,
        ],
        TableId::Constant => cols![
            "Type" => UInt8,
            "Padding" => UInt8,
            "Parent" => Coded(CodedIndexKind::HasConstant),
            "Value" => Blob,
        ],
        TableId::CustomAttribute => cols![
            "Parent" => Coded(CodedIndexKind::HasCustomAttribute),
            "Type" => Coded(CodedIndexKind::CustomAttributeType),
            "Value" => Blob,
        ],
        TableId::FieldMarshal => cols![
            "Parent" => Coded(CodedIndexKind::HasFieldMarshal),
            "NativeType" => Blob,
        ],
        TableId::DeclSecurity => cols![
            "Action" => UInt16,
            "Parent" => Coded(CodedIndexKind::HasDeclSecurity),
            "PermissionSet" => Blob,
        ],
        TableId::ClassLayout => cols![
            "PackingSize" => UInt16,
            "ClassSize" => UInt32,
            "Parent" => Table(TableId::TypeDef),
        ],
        TableId::FieldLayout => cols![
            "OffSet" => UInt32,
            "Field" => Table(TableId::Field),
        ],
        TableId::StandAloneSig => cols!["Signature" => Blob],
        TableId::EventMap => cols![
            "Parent" => Table(TableId::TypeDef),
            "EventList" => Table(TableId::Event),
        ],
        TableId::EventPtr => cols!["Event" => Table(TableId::Event)],
        TableId::Event => cols![
            "EventFlags" => UInt16,
            "Name" => Strings,
            "EventType" => Coded(CodedIndexKind::TypeDefOrRef),
        ],
        TableId::PropertyMap => cols![
            "Parent" => Table(TableId::TypeDef),
            "PropertyList" => Table(TableId::Property),
        ],
        TableId::PropertyPtr => cols!["Property" => Table(TableId::Property)],
        TableId::Property => cols![
            "PropFlags" => UInt16,
            "Name" => Strings,
            "Type" => Blob,
        ],
        TableId::MethodSemantics => cols![
            "Semantic" => UInt16,
            "Method" => Table(TableId::MethodDef),
            "Association" => Coded(CodedIndexKind::HasSemantics),
        ],
        TableId::MethodImpl => cols![
            "Class" => Table(TableId::TypeDef),
            "MethodBody" => Coded(CodedIndexKind::MethodDefOrRef),
            "MethodDeclaration" => Coded(CodedIndexKind::MethodDefOrRef),
        ],
        TableId::ModuleRef => cols!["Name" => Strings],
        TableId::TypeSpec => cols!["Signature" => Blob],
        TableId::ImplMap => cols![
            "MappingFlags" => UInt16,
            "MemberForwarded" => Coded(CodedIndexKind::MemberForwarded),
            "ImportName" => Strings,
            "ImportScope" => Table(TableId::ModuleRef),
        ],
        TableId::FieldRVA => cols![
            "RVA" => UInt32,
            "Field" => Table(TableId::Field),
        ],
        TableId::EncLog => cols![
            "Token" => UInt32,
            "FuncCode" => UInt32,
        ],
        TableId::EncMap => cols!["Token" => UInt32],
        TableId::Assembly => cols![
            "HashAlgId" => UInt32,
            "MajorVersion" => UInt16,
            "MinorVersion" => UInt16,
            "BuildNumber" => UInt16,
            "RevisionNumber" => UInt16,
            "Flags" => UInt32,
            "PublicKey" => Blob,
            "Name" => Strings,
            "Locale" => Strings,
        ],
        TableId::AssemblyProcessor => cols!["Processor" => UInt32],
        TableId::AssemblyOS => cols![
            "OSPlatformId" => UInt32,
            "OSMajorVersion" => UInt32,
            "OSMinorVersion" => UInt32,
        ],
        TableId::AssemblyRef => cols![
            "MajorVersion" => UInt16,
            "MinorVersion" => UInt16,
            "BuildNumber" => UInt16,
            "RevisionNumber" => UInt16,
            "Flags" => UInt32,
            "PublicKeyOrToken" => Blob,
            "Name" => Strings,
            "Locale" => Strings,
            "HashValue" => Blob,
        ],
        TableId::AssemblyRefProcessor => cols![
            "Processor" => UInt32,
            "AssemblyRef" => Table(TableId::AssemblyRef),
        ],
        TableId::AssemblyRefOS => cols![
            "OSPlatformId" => UInt32,
            "OSMajorVersion" => UInt32,
            "OSMinorVersion" => UInt32,
            "AssemblyRef" => Table(TableId::AssemblyRef),
        ],
        TableId::File => cols![
            "Flags" => UInt32,
            "Name" => Strings,
            "HashValue" => Blob,
        ],
        TableId::ExportedType => cols![
            "Flags" => UInt32,
            "TypeDefId" => UInt32,
            "TypeName" => Strings,
            "TypeNamespace" => Strings,
            "Implementation" => Coded(CodedIndexKind::Implementation),
        ],
        TableId::ManifestResource => cols![
            "Offset" => UInt32,
            "Flags" => UInt32,
            "Name" => Strings,
            "Implementation" => Coded(CodedIndexKind::Implementation),
        ],
        TableId::NestedClass => cols![
            "NestedClass" => Table(TableId::TypeDef),
            "EnclosingClass" => Table(TableId::TypeDef),
        ],
        TableId::GenericParam => match version {
            SchemaVersion::V1_1 => cols![
                "Number" => UInt16,
                "Flags" => UInt16,
                "Owner" => Coded(CodedIndexKind::TypeOrMethodDef),
                "Name" => Strings,
                "Kind" => Coded(CodedIndexKind::TypeDefOrRef),
            ],
            _ => cols![
                "Number" => UInt16,
                "Flags" => UInt16,
                "Owner" => Coded(CodedIndexKind::TypeOrMethodDef),
                "Name" => Strings,
            ],
        },
        TableId::MethodSpec => cols![
            "Method" => Coded(CodedIndexKind::MethodDefOrRef),
            "Instantiation" => Blob,
        ],
        TableId::GenericParamConstraint => cols![
            "Owner" => Table(TableId::GenericParam),
            "Constraint" => Coded(CodedIndexKind::TypeDefOrRef),
        ],
    }
}

/// The widest row of the schema (`AssemblyRef`, 9 columns).
pub const MAX_COLUMNS: usize = 9;

/// Column positions used by the owner-range, reverse-map and deletion
/// logic. Kept next to the schema so a column reshuffle cannot silently
/// desync them.
pub mod column {
    /// `TypeDef.Flags`
    pub const TYPEDEF_FLAGS: usize = 0;
    /// `TypeDef.Name`
    pub const TYPEDEF_NAME: usize = 1;
    /// `TypeDef.FieldList`
    pub const TYPEDEF_FIELD_LIST: usize = 4;
    /// `TypeDef.MethodList`
    pub const TYPEDEF_METHOD_LIST: usize = 5;
    /// `Field.Flags`
    pub const FIELD_FLAGS: usize = 0;
    /// `Field.Name`
    pub const FIELD_NAME: usize = 1;
    /// `Method.Flags`
    pub const METHOD_FLAGS: usize = 2;
    /// `Method.Name`
    pub const METHOD_NAME: usize = 3;
    /// `Method.ParamList`
    pub const METHOD_PARAM_LIST: usize = 5;
    /// `EventMap.Parent`
    pub const EVENTMAP_PARENT: usize = 0;
    /// `EventMap.EventList`
    pub const EVENTMAP_EVENT_LIST: usize = 1;
    /// `PropertyMap.Parent`
    pub const PROPERTYMAP_PARENT: usize = 0;
    /// `PropertyMap.PropertyList`
    pub const PROPERTYMAP_PROPERTY_LIST: usize = 1;
    /// `Event.EventFlags`
    pub const EVENT_FLAGS: usize = 0;
    /// `Event.Name`
    pub const EVENT_NAME: usize = 1;
    /// `Property.PropFlags`
    pub const PROPERTY_FLAGS: usize = 0;
    /// `Property.Name`
    pub const PROPERTY_NAME: usize = 1;
    /// `GenericParam.Owner`
    pub const GENERICPARAM_OWNER: usize = 2;
}
