//! Identifiers for the fixed set of metadata tables.

use strum::{EnumCount, EnumIter, FromRepr};

use crate::metadata::token::Token;

/// The 45 metadata table kinds of the tables stream (II.22).
///
/// The enum discriminants are the on-disk table numbers, so a [`Token`]'s
/// high byte converts directly with [`TableId::from_repr`]. Table identity
/// and column *count* are fixed by the standard; only column *widths* vary
/// per file (resolved by [`crate::metadata::tables::TableInfo`]).
#[derive(
    Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, EnumIter, EnumCount, FromRepr,
)]
#[repr(u8)]
pub enum TableId {
    /// Current assembly information - 0x00
    Module = 0x00,
    /// References to external types - 0x01
    TypeRef = 0x01,
    /// Type definitions of this module - 0x02
    TypeDef = 0x02,
    /// Edit-and-continue indirection for `Field` - 0x03
    FieldPtr = 0x03,
    /// Field definitions - 0x04
    Field = 0x04,
    /// Edit-and-continue indirection for `MethodDef` - 0x05
    MethodPtr = 0x05,
    /// Method definitions - 0x06
    MethodDef = 0x06,
    /// Edit-and-continue indirection for `Param` - 0x07
    ParamPtr = 0x07,
    /// Parameter definitions - 0x08
    Param = 0x08,
    /// Interfaces implemented by types - 0x09
    InterfaceImpl = 0x09,
    /// References to external members - 0x0A
    MemberRef = 0x0A,
    /// Compile-time constant values - 0x0B
    Constant = 0x0B,
    /// Custom attribute applications - 0x0C
    CustomAttribute = 0x0C,
    /// Marshalling information for interop - 0x0D
    FieldMarshal = 0x0D,
    /// Declarative security permissions - 0x0E
    DeclSecurity = 0x0E,
    /// Explicit type layout - 0x0F
    ClassLayout = 0x0F,
    /// Explicit field offsets - 0x10
    FieldLayout = 0x10,
    /// Standalone signatures (locals, indirect calls) - 0x11
    StandAloneSig = 0x11,
    /// Type-to-event-range mapping - 0x12
    EventMap = 0x12,
    /// Edit-and-continue indirection for `Event` - 0x13
    EventPtr = 0x13,
    /// Event definitions - 0x14
    Event = 0x14,
    /// Type-to-property-range mapping - 0x15
    PropertyMap = 0x15,
    /// Edit-and-continue indirection for `Property` - 0x16
    PropertyPtr = 0x16,
    /// Property definitions - 0x17
    Property = 0x17,
    /// Getter/setter/adder associations - 0x18
    MethodSemantics = 0x18,
    /// Method overriding relationships - 0x19
    MethodImpl = 0x19,
    /// References to external modules - 0x1A
    ModuleRef = 0x1A,
    /// Type specifications (instantiated generics etc.) - 0x1B
    TypeSpec = 0x1B,
    /// P/Invoke mappings - 0x1C
    ImplMap = 0x1C,
    /// Initial field data locations - 0x1D
    FieldRVA = 0x1D,
    /// Edit-and-continue log - 0x1E
    EncLog = 0x1E,
    /// Edit-and-continue token map - 0x1F
    EncMap = 0x1F,
    /// Assembly manifest of this module - 0x20
    Assembly = 0x20,
    /// Processor targeting (unused by current runtimes) - 0x21
    AssemblyProcessor = 0x21,
    /// OS targeting (unused by current runtimes) - 0x22
    AssemblyOS = 0x22,
    /// References to external assemblies - 0x23
    AssemblyRef = 0x23,
    /// Processor targeting of references (unused) - 0x24
    AssemblyRefProcessor = 0x24,
    /// OS targeting of references (unused) - 0x25
    AssemblyRefOS = 0x25,
    /// Files of a multi-module assembly - 0x26
    File = 0x26,
    /// Types exported from other modules - 0x27
    ExportedType = 0x27,
    /// Embedded and linked resources - 0x28
    ManifestResource = 0x28,
    /// Nested type relationships - 0x29
    NestedClass = 0x29,
    /// Generic parameter definitions - 0x2A
    GenericParam = 0x2A,
    /// Instantiated generic methods - 0x2B
    MethodSpec = 0x2B,
    /// Constraints on generic parameters - 0x2C
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Builds the metadata token addressing `rid` within this table.
    #[must_use]
    pub fn token(self, rid: u32) -> Token {
        Token::new((u32::from(self as u8) << 24) | (rid & crate::metadata::token::RID_MAX))
    }

    /// The table name as it appears in the standard, for diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TableId::Module => "Module",
            TableId::TypeRef => "TypeRef",
            TableId::TypeDef => "TypeDef",
            TableId::FieldPtr => "FieldPtr",
            TableId::Field => "Field",
            TableId::MethodPtr => "MethodPtr",
            TableId::MethodDef => "Method",
            TableId::ParamPtr => "ParamPtr",
            TableId::Param => "Param",
            TableId::InterfaceImpl => "InterfaceImpl",
            TableId::MemberRef => "MemberRef",
            TableId::Constant => "Constant",
            TableId::CustomAttribute => "CustomAttribute",
            TableId::FieldMarshal => "FieldMarshal",
            TableId::DeclSecurity => "DeclSecurity",
            TableId::ClassLayout => "ClassLayout",
            TableId::FieldLayout => "FieldLayout",
            TableId::StandAloneSig => "StandAloneSig",
            TableId::EventMap => "EventMap",
            TableId::EventPtr => "EventPtr",
            TableId::Event => "Event",
            TableId::PropertyMap => "PropertyMap",
            TableId::PropertyPtr => "PropertyPtr",
            TableId::Property => "Property",
            TableId::MethodSemantics => "MethodSemantics",
            TableId::MethodImpl => "MethodImpl",
            TableId::ModuleRef => "ModuleRef",
            TableId::TypeSpec => "TypeSpec",
            TableId::ImplMap => "ImplMap",
            TableId::FieldRVA => "FieldRVA",
            TableId::EncLog => "ENCLog",
            TableId::EncMap => "ENCMap",
            TableId::Assembly => "Assembly",
            TableId::AssemblyProcessor => "AssemblyProcessor",
            TableId::AssemblyOS => "AssemblyOS",
            TableId::AssemblyRef => "AssemblyRef",
            TableId::AssemblyRefProcessor => "AssemblyRefProcessor",
            TableId::AssemblyRefOS => "AssemblyRefOS",
            TableId::File => "File",
            TableId::ExportedType => "ExportedType",
            TableId::ManifestResource => "ManifestResource",
            TableId::NestedClass => "NestedClass",
            TableId::GenericParam => "GenericParam",
            TableId::MethodSpec => "MethodSpec",
            TableId::GenericParamConstraint => "GenericParamConstraint",
        }
    }
}
