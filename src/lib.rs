// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dotmeta
//!
//! A low-level, bit-exact reader and writer for the CLI (ECMA-335) binary
//! metadata format and CIL method bodies, in pure Rust.
//!
//! `dotmeta` is the layer below an object model: it turns the raw
//! `.cormeta` byte range of a managed executable into addressable
//! metadata tables, heaps and decoded method bodies - and back. It does
//! not parse PE containers, resolve assemblies or verify CIL; it decodes
//! and encodes the formats, exactly.
//!
//! ## What it covers
//!
//! - **Metadata root and streams** - the `BSJB` header, stream directory,
//!   `#Strings`/`#US`/`#GUID`/`#Blob` heaps
//! - **The tables stream** - all 45 table kinds with per-file column
//!   width resolution, both the `#~` and the edit-and-continue `#-`
//!   layout (pointer-table indirection, logically deleted rows)
//! - **Coded indices** - every category, encode and decode
//! - **Derived queries** - parent→child rid lists, child→owner reverse
//!   maps, keyed lookups with a defensive linear fallback
//! - **CIL method bodies** - tiny/fat headers, the full opcode space,
//!   branch resolution into an instruction arena, small/fat exception
//!   clauses, the encoder, and macro simplify/optimize transforms
//!
//! Corrupt input is a first-class use case: structural damage fails
//! loudly with source-located errors, local damage (an unknown opcode, a
//! branch to nowhere, an ill-formed exception clause) degrades to
//! sentinel values so the rest of the file keeps loading.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotmeta::prelude::*;
//!
//! let document = MetadataDocument::from_file("extracted.cormeta".as_ref())?;
//! let metadata = document.metadata();
//!
//! println!("metadata version {}", metadata.root().version);
//! for table_id in metadata.tables().present_tables() {
//!     println!("{:10} rows in {}", metadata.tables().row_count(table_id), table_id.name());
//! }
//! # Ok::<(), dotmeta::Error>(())
//! ```
//!
//! Decoding a method body takes the code bytes (located through the
//! `MethodDef` RVA by the PE collaborator) and an optional locals
//! resolver:
//!
//! ```rust
//! use dotmeta::cil::{BodyReader, NoLocals};
//!
//! let body = BodyReader::new().read(&[0x0A, 0x00, 0x2A], None, &NoLocals)?;
//! assert_eq!(body.instructions.len(), 2);
//! # Ok::<(), dotmeta::Error>(())
//! ```

#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

pub mod cil;
pub mod file;
pub mod metadata;

/// Convenient re-exports of the most commonly used types.
pub mod prelude {
    pub use crate::cil::{
        BodyReader, BodyWriter, Instruction, LocalsResolver, MethodBody, NoLocals, Operand, Target,
    };
    pub use crate::metadata::{
        document::MetadataDocument,
        reader::CilMetadata,
        tables::{CodedIndexKind, RidList, TableId},
        token::Token,
    };
    pub use crate::{Error, Result};
}

pub use error::Error;
pub use file::parser::Parser;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
