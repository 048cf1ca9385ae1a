//! CLI metadata parsing: root, streams, tables and the derived queries.
//!
//! The layering mirrors the on-disk format. [`root`] parses the `BSJB`
//! header and stream directory; [`streams`] decodes the individual
//! streams (four heaps and the tables stream); [`tables`] owns the
//! variable-width schema machinery; [`reader`] wires everything together
//! and adds the queries that span streams (rid lists, reverse owner
//! maps, keyed lookups). [`document`] bundles a reader with an owned
//! buffer for standalone use.

pub mod document;
pub mod reader;
pub mod root;
pub mod streams;
pub mod tables;
pub mod token;
