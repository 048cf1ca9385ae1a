//! The metadata streams: heaps and the tables stream.
//!
//! A metadata root carries up to seven named streams. Four are
//! append-only heaps addressed by byte offset - [`Strings`],
//! [`UserStrings`], [`Guid`] and [`Blob`] - and one is the relational
//! [`TablesStream`] (`#~` or its edit-and-continue sibling `#-`). All of
//! them borrow from the metadata byte range; nothing is copied at load.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablestream;
mod userstrings;

pub use blob::{Blob, BlobIterator};
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablestream::{StreamVariant, TablesStream, TablesStreamFlags};
pub use userstrings::{UserStringIterator, UserStrings};
