//! PDF Document module - reading side of the object store.
//!
//! This module contains:
//! - `catalog` - the document facade: xref loading, object resolution (PDFDocument)
//! - `xref` - xref sections, revision merging, damaged-file scanning
//! - `objstm` - compressed object streams, reading and building
//! - `extent` - where a stream's data really ends
//! - `store` - the materialized-object cache
//! - `page` - page-tree lookups with inheritance
//! - `options` - read-time tuning

pub mod catalog;
pub mod extent;
pub mod objstm;
pub mod options;
pub mod page;
pub mod store;
pub mod xref;

pub use catalog::PDFDocument;
pub use extent::{StreamExtent, resolve_extent};
pub use objstm::{ObjectStream, ObjectStreamBuilder};
pub use options::{ExtentOptions, ReadOptions};
pub use page::{INHERITABLE, PageLookup};
pub use store::ObjectCache;
pub use xref::{RevisionInfo, XRefEntry, XRefKind, XRefSection, XRefTable};
