//! folio - indirect object store and cross-reference engine for PDF files.
//!
//! Reading resolves objects lazily through merged xref revisions;
//! writing allocates object numbers, emits legacy or compressed xref
//! sections and appends incremental revisions.

pub mod codec;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;
pub mod writer;

pub use document::{PDFDocument, ReadOptions};
pub use error::{PdfError, Result};
pub use model::{Dictionary, PDFObjRef, PDFObject, PDFStream, PdfString};
pub use writer::{IncrementalUpdate, PageTreeWriter, PdfWriter, TrailerInfo, WriteOptions};
