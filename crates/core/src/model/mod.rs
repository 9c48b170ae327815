//! PDF object model.
//!
//! - `objects`: the tagged object value and its parts (PDFObject)

pub mod objects;

pub use objects::{Dictionary, PDFObjRef, PDFObject, PDFStream, PdfString, StringFormat};
