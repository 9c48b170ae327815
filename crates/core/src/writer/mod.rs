//! PDF writing: body, cross-reference output and incremental updates.
//!
//! - `serialize`: object syntax output
//! - `body`: object-number allocation and body output (PdfWriter)
//! - `xref`: legacy table and compressed xref-stream output
//! - `file_id`: trailer `/ID` generation
//! - `pages`: page tree with forward-declared pages (PageTreeWriter)
//! - `incremental`: append-mode revisions (IncrementalUpdate)

pub mod body;
pub mod file_id;
pub mod incremental;
pub mod pages;
pub mod serialize;
pub mod xref;

pub use body::PdfWriter;
pub use file_id::FileIdGenerator;
pub use incremental::IncrementalUpdate;
pub use pages::PageTreeWriter;
pub use serialize::{to_bytes, write_object};

use crate::model::{Dictionary, PDFObjRef};

/// Objects buffered before an object stream is written out.
pub const DEFAULT_OBJECT_STREAM_CAPACITY: usize = 200;

/// Options for [`PdfWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Header version. Raised to 1.5 when `compress_xref` is set.
    pub version: (u8, u8),
    /// Write an xref stream and pack small objects into object streams.
    pub compress_xref: bool,
    pub object_stream_capacity: usize,
    /// Flate-encode streams that carry no `/Filter`.
    pub compress_streams: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            version: (1, 7),
            compress_xref: false,
            object_stream_capacity: DEFAULT_OBJECT_STREAM_CAPACITY,
            compress_streams: false,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub const fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = (major, minor);
        self
    }

    #[must_use]
    pub const fn compress_xref(mut self, compress: bool) -> Self {
        self.compress_xref = compress;
        self
    }

    #[must_use]
    pub const fn with_object_stream_capacity(mut self, capacity: usize) -> Self {
        self.object_stream_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn compress_streams(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }

    /// Version actually written in the header.
    pub fn effective_version(&self) -> (u8, u8) {
        if self.compress_xref {
            self.version.max((1, 5))
        } else {
            self.version
        }
    }
}

/// What the trailer says beyond the bookkeeping keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailerInfo {
    pub root: PDFObjRef,
    pub info: Option<PDFObjRef>,
    /// Extra trailer keys. `Size`, `Prev`, `ID` and the xref stream keys
    /// are always computed and override anything here.
    pub extra: Dictionary,
}

impl TrailerInfo {
    pub fn new(root: PDFObjRef) -> Self {
        Self {
            root,
            info: None,
            extra: Dictionary::new(),
        }
    }

    #[must_use]
    pub const fn with_info(mut self, info: PDFObjRef) -> Self {
        self.info = Some(info);
        self
    }
}
