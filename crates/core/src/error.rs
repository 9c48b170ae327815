//! Error types for the folio object store.

use thiserror::Error;

/// Primary error type for reading and writing PDF object graphs.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(u32),

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("inconsistent xref: {0}")]
    InconsistentXref(String),

    #[error("circular reference detected for obj {0}")]
    CircularReference(u32),

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("malformed object {objid} at offset {offset}: {msg}")]
    MalformedObject {
        objid: u32,
        offset: usize,
        msg: String,
    },

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("page {requested} out of range (document has {count} pages)")]
    PageOutOfRange { requested: u32, count: u32 },

    #[error("writer misuse: {0}")]
    WriterMisuse(String),
}

impl PdfError {
    /// True for failures caused by a damaged or unsupported input rather than
    /// by a caller bug. Collaborators may skip the offending object and carry on.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::WriterMisuse(_) | Self::PageOutOfRange { .. } | Self::Io(_)
        )
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
