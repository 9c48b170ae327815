//! PDF object types.
//!
//! Every value read from or written to a file is a [`PDFObject`]. Indirect
//! references are plain `(objid, genno)` pairs; resolving them is the job of
//! the owning [`PDFDocument`](crate::document::PDFDocument), which keeps the
//! object graph in an arena keyed by object number. Cycles (page <-> parent)
//! therefore never become owning cycles.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use indexmap::IndexMap;

/// Dictionary storage. Insertion order is kept so that serialized output is
/// deterministic and matches the order keys were read or set in.
pub type Dictionary = IndexMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(String),
    /// String (byte array plus its source notation)
    String(PdfString),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(Dictionary),
    /// Stream (dictionary + binary data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    /// Build a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Build a literal string object.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::String(PdfString::literal(bytes))
    }

    /// Build a hex string object.
    pub fn hex_string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::String(PdfString::hex(bytes))
    }

    /// Build an indirect reference.
    pub const fn reference(objid: u32, genno: u16) -> Self {
        Self::Ref(PDFObjRef::new(objid, genno))
    }

    /// Check if this is a null object
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(PdfError::TypeError {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    /// Get as integer
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "int",
                got: self.type_name(),
            }),
        }
    }

    /// Get as a non-negative integer that fits `usize`.
    pub fn as_usize(&self) -> Result<usize> {
        let n = self.as_int()?;
        usize::try_from(n).map_err(|_| PdfError::TypeError {
            expected: "non-negative int",
            got: "negative int",
        })
    }

    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name string
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as byte string
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(&s.bytes),
            _ => Err(PdfError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Get as array
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(PdfError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary. A stream answers with its attribute dictionary.
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(PdfError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as mutable dictionary.
    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&mut s.attrs),
            _ => Err(PdfError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    /// Get as object reference
    pub const fn as_ref(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(PdfError::TypeError {
                expected: "ref",
                got: self.type_name(),
            }),
        }
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }

    /// Visit every indirect reference held directly by this value (nested
    /// arrays and dictionaries included, referenced objects not followed).
    pub fn for_each_ref(&self, f: &mut impl FnMut(PDFObjRef)) {
        match self {
            Self::Ref(r) => f(*r),
            Self::Array(arr) => arr.iter().for_each(|item| item.for_each_ref(f)),
            Self::Dict(dict) => dict.values().for_each(|item| item.for_each_ref(f)),
            Self::Stream(stream) => stream.attrs.values().for_each(|item| item.for_each_ref(f)),
            _ => {}
        }
    }
}

impl From<bool> for PDFObject {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PDFObject {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PDFObject {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<PDFObjRef> for PDFObject {
    fn from(value: PDFObjRef) -> Self {
        Self::Ref(value)
    }
}

impl From<Dictionary> for PDFObject {
    fn from(value: Dictionary) -> Self {
        Self::Dict(value)
    }
}

impl From<Vec<PDFObject>> for PDFObject {
    fn from(value: Vec<PDFObject>) -> Self {
        Self::Array(value)
    }
}

impl From<PDFStream> for PDFObject {
    fn from(value: PDFStream) -> Self {
        Self::Stream(Box::new(value))
    }
}

/// Source notation of a string object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `( ... )`
    #[default]
    Literal,
    /// `< ... >`
    Hex,
}

/// A PDF string: raw bytes plus the notation it was written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    pub bytes: Vec<u8>,
    pub format: StringFormat,
}

impl PdfString {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Hex,
        }
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PDFObjRef {
    /// Object ID
    pub objid: u32,
    /// Generation number
    pub genno: u16,
}

impl PDFObjRef {
    /// Create a new object reference.
    pub const fn new(objid: u32, genno: u16) -> Self {
        Self { objid, genno }
    }
}

impl std::fmt::Display for PDFObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// PDF Stream - dictionary attributes + binary data.
#[derive(Debug, Clone)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: Dictionary,
    /// Raw (possibly encoded) data
    rawdata: Bytes,
    /// Object ID (set when stream is part of document)
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u16>,
}

/// Streams compare by content; the identity a reader stamped on them is
/// bookkeeping, not structure.
impl PartialEq for PDFStream {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs && self.rawdata == other.rawdata
    }
}

impl PDFStream {
    /// Create a new stream. `attrs` is taken as-is.
    pub fn new(attrs: Dictionary, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
            genno: None,
        }
    }

    /// Create a stream whose `/Length` matches `rawdata`.
    pub fn with_data(mut attrs: Dictionary, rawdata: impl Into<Bytes>) -> Self {
        let rawdata = rawdata.into();
        attrs.insert("Length".into(), PDFObject::Int(rawdata.len() as i64));
        Self::new(attrs, rawdata)
    }

    /// Set object ID and generation number.
    pub const fn set_objid(&mut self, objid: u32, genno: u16) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Get raw (undecoded) data.
    pub fn get_rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Get raw data as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    /// Replace the raw data and keep `/Length` in sync.
    pub fn set_rawdata(&mut self, data: impl Into<Bytes>) {
        self.rawdata = data.into();
        self.attrs
            .insert("Length".into(), PDFObject::Int(self.rawdata.len() as i64));
    }

    /// Check if stream contains a key.
    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// Get attribute, trying multiple names.
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }

    /// True when the dictionary carries a `/Filter` entry.
    pub fn has_filters(&self) -> bool {
        self.attrs.get("Filter").is_some_and(|f| !f.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_equality_ignores_identity() {
        let mut a = PDFStream::with_data(Dictionary::new(), &b"abc"[..]);
        let b = PDFStream::with_data(Dictionary::new(), &b"abc"[..]);
        a.set_objid(4, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn for_each_ref_walks_nested_values() {
        let mut inner = Dictionary::new();
        inner.insert("F1".into(), PDFObject::reference(7, 0));
        let obj = PDFObject::Array(vec![
            PDFObject::reference(3, 0),
            PDFObject::Dict(inner),
            PDFObject::Int(1),
        ]);
        let mut seen = Vec::new();
        obj.for_each_ref(&mut |r| seen.push(r.objid));
        assert_eq!(seen, vec![3, 7]);
    }

    #[test]
    fn as_usize_rejects_negative() {
        assert!(PDFObject::Int(-1).as_usize().is_err());
        assert_eq!(PDFObject::Int(12).as_usize().unwrap(), 12);
    }
}
