//! PDF object syntax output.
//!
//! The inverse of the object parser: any value written here reads back
//! structurally equal, including the literal/hex notation of strings.

use crate::model::{Dictionary, PDFObjRef, PDFObject, PDFStream, PdfString, StringFormat};
use crate::parser::lexer::Lexer;
use std::borrow::Cow;
use std::io::{self, Write};

/// Serialize one value (no `obj`/`endobj` framing).
pub fn to_bytes(obj: &PDFObject) -> Vec<u8> {
    let mut out = Vec::new();
    // io::Write for Vec<u8> never returns an error
    if let Err(err) = write_object(&mut out, obj) {
        tracing::error!(error = %err, "serializing into memory failed");
    }
    out
}

/// Write one value in PDF syntax.
pub fn write_object<W: Write>(out: &mut W, obj: &PDFObject) -> io::Result<()> {
    match obj {
        PDFObject::Null => out.write_all(b"null"),
        PDFObject::Bool(true) => out.write_all(b"true"),
        PDFObject::Bool(false) => out.write_all(b"false"),
        PDFObject::Int(n) => write!(out, "{n}"),
        PDFObject::Real(r) => write_real(out, *r),
        PDFObject::Name(name) => write_name(out, name),
        PDFObject::String(s) => write_string(out, s),
        PDFObject::Ref(r) => write_ref(out, *r),
        PDFObject::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" ")?;
                }
                write_object(out, item)?;
            }
            out.write_all(b"]")
        }
        PDFObject::Dict(dict) => {
            out.write_all(b"<<")?;
            write_entries(out, dict, None)?;
            out.write_all(b">>")
        }
        PDFObject::Stream(stream) => write_stream(out, stream),
    }
}

/// Returns whether anything was written.
fn write_entries<W: Write>(out: &mut W, dict: &Dictionary, skip: Option<&str>) -> io::Result<bool> {
    let mut first = true;
    for (key, value) in dict {
        if skip == Some(key.as_str()) {
            continue;
        }
        if !first {
            out.write_all(b" ")?;
        }
        first = false;
        write_name(out, key)?;
        out.write_all(b" ")?;
        write_object(out, value)?;
    }
    Ok(!first)
}

/// `/Length` is always written direct and equal to the raw data size.
fn write_stream<W: Write>(out: &mut W, stream: &PDFStream) -> io::Result<()> {
    let data = stream.get_rawdata();
    out.write_all(b"<<")?;
    if write_entries(out, &stream.attrs, Some("Length"))? {
        out.write_all(b" ")?;
    }
    write!(out, "/Length {}>>\nstream\n", data.len())?;
    out.write_all(data)?;
    out.write_all(b"\nendstream")
}

fn write_ref<W: Write>(out: &mut W, r: PDFObjRef) -> io::Result<()> {
    write!(out, "{} {} R", r.objid, r.genno)
}

/// Shortest decimal that reads back as the same value. Non-finite values
/// have no PDF spelling and become 0.
fn write_real<W: Write>(out: &mut W, value: f64) -> io::Result<()> {
    if !value.is_finite() {
        return out.write_all(b"0");
    }
    let text = value.to_string();
    out.write_all(text.as_bytes())?;
    if !text.contains('.') {
        out.write_all(b".0")?;
    }
    Ok(())
}

/// Bytes outside the regular printable range become `#xx`.
fn write_name<W: Write>(out: &mut W, name: &str) -> io::Result<()> {
    out.write_all(b"/")?;
    for &b in name_bytes(name).iter() {
        write_name_byte(out, b)?;
    }
    Ok(())
}

/// One byte per char when every char fits in a byte, UTF-8 otherwise.
fn name_bytes(name: &str) -> Cow<'_, [u8]> {
    if name.is_ascii() {
        return Cow::Borrowed(name.as_bytes());
    }
    let latin1: Option<Vec<u8>> = name.chars().map(|ch| u8::try_from(u32::from(ch)).ok()).collect();
    match latin1 {
        Some(bytes) => Cow::Owned(bytes),
        None => Cow::Borrowed(name.as_bytes()),
    }
}

fn write_name_byte<W: Write>(out: &mut W, b: u8) -> io::Result<()> {
    if (0x21..=0x7e).contains(&b) && b != b'#' && !Lexer::is_delimiter(b) {
        out.write_all(&[b])
    } else {
        write!(out, "#{b:02X}")
    }
}

fn write_string<W: Write>(out: &mut W, s: &PdfString) -> io::Result<()> {
    match s.format {
        StringFormat::Hex => {
            out.write_all(b"<")?;
            for b in &s.bytes {
                write!(out, "{b:02X}")?;
            }
            out.write_all(b">")
        }
        StringFormat::Literal => {
            out.write_all(b"(")?;
            for &b in &s.bytes {
                match b {
                    b'(' | b')' | b'\\' => out.write_all(&[b'\\', b])?,
                    b'\n' => out.write_all(b"\\n")?,
                    b'\r' => out.write_all(b"\\r")?,
                    b'\t' => out.write_all(b"\\t")?,
                    0x08 => out.write_all(b"\\b")?,
                    0x0c => out.write_all(b"\\f")?,
                    _ => out.write_all(&[b])?,
                }
            }
            out.write_all(b")")
        }
    }
}

/// Write `N G obj ... endobj` around a value.
pub fn write_indirect<W: Write>(out: &mut W, r: PDFObjRef, obj: &PDFObject) -> io::Result<()> {
    writeln!(out, "{} {} obj", r.objid, r.genno)?;
    write_object(out, obj)?;
    out.write_all(b"\nendobj\n")
}
