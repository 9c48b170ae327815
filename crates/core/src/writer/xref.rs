//! Cross-reference output.
//!
//! Entries arrive as a sorted map of [`XRefEntry`], the same type the
//! reader merges, and leave either as fixed 20-byte table lines or as a
//! compressed `/Type /XRef` stream.

use crate::codec::flate::flateencode;
use crate::codec::predictor::{PngFilter, PredictorParams, png_encode};
use crate::document::xref::XRefEntry;
use crate::error::Result;
use crate::model::{Dictionary, PDFObject, PDFStream};
use crate::writer::serialize::write_object;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Largest offset a legacy table line can hold.
pub const MAX_TABLE_OFFSET: u64 = 9_999_999_999;

/// Generation of the free-list head, object 0.
pub const FREE_HEAD_GENNO: u16 = 65535;

/// Put object 0 at the head of the free list and chain every free entry
/// to the next higher free number, the last one back to 0.
pub fn link_free_list(entries: &mut BTreeMap<u32, XRefEntry>) {
    let free: Vec<u32> = entries
        .iter()
        .filter(|&(&id, e)| id != 0 && e.is_free())
        .map(|(&id, _)| id)
        .collect();
    entries.insert(
        0,
        XRefEntry::Free {
            next: free.first().copied().unwrap_or(0),
            genno: FREE_HEAD_GENNO,
        },
    );
    for (i, id) in free.iter().enumerate() {
        if let Some(XRefEntry::Free { next, .. }) = entries.get_mut(id) {
            *next = free.get(i + 1).copied().unwrap_or(0);
        }
    }
}

/// Runs of consecutive object numbers as `(start, count)`.
pub fn subsections(ids: impl IntoIterator<Item = u32>) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for id in ids {
        match runs.last_mut() {
            Some((start, count)) if *start + *count == id => *count += 1,
            _ => runs.push((id, 1)),
        }
    }
    runs
}

/// Legacy form needs every entry to fit a table line.
pub fn fits_table(entries: &BTreeMap<u32, XRefEntry>) -> bool {
    entries.values().all(|e| match e {
        XRefEntry::InFile { offset, .. } => *offset as u64 <= MAX_TABLE_OFFSET,
        XRefEntry::Free { .. } => true,
        XRefEntry::InObjStm { .. } => false,
    })
}

/// `xref` keyword, subsections and the `trailer` dictionary.
pub fn write_table<W: Write>(
    out: &mut W,
    entries: &BTreeMap<u32, XRefEntry>,
    trailer: &Dictionary,
) -> io::Result<()> {
    out.write_all(b"xref\n")?;
    for (start, count) in subsections(entries.keys().copied()) {
        writeln!(out, "{start} {count}")?;
        for id in start..start + count {
            match entries.get(&id) {
                Some(XRefEntry::InFile { offset, genno }) => {
                    write!(out, "{offset:010} {genno:05} n \n")?;
                }
                Some(XRefEntry::Free { next, genno }) => {
                    write!(out, "{next:010} {genno:05} f \n")?;
                }
                // callers check `fits_table` first
                Some(XRefEntry::InObjStm { .. }) | None => {
                    write!(out, "{:010} {:05} f \n", 0, 0)?;
                }
            }
        }
    }
    out.write_all(b"trailer\n")?;
    write_object(out, &PDFObject::Dict(trailer.clone()))?;
    out.write_all(b"\n")
}

/// Bytes needed to store `value` big-endian, at least one.
pub const fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    if bits == 0 { 1 } else { bits.div_ceil(8) }
}

fn entry_fields(entry: &XRefEntry) -> (u8, u64, u64) {
    match *entry {
        XRefEntry::Free { next, genno } => (0, u64::from(next), u64::from(genno)),
        XRefEntry::InFile { offset, genno } => (1, offset as u64, u64::from(genno)),
        XRefEntry::InObjStm { container, index } => (2, u64::from(container), index as u64),
    }
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

/// Build the xref stream. `trailer` keys are carried into its dictionary;
/// the stream's own entry must already be in `entries`.
pub fn build_stream(entries: &BTreeMap<u32, XRefEntry>, trailer: Dictionary) -> Result<PDFStream> {
    let fields: Vec<(u8, u64, u64)> = entries.values().map(entry_fields).collect();
    let w1 = bytes_needed(fields.iter().map(|f| f.1).max().unwrap_or(0));
    let w2 = bytes_needed(fields.iter().map(|f| f.2).max().unwrap_or(0));
    let row = 1 + w1 + w2;

    let mut rows = Vec::with_capacity(fields.len() * row);
    for (kind, f1, f2) in fields {
        rows.push(kind);
        push_be(&mut rows, f1, w1);
        push_be(&mut rows, f2, w2);
    }
    let encoded = flateencode(&png_encode(&rows, row, 1, PngFilter::Up))?;

    let index: Vec<PDFObject> = subsections(entries.keys().copied())
        .into_iter()
        .flat_map(|(start, count)| [PDFObject::Int(start.into()), PDFObject::Int(count.into())])
        .collect();

    let mut attrs = trailer;
    attrs.insert("Type".into(), PDFObject::name("XRef"));
    attrs.insert(
        "W".into(),
        PDFObject::Array(vec![
            PDFObject::Int(1),
            PDFObject::Int(w1 as i64),
            PDFObject::Int(w2 as i64),
        ]),
    );
    attrs.insert("Index".into(), PDFObject::Array(index));
    attrs.insert("Filter".into(), PDFObject::name("FlateDecode"));
    attrs.insert(
        "DecodeParms".into(),
        PDFObject::Dict(PredictorParams::png_up(row).to_dict()),
    );
    Ok(PDFStream::with_data(attrs, encoded))
}

/// `startxref` and the end-of-file marker.
pub fn write_startxref<W: Write>(out: &mut W, offset: usize) -> io::Result<()> {
    write!(out, "startxref\n{offset}\n%%EOF\n")
}
