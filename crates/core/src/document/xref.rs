//! Cross-reference tables.
//!
//! Classic `xref` sections and xref streams both decode into
//! [`XRefSection`]s holding one [`XRefEntry`] per object number. Sections
//! are merged newest first into an [`XRefTable`]; the first entry seen for
//! a number wins, free entries included.

use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObject};
use crate::parser::lexer::{Keyword, Lexer, Token};
use crate::parser::pdf_parser::PDFParser;
use rustc_hash::FxHashMap;

/// Location of one object number in one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Deleted. `next` links the free list.
    Free { next: u32, genno: u16 },
    /// Stored at a byte offset in the file.
    InFile { offset: usize, genno: u16 },
    /// Packed inside an object stream. Generation is always 0.
    InObjStm { container: u32, index: usize },
}

impl XRefEntry {
    pub const fn genno(&self) -> u16 {
        match self {
            Self::Free { genno, .. } | Self::InFile { genno, .. } => *genno,
            Self::InObjStm { .. } => 0,
        }
    }

    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free { .. })
    }
}

/// How a section was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    Table,
    Stream,
    /// Classic table plus an `/XRefStm` stream for the same revision.
    Hybrid,
    /// Reconstructed by scanning the file for object headers.
    Fallback,
}

/// One revision's cross-reference data.
#[derive(Debug, Clone)]
pub struct XRefSection {
    /// Where the section starts (`xref` keyword or xref stream object).
    pub offset: usize,
    pub kind: XRefKind,
    pub entries: FxHashMap<u32, XRefEntry>,
    pub trailer: Dictionary,
}

impl XRefSection {
    pub fn new(offset: usize, kind: XRefKind) -> Self {
        Self {
            offset,
            kind,
            entries: FxHashMap::default(),
            trailer: Dictionary::new(),
        }
    }

    /// `/Prev` offset, if present and sane.
    pub fn prev(&self) -> Option<usize> {
        self.trailer.get("Prev").and_then(|p| p.as_usize().ok())
    }

    /// `/XRefStm` offset of a hybrid file.
    pub fn xref_stm(&self) -> Option<usize> {
        self.trailer.get("XRefStm").and_then(|p| p.as_usize().ok())
    }

    /// Lay `newer` over this section: its entries replace ours.
    pub fn overlay(&mut self, newer: Self) {
        self.entries.extend(newer.entries);
        self.trailer = newer.trailer;
        self.offset = newer.offset;
        self.kind = XRefKind::Hybrid;
    }
}

/// Summary of one merged section, newest first.
#[derive(Debug, Clone)]
pub struct RevisionInfo {
    pub offset: usize,
    pub kind: XRefKind,
    pub trailer: Dictionary,
}

/// All revisions merged into one lookup table.
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: FxHashMap<u32, XRefEntry>,
    revisions: Vec<RevisionInfo>,
}

impl XRefTable {
    /// Merge a section older than everything merged so far.
    pub fn merge_older(&mut self, section: XRefSection) {
        for (objid, entry) in section.entries {
            self.entries.entry(objid).or_insert(entry);
        }
        self.revisions.push(RevisionInfo {
            offset: section.offset,
            kind: section.kind,
            trailer: section.trailer,
        });
    }

    /// Entry for `objid` in the merged view, free entries included.
    pub fn get(&self, objid: u32) -> Option<&XRefEntry> {
        self.entries.get(&objid)
    }

    /// Live (non-free) object numbers, sorted.
    pub fn objids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_free())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn max_objid(&self) -> Option<u32> {
        self.entries.keys().copied().max()
    }

    pub fn revisions(&self) -> &[RevisionInfo] {
        &self.revisions
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set `key` in the newest revision's trailer.
    pub fn set_trailer_key(&mut self, key: &str, value: PDFObject) {
        if let Some(newest) = self.revisions.first_mut() {
            newest.trailer.insert(key.to_string(), value);
        }
    }

    /// Merged trailer: newest value for each key.
    pub fn trailer(&self) -> Dictionary {
        let mut merged = Dictionary::new();
        for rev in &self.revisions {
            for (key, value) in &rev.trailer {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

/// Offset named by the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let needle = b"startxref";
    let pos = data
        .windows(needle.len())
        .rposition(|w| w == needle)
        .ok_or(PdfError::NoValidXRef)?;
    let mut lexer = Lexer::at(data, pos + needle.len());
    match lexer.next_token() {
        Some(Ok((_, Token::Int(n)))) => usize::try_from(n).map_err(|_| PdfError::NoValidXRef),
        _ => Err(PdfError::NoValidXRef),
    }
}

/// Parse a classic `xref` section and its trailer at `pos`.
pub fn parse_classic_section(data: &[u8], pos: usize) -> Result<XRefSection> {
    let mut lexer = Lexer::at(data, pos);
    match lexer.expect_token()? {
        Token::Keyword(Keyword::Xref) => {}
        _ => {
            return Err(PdfError::InconsistentXref(format!(
                "no 'xref' keyword at {pos}"
            )));
        }
    }

    let mut section = XRefSection::new(pos, XRefKind::Table);
    let mut first_subsection = true;
    loop {
        let (token_pos, token) = lexer.next_token().ok_or(PdfError::UnexpectedEof)??;
        let start = match token {
            Token::Keyword(Keyword::Trailer) => break,
            Token::Int(n) => n,
            _ => {
                return Err(PdfError::SyntaxError(format!(
                    "bad xref subsection header at {token_pos}"
                )));
            }
        };
        let count = match lexer.expect_token()? {
            Token::Int(n) => n,
            _ => {
                return Err(PdfError::SyntaxError(format!(
                    "bad xref subsection count at {token_pos}"
                )));
            }
        };
        let (Ok(mut base), Ok(count)) = (u32::try_from(start), u32::try_from(count)) else {
            return Err(PdfError::SyntaxError(format!(
                "negative xref subsection at {token_pos}"
            )));
        };

        for i in 0..count {
            let (offset, genno, kind) = read_entry_line(&mut lexer)?;
            // Producers that number the first subsection from 1 but still
            // list the object-0 free head are off by one.
            if first_subsection && i == 0 && base == 1 && kind == b'f' && genno == 65535 {
                base = 0;
            }
            let Some(objid) = base.checked_add(i) else {
                continue;
            };
            let entry = match kind {
                b'n' if offset == 0 => {
                    tracing::debug!(objid, "in-use xref entry at offset 0 ignored");
                    continue;
                }
                b'n' => XRefEntry::InFile { offset, genno },
                _ => XRefEntry::Free {
                    next: u32::try_from(offset).unwrap_or(0),
                    genno,
                },
            };
            section.entries.insert(objid, entry);
        }
        first_subsection = false;
    }

    let trailer = PDFParser::at(data, lexer.tell()).parse_object()?;
    section.trailer = match trailer {
        PDFObject::Dict(dict) => dict,
        other => {
            return Err(PdfError::TypeError {
                expected: "trailer dict",
                got: other.type_name(),
            });
        }
    };
    Ok(section)
}

/// `offset generation n|f`, tolerating sloppy spacing.
fn read_entry_line(lexer: &mut Lexer<'_>) -> Result<(usize, u16, u8)> {
    let at = lexer.tell();
    let bad = || PdfError::SyntaxError(format!("malformed xref entry at {at}"));
    let offset = match lexer.expect_token()? {
        Token::Int(n) => usize::try_from(n).map_err(|_| bad())?,
        _ => return Err(bad()),
    };
    let genno = match lexer.expect_token()? {
        Token::Int(n) => u16::try_from(n).map_err(|_| bad())?,
        _ => return Err(bad()),
    };
    match lexer.expect_token()? {
        Token::Keyword(Keyword::Unknown(kw)) if kw == b"n" || kw == b"f" => {
            Ok((offset, genno, kw[0]))
        }
        _ => Err(bad()),
    }
}

/// Field widths and subsections of an xref stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefStreamLayout {
    pub widths: [usize; 3],
    pub index: Vec<(u32, u32)>,
}

impl XRefStreamLayout {
    /// Read `/W`, `/Index` and `/Size` from the stream dictionary.
    pub fn from_dict(attrs: &Dictionary) -> Result<Self> {
        let w = attrs
            .get("W")
            .ok_or_else(|| PdfError::SyntaxError("missing W in xref stream".into()))?
            .as_array()?;
        let [w0, w1, w2] = w.as_slice() else {
            return Err(PdfError::SyntaxError("W must have 3 elements".into()));
        };
        let widths = [w0.as_usize()?, w1.as_usize()?, w2.as_usize()?];
        if widths.iter().any(|&w| w > 8) {
            return Err(PdfError::SyntaxError(format!(
                "xref stream field wider than 8 bytes: {widths:?}"
            )));
        }

        let index = match attrs.get("Index") {
            Some(idx) => idx
                .as_array()?
                .chunks_exact(2)
                .map(|pair| {
                    let start = u32::try_from(pair[0].as_int()?).map_err(|_| {
                        PdfError::SyntaxError("negative Index start in xref stream".into())
                    })?;
                    let count = u32::try_from(pair[1].as_int()?).map_err(|_| {
                        PdfError::SyntaxError("negative Index count in xref stream".into())
                    })?;
                    Ok((start, count))
                })
                .collect::<Result<Vec<_>>>()?,
            None => {
                let size = attrs
                    .get("Size")
                    .ok_or_else(|| PdfError::SyntaxError("missing Size in xref stream".into()))?
                    .as_int()?;
                vec![(0, u32::try_from(size).unwrap_or(0))]
            }
        };
        Ok(Self { widths, index })
    }

    const fn entry_size(&self) -> usize {
        self.widths[0] + self.widths[1] + self.widths[2]
    }
}

/// Big-endian unsigned integer of up to 8 bytes.
pub fn read_bytes_as_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |val, &b| (val << 8) | u64::from(b))
}

/// Decode the entries of an xref stream from its decoded data.
pub fn decode_stream_entries(
    decoded: &[u8],
    layout: &XRefStreamLayout,
) -> FxHashMap<u32, XRefEntry> {
    let [w0, w1, _] = layout.widths;
    let entry_size = layout.entry_size();
    let mut entries = FxHashMap::default();
    if entry_size == 0 {
        return entries;
    }
    let mut rows = decoded.chunks_exact(entry_size);

    for &(start, count) in &layout.index {
        for objid in start..start.saturating_add(count) {
            let Some(row) = rows.next() else {
                tracing::warn!(objid, "xref stream data ends before its Index does");
                return entries;
            };
            // type defaults to 1 when its width is 0
            let kind = if w0 == 0 { 1 } else { read_bytes_as_int(&row[..w0]) };
            let f2 = read_bytes_as_int(&row[w0..w0 + w1]);
            let f3 = read_bytes_as_int(&row[w0 + w1..]);
            let entry = match kind {
                0 => XRefEntry::Free {
                    next: u32::try_from(f2).unwrap_or(0),
                    genno: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                1 => XRefEntry::InFile {
                    offset: usize::try_from(f2).unwrap_or(usize::MAX),
                    genno: u16::try_from(f3).unwrap_or(0),
                },
                2 => XRefEntry::InObjStm {
                    container: u32::try_from(f2).unwrap_or(0),
                    index: usize::try_from(f3).unwrap_or(usize::MAX),
                },
                // unknown types are references to null
                _ => continue,
            };
            entries.insert(objid, entry);
        }
    }
    entries
}

/// Rebuild an xref by scanning for `N G obj` headers. Later definitions of
/// the same number win, as they would in an appended revision.
pub fn scan_objects(data: &[u8]) -> Result<XRefSection> {
    use regex::bytes::Regex;

    let re = Regex::new(r"(\d+)\s+(\d+)\s+obj\b")
        .map_err(|e| PdfError::SyntaxError(format!("object scan pattern: {e}")))?;
    let mut section = XRefSection::new(0, XRefKind::Fallback);

    for cap in re.captures_iter(data) {
        let (Some(whole), Some(id), Some(gen_)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        // "12 0 obj" inside "112 0 obj" is not a header
        if whole.start() > 0 && data[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        let parse = |bytes: &[u8]| std::str::from_utf8(bytes).ok()?.parse::<u64>().ok();
        let (Some(objid), Some(genno)) = (parse(id.as_bytes()), parse(gen_.as_bytes())) else {
            continue;
        };
        let (Ok(objid), Ok(genno)) = (u32::try_from(objid), u16::try_from(genno)) else {
            continue;
        };
        section.entries.insert(
            objid,
            XRefEntry::InFile {
                offset: whole.start(),
                genno,
            },
        );
    }

    if section.entries.is_empty() {
        return Err(PdfError::NoValidXRef);
    }
    section.trailer = find_last_trailer(data).unwrap_or_default();
    tracing::warn!(
        objects = section.entries.len(),
        "cross-reference rebuilt by scanning the file"
    );
    Ok(section)
}

/// The last parseable `trailer << ... >>` in the file.
fn find_last_trailer(data: &[u8]) -> Option<Dictionary> {
    let needle = b"trailer";
    let mut end = data.len();
    while let Some(pos) = data[..end].windows(needle.len()).rposition(|w| w == needle) {
        if let Ok(PDFObject::Dict(dict)) = PDFParser::at(data, pos + needle.len()).parse_object() {
            return Some(dict);
        }
        end = pos;
    }
    None
}
