//! Byte-by-byte PDF construction for integration tests.
//!
//! Offsets are recorded as objects are appended, so every file built here
//! has an exact xref unless a test corrupts it on purpose.

#![allow(dead_code)]

use folio_core::model::{Dictionary, PDFObject};

enum Line {
    InUse { offset: usize, genno: u16 },
    Free { genno: u16 },
}

/// A PDF under construction, one revision at a time.
pub struct RawPdf {
    data: Vec<u8>,
    pending: Vec<(u32, Line)>,
    max_objid: u32,
    last_xref: Option<usize>,
}

impl RawPdf {
    pub fn new() -> Self {
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            data,
            pending: Vec::new(),
            max_objid: 0,
            last_xref: None,
        }
    }

    /// Append `N 0 obj <body> endobj`.
    pub fn object(&mut self, objid: u32, body: &str) -> &mut Self {
        self.raw_object(objid, 0, body.as_bytes())
    }

    pub fn raw_object(&mut self, objid: u32, genno: u16, body: &[u8]) -> &mut Self {
        let offset = self.data.len();
        self.data
            .extend_from_slice(format!("{objid} {genno} obj\n").as_bytes());
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendobj\n");
        self.pending.push((objid, Line::InUse { offset, genno }));
        self.max_objid = self.max_objid.max(objid);
        self
    }

    /// A stream object whose `/Length` is `declared` rather than the
    /// real size of `content`.
    pub fn stream_object(&mut self, objid: u32, dict_extra: &str, content: &[u8], declared: usize) -> &mut Self {
        let mut body = format!("<< /Length {declared} {dict_extra} >>\nstream\n").into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\nendstream");
        self.raw_object(objid, 0, &body)
    }

    /// Mark `objid` free in the next xref section.
    pub fn free(&mut self, objid: u32, genno: u16) -> &mut Self {
        self.pending.push((objid, Line::Free { genno }));
        self.max_objid = self.max_objid.max(objid);
        self
    }

    /// Offset at which the next bytes will land.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Close the current revision with a classic xref section covering
    /// the objects added since the previous one. Returns its offset.
    pub fn xref(&mut self, trailer_extra: &str) -> usize {
        let xref_pos = self.data.len();
        let mut lines = std::mem::take(&mut self.pending);
        lines.sort_by_key(|(id, _)| *id);

        let mut out = String::from("xref\n");
        if self.last_xref.is_none() {
            out.push_str("0 1\n0000000000 65535 f \n");
        }
        for (objid, line) in lines {
            out.push_str(&format!("{objid} 1\n"));
            match line {
                Line::InUse { offset, genno } => {
                    out.push_str(&format!("{offset:010} {genno:05} n \n"));
                }
                Line::Free { genno } => out.push_str(&format!("{:010} {genno:05} f \n", 0)),
            }
        }
        out.push_str(&format!("trailer\n<< /Size {} {trailer_extra}", self.max_objid + 1));
        if let Some(prev) = self.last_xref {
            out.push_str(&format!(" /Prev {prev}"));
        }
        out.push_str(&format!(" >>\nstartxref\n{xref_pos}\n%%EOF\n"));
        self.data.extend_from_slice(out.as_bytes());
        self.last_xref = Some(xref_pos);
        xref_pos
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Catalog at 1, page tree at 2, `count` pages from 3 with one shared
/// `/Resources` dictionary at `3 + count`.
pub fn pages_pdf(count: u32) -> Vec<u8> {
    let resources = 3 + count;
    let kids: Vec<String> = (0..count).map(|i| format!("{} 0 R", 3 + i)).collect();
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {count} /MediaBox [0 0 612 792] >>",
            kids.join(" ")
        ),
    );
    for i in 0..count {
        pdf.object(
            3 + i,
            &format!("<< /Type /Page /Parent 2 0 R /Resources {resources} 0 R >>"),
        );
    }
    pdf.object(resources, "<< /Font << /F1 << /Type /Font >> >> >>");
    pdf.xref("/Root 1 0 R");
    pdf.into_bytes()
}

/// Dictionary from `(key, value)` pairs.
pub fn dict<const N: usize>(entries: [(&str, PDFObject); N]) -> Dictionary {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
