//! Page tree output with pages declared up front.
//!
//! Content written before a page exists (links, outlines) can point at
//! `page_reference(n)` because every page number is reserved when the
//! tree is created.

use super::body::PdfWriter;
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject};
use std::io::Write;

/// Flat `/Pages` node over a fixed number of pages.
#[derive(Debug, Clone)]
pub struct PageTreeWriter {
    root: PDFObjRef,
    pages: Vec<PDFObjRef>,
    written: Vec<bool>,
}

impl PageTreeWriter {
    /// Reserve the root node and `count` pages.
    pub fn new<W: Write>(writer: &mut PdfWriter<W>, count: u32) -> Result<Self> {
        let root = writer.reserve()?;
        let pages = (0..count)
            .map(|_| writer.reserve())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root,
            written: vec![false; pages.len()],
            pages,
        })
    }

    /// Reference of the `/Pages` node.
    pub const fn root(&self) -> PDFObjRef {
        self.root
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Reference of page `number` (1-indexed).
    pub fn page_reference(&self, number: u32) -> Result<PDFObjRef> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                requested: number,
                count: self.page_count(),
            })
    }

    /// Write page `number`. `/Type` and `/Parent` are filled in.
    pub fn add_page<W: Write>(
        &mut self,
        writer: &mut PdfWriter<W>,
        number: u32,
        mut page: Dictionary,
    ) -> Result<PDFObjRef> {
        let r = self.page_reference(number)?;
        let slot = (number - 1) as usize;
        if self.written[slot] {
            return Err(PdfError::WriterMisuse(format!("page {number} written twice")));
        }
        page.insert("Type".into(), PDFObject::name("Page"));
        page.insert("Parent".into(), PDFObject::Ref(self.root));
        writer.add_object_at(page, r)?;
        self.written[slot] = true;
        Ok(r)
    }

    /// Write the `/Pages` node. `attrs` holds what pages inherit, such as
    /// `/MediaBox` or `/Resources`.
    pub fn finish<W: Write>(self, writer: &mut PdfWriter<W>, attrs: Dictionary) -> Result<PDFObjRef> {
        if let Some(missing) = self.written.iter().position(|w| !w) {
            return Err(PdfError::WriterMisuse(format!(
                "page {} declared but never written",
                missing + 1
            )));
        }
        let mut node = attrs;
        node.insert("Type".into(), PDFObject::name("Pages"));
        node.insert(
            "Kids".into(),
            PDFObject::Array(self.pages.iter().copied().map(PDFObject::Ref).collect()),
        );
        node.insert("Count".into(), PDFObject::Int(self.pages.len() as i64));
        writer.add_object_at(node, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WriteOptions;

    #[test]
    fn page_reference_bounds() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let tree = PageTreeWriter::new(&mut writer, 2).unwrap();
        assert_eq!(tree.root().objid, 1);
        assert_eq!(tree.page_reference(1).unwrap().objid, 2);
        assert_eq!(tree.page_reference(2).unwrap().objid, 3);
        assert!(matches!(
            tree.page_reference(3),
            Err(PdfError::PageOutOfRange { requested: 3, count: 2 })
        ));
        assert!(matches!(
            tree.page_reference(0),
            Err(PdfError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn finish_requires_every_page() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let mut tree = PageTreeWriter::new(&mut writer, 2).unwrap();
        tree.add_page(&mut writer, 1, Dictionary::new()).unwrap();
        assert!(matches!(
            tree.finish(&mut writer, Dictionary::new()),
            Err(PdfError::WriterMisuse(_))
        ));
    }
}
