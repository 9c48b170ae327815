//! Append-mode revisions.
//!
//! The original file is copied byte for byte, then only new, replaced,
//! marked and deleted objects follow, with a cross-reference section whose
//! `/Prev` points at the original one. Objects nobody touched keep their
//! numbers and offsets and are never re-read.

use super::body::{AppendBase, PdfWriter};
use super::{TrailerInfo, WriteOptions};
use crate::document::catalog::PDFDocument;
use crate::document::xref::XRefEntry;
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject};
use std::collections::BTreeSet;
use std::io::Write;

/// Trailer keys every revision recomputes.
const RECOMPUTED_KEYS: [&str; 6] = ["Size", "Prev", "Root", "Info", "ID", "XRefStm"];

/// One new revision of an existing document.
pub struct IncrementalUpdate<'d, W: Write> {
    doc: &'d PDFDocument,
    writer: PdfWriter<W>,
    /// Touched objects to copy forward at close.
    marked: BTreeSet<u32>,
    root: Option<PDFObjRef>,
    info: Option<PDFObjRef>,
}

impl<'d, W: Write> IncrementalUpdate<'d, W> {
    pub fn new(doc: &'d PDFDocument, out: W) -> Result<Self> {
        Self::with_options(doc, out, WriteOptions::default())
    }

    /// Copies the original to `out`. The header is not rewritten, so
    /// `options.version` has no effect here.
    pub fn with_options(doc: &'d PDFDocument, out: W, options: WriteOptions) -> Result<Self> {
        let prev = doc.startxref().ok_or(PdfError::NoValidXRef)?;
        let base = AppendBase {
            prev,
            size: doc.size(),
            first_id: doc.file_id().map(|[first, _]| first),
            stream_xref: doc.uses_xref_stream(),
        };
        let writer = PdfWriter::append(out, doc.bytes(), base, options)?;
        let info = doc
            .trailer()
            .get("Info")
            .and_then(|i| i.as_ref().ok().copied());
        tracing::debug!(prev, size = doc.size(), "incremental update started");
        Ok(Self {
            doc,
            writer,
            marked: BTreeSet::new(),
            root: doc.root(),
            info,
        })
    }

    pub const fn document(&self) -> &'d PDFDocument {
        self.doc
    }

    /// Current identity of a live object.
    fn live_ref(&self, objid: u32) -> Result<PDFObjRef> {
        match self.doc.xref_entry(objid) {
            Some(XRefEntry::InFile { genno, .. }) => Ok(PDFObjRef::new(objid, genno)),
            Some(XRefEntry::InObjStm { .. }) => Ok(PDFObjRef::new(objid, 0)),
            Some(XRefEntry::Free { .. }) | None => Err(PdfError::ObjectNotFound(objid)),
        }
    }

    /// Mark an existing object as touched: its current value is written
    /// into the new revision at close, under the same number and
    /// generation.
    pub fn mark(&mut self, objid: u32) -> Result<()> {
        self.live_ref(objid)?;
        if !self.writer.is_written(objid) {
            self.marked.insert(objid);
        }
        Ok(())
    }

    /// Write a new value for an existing object.
    pub fn replace(&mut self, objid: u32, obj: impl Into<PDFObject>) -> Result<PDFObjRef> {
        let r = self.live_ref(objid)?;
        self.marked.remove(&objid);
        self.writer.add_object_at(obj, r)
    }

    /// Add an object under a number past the original `/Size`.
    pub fn add_object(&mut self, obj: impl Into<PDFObject>) -> Result<PDFObjRef> {
        self.writer.add_object(obj)
    }

    pub fn reserve(&mut self) -> Result<PDFObjRef> {
        self.writer.reserve()
    }

    /// Write an object reserved with [`reserve`](Self::reserve).
    pub fn add_object_at(&mut self, obj: impl Into<PDFObject>, r: PDFObjRef) -> Result<PDFObjRef> {
        self.writer.add_object_at(obj, r)
    }

    /// Delete an existing object. Its entry becomes free with the
    /// generation a reuse of the number would get.
    pub fn delete(&mut self, objid: u32) -> Result<()> {
        let r = self.live_ref(objid)?;
        self.marked.remove(&objid);
        self.writer.free_object(objid, r.genno.saturating_add(1))?;
        tracing::debug!(objid, "object deleted");
        Ok(())
    }

    /// Point the new trailer at another catalog.
    pub const fn set_root(&mut self, root: PDFObjRef) {
        self.root = Some(root);
    }

    pub const fn set_info(&mut self, info: Option<PDFObjRef>) {
        self.info = info;
    }

    /// Copy marked objects forward, write the xref section chained to the
    /// original and return the output.
    pub fn close(mut self) -> Result<W> {
        for objid in std::mem::take(&mut self.marked) {
            let r = self.live_ref(objid)?;
            let obj = self.doc.getobj(objid)?;
            self.writer.add_object_at((*obj).clone(), r)?;
        }

        let root = self
            .root
            .ok_or_else(|| PdfError::WriterMisuse("no catalog for the new revision".into()))?;
        let extra: Dictionary = self
            .doc
            .trailer()
            .into_iter()
            .filter(|(key, _)| !RECOMPUTED_KEYS.contains(&key.as_str()))
            .collect();
        let info = TrailerInfo {
            root,
            info: self.info,
            extra,
        };
        self.writer.close(info)?;
        Ok(self.writer.into_inner())
    }
}
