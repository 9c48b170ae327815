//! Body writer - allocates object numbers and writes indirect objects.
//!
//! Output is append-only: every object is written once, at the current
//! position, and its cross-reference entry recorded. With a compressed
//! xref, small generation-0 objects are buffered into an object stream
//! instead and the container is written when it fills up or at close.

use super::file_id::{FileIdGenerator, id_array};
use super::serialize::{to_bytes, write_indirect};
use super::xref::{build_stream, fits_table, link_free_list, write_startxref, write_table};
use super::{TrailerInfo, WriteOptions};
use crate::codec::flate::flateencode;
use crate::document::objstm::ObjectStreamBuilder;
use crate::document::xref::XRefEntry;
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject, PDFStream};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Binary comment after the header so transfer tools treat the file as
/// binary.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Tracks how many bytes went through, which is each object's offset.
pub struct CountingWriter<W: Write> {
    inner: W,
    bytes_written: usize,
}

impl<W: Write> CountingWriter<W> {
    const fn new(inner: W, bytes_written: usize) -> Self {
        Self {
            inner,
            bytes_written,
        }
    }

    pub const fn position(&self) -> usize {
        self.bytes_written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The revision an append-mode writer continues.
#[derive(Debug, Clone)]
pub(crate) struct AppendBase {
    /// Offset of the previous revision's xref section.
    pub prev: usize,
    /// `/Size` of the previous revision.
    pub size: u32,
    /// First `/ID` entry, kept as is.
    pub first_id: Option<Vec<u8>>,
    /// The previous revision used an xref stream.
    pub stream_xref: bool,
}

/// PDF Writer - one output session.
pub struct PdfWriter<W: Write> {
    out: CountingWriter<W>,
    options: WriteOptions,
    entries: FxHashMap<u32, XRefEntry>,
    reserved: FxHashSet<u32>,
    /// Objects waiting in `pending`, not yet given an entry.
    buffered: FxHashSet<u32>,
    pending: ObjectStreamBuilder,
    next_objid: u32,
    ids: FileIdGenerator,
    append: Option<AppendBase>,
    closed: bool,
}

impl<W: Write> PdfWriter<W> {
    /// Start a new file: writes the header.
    pub fn new(out: W, options: WriteOptions) -> Result<Self> {
        let mut writer = Self::with_base(CountingWriter::new(out, 0), options, None, 1);
        let (major, minor) = writer.options.effective_version();
        writeln!(writer.out, "%PDF-{major}.{minor}")?;
        writer.out.write_all(BINARY_MARKER)?;
        Ok(writer)
    }

    /// Continue after `original`, which is copied to `out` unchanged.
    pub(crate) fn append(
        out: W,
        original: &[u8],
        base: AppendBase,
        options: WriteOptions,
    ) -> Result<Self> {
        let next = base.size.max(1);
        let mut writer = Self::with_base(CountingWriter::new(out, 0), options, Some(base), next);
        writer.out.write_all(original)?;
        if !matches!(original.last(), Some(b'\n' | b'\r')) {
            writer.out.write_all(b"\n")?;
        }
        Ok(writer)
    }

    fn with_base(
        out: CountingWriter<W>,
        options: WriteOptions,
        append: Option<AppendBase>,
        next_objid: u32,
    ) -> Self {
        Self {
            out,
            options,
            entries: FxHashMap::default(),
            reserved: FxHashSet::default(),
            buffered: FxHashSet::default(),
            pending: ObjectStreamBuilder::new(),
            next_objid,
            ids: FileIdGenerator::new(),
            append,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PdfError::WriterMisuse("writer already closed".into()));
        }
        Ok(())
    }

    fn allocate(&mut self) -> Result<u32> {
        let objid = self.next_objid;
        self.next_objid = objid
            .checked_add(1)
            .ok_or_else(|| PdfError::WriterMisuse("object numbers exhausted".into()))?;
        Ok(objid)
    }

    pub(crate) fn is_written(&self, objid: u32) -> bool {
        self.entries.contains_key(&objid) || self.buffered.contains(&objid)
    }

    /// Write `obj` under the next free object number.
    pub fn add_object(&mut self, obj: impl Into<PDFObject>) -> Result<PDFObjRef> {
        self.ensure_open()?;
        let r = PDFObjRef::new(self.allocate()?, 0);
        self.write_at(r, obj.into())?;
        Ok(r)
    }

    /// Write `obj` under a given identity: a reservation, or a number
    /// carried over from an earlier revision.
    pub fn add_object_at(&mut self, obj: impl Into<PDFObject>, r: PDFObjRef) -> Result<PDFObjRef> {
        self.ensure_open()?;
        if r.objid == 0 {
            return Err(PdfError::WriterMisuse("object number 0 is reserved".into()));
        }
        if self.is_written(r.objid) {
            return Err(PdfError::WriterMisuse(format!(
                "object {} written twice",
                r.objid
            )));
        }
        self.reserved.remove(&r.objid);
        if r.objid >= self.next_objid {
            self.next_objid = r.objid.saturating_add(1);
        }
        self.write_at(r, obj.into())?;
        Ok(r)
    }

    /// Allocate a number now and write its object later with
    /// [`add_object_at`](Self::add_object_at).
    pub fn reserve(&mut self) -> Result<PDFObjRef> {
        self.ensure_open()?;
        let objid = self.allocate()?;
        self.reserved.insert(objid);
        Ok(PDFObjRef::new(objid, 0))
    }

    /// Record `objid` as deleted; the entry's generation is `next_genno`.
    pub(crate) fn free_object(&mut self, objid: u32, next_genno: u16) -> Result<()> {
        self.ensure_open()?;
        if objid == 0 || self.is_written(objid) {
            return Err(PdfError::WriterMisuse(format!(
                "object {objid} cannot be freed in this revision"
            )));
        }
        self.entries.insert(
            objid,
            XRefEntry::Free {
                next: 0,
                genno: next_genno,
            },
        );
        Ok(())
    }

    /// Bytes written so far, including any copied original.
    pub const fn position(&self) -> usize {
        self.out.position()
    }

    /// Number the next [`add_object`](Self::add_object) will get.
    pub const fn next_objid(&self) -> u32 {
        self.next_objid
    }

    pub const fn options(&self) -> &WriteOptions {
        &self.options
    }

    fn write_at(&mut self, r: PDFObjRef, mut obj: PDFObject) -> Result<()> {
        if let PDFObject::Stream(stream) = &mut obj {
            self.compress_stream(stream)?;
        }
        let packable = !matches!(obj, PDFObject::Stream(_)) && r.genno == 0;
        if self.options.compress_xref && packable {
            self.pending.push(r.objid, to_bytes(&obj));
            self.buffered.insert(r.objid);
            if self.pending.len() >= self.options.object_stream_capacity.max(1) {
                self.flush_object_stream()?;
            }
            return Ok(());
        }
        self.write_direct(r, &obj)
    }

    fn write_direct(&mut self, r: PDFObjRef, obj: &PDFObject) -> Result<()> {
        let offset = self.out.position();
        write_indirect(&mut self.out, r, obj)?;
        self.entries.insert(
            r.objid,
            XRefEntry::InFile {
                offset,
                genno: r.genno,
            },
        );
        tracing::trace!(objid = r.objid, offset, "object written");
        Ok(())
    }

    fn compress_stream(&self, stream: &mut PDFStream) -> Result<()> {
        if !self.options.compress_streams || stream.has_filters() {
            return Ok(());
        }
        let encoded = flateencode(stream.get_rawdata())?;
        stream.attrs.insert("Filter".into(), PDFObject::name("FlateDecode"));
        stream.set_rawdata(encoded);
        Ok(())
    }

    /// Write the pending object stream, if any, under a new number.
    pub fn flush_object_stream(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let builder = std::mem::take(&mut self.pending);
        let (mut attrs, body, ids) = builder.build();
        attrs.insert("Filter".into(), PDFObject::name("FlateDecode"));
        let stream = PDFStream::with_data(attrs, flateencode(&body)?);

        let container = self.allocate()?;
        self.write_direct(PDFObjRef::new(container, 0), &PDFObject::from(stream))?;
        for (index, objid) in ids.iter().enumerate() {
            self.buffered.remove(objid);
            self.entries
                .insert(*objid, XRefEntry::InObjStm { container, index });
        }
        tracing::debug!(container, members = ids.len(), "object stream flushed");
        Ok(())
    }

    /// Flush pending objects, then write the xref section and trailer.
    /// Nothing may be added afterwards.
    pub fn close(&mut self, info: TrailerInfo) -> Result<()> {
        self.ensure_open()?;
        if !self.reserved.is_empty() {
            let mut missing: Vec<u32> = self.reserved.iter().copied().collect();
            missing.sort_unstable();
            return Err(PdfError::WriterMisuse(format!(
                "reserved objects never written: {missing:?}"
            )));
        }
        self.flush_object_stream()?;

        let mut entries: BTreeMap<u32, XRefEntry> =
            self.entries.iter().map(|(&id, &e)| (id, e)).collect();
        if self.append.is_none() {
            // numbers skipped by add_object_at are free
            for objid in 1..self.next_objid {
                entries.entry(objid).or_insert(XRefEntry::Free { next: 0, genno: 0 });
            }
        }

        let as_stream = self.options.compress_xref
            || self.append.as_ref().is_some_and(|base| base.stream_xref)
            || !fits_table(&entries);
        let mut trailer = self.trailer_dict(info);

        let startxref = if as_stream {
            let objid = self.allocate()?;
            let offset = self.out.position();
            entries.insert(objid, XRefEntry::InFile { offset, genno: 0 });
            link_free_list(&mut entries);
            trailer.insert("Size".into(), PDFObject::Int(self.size().into()));
            let stream = build_stream(&entries, trailer)?;
            write_indirect(&mut self.out, PDFObjRef::new(objid, 0), &PDFObject::from(stream))?;
            offset
        } else {
            let offset = self.out.position();
            link_free_list(&mut entries);
            trailer.insert("Size".into(), PDFObject::Int(self.size().into()));
            write_table(&mut self.out, &entries, &trailer)?;
            offset
        };
        write_startxref(&mut self.out, startxref)?;
        self.out.flush()?;
        self.closed = true;
        tracing::debug!(startxref, entries = entries.len(), as_stream, "xref written");
        Ok(())
    }

    fn size(&self) -> u32 {
        let base = self.append.as_ref().map_or(0, |b| b.size);
        self.next_objid.max(base)
    }

    fn trailer_dict(&mut self, info: TrailerInfo) -> Dictionary {
        let mut trailer = info.extra;
        trailer.insert("Root".into(), PDFObject::Ref(info.root));
        if let Some(info) = info.info {
            trailer.insert("Info".into(), PDFObject::Ref(info));
        }
        let digest = self.ids.next_id(self.out.position() as u64);
        let first = match &self.append {
            Some(base) => {
                trailer.insert("Prev".into(), PDFObject::Int(base.prev as i64));
                base.first_id.clone().unwrap_or_else(|| digest.to_vec())
            }
            None => {
                trailer.shift_remove("Prev");
                digest.to_vec()
            }
        };
        trailer.insert("ID".into(), id_array(&first, &digest));
        trailer
    }

    /// The output sink. Call after [`close`](Self::close).
    pub fn into_inner(self) -> W {
        self.out.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PDFObject {
        let mut dict = Dictionary::new();
        dict.insert("Type".into(), PDFObject::name("Catalog"));
        PDFObject::Dict(dict)
    }

    #[test]
    fn numbers_are_sequential() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let a = writer.add_object(PDFObject::Int(1)).unwrap();
        let b = writer.add_object(PDFObject::Int(2)).unwrap();
        assert_eq!((a.objid, b.objid), (1, 2));
        assert_eq!(writer.next_objid(), 3);
    }

    #[test]
    fn header_and_trailer() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let root = writer.add_object(catalog()).unwrap();
        writer.close(TrailerInfo::new(root)).unwrap();
        let out = writer.into_inner();
        assert!(out.starts_with(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"));
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("xref\n0 2\n0000000000 65535 f \n"));
        assert!(text.contains("/Root 1 0 R"));
        assert!(text.contains("/Size 2"));
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn writing_after_close_is_misuse() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let root = writer.add_object(catalog()).unwrap();
        writer.close(TrailerInfo::new(root)).unwrap();
        assert!(matches!(
            writer.add_object(PDFObject::Null),
            Err(PdfError::WriterMisuse(_))
        ));
        assert!(matches!(
            writer.close(TrailerInfo::new(root)),
            Err(PdfError::WriterMisuse(_))
        ));
    }

    #[test]
    fn unwritten_reservation_fails_close() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let reserved = writer.reserve().unwrap();
        let root = writer.add_object(catalog()).unwrap();
        let err = writer.close(TrailerInfo::new(root)).unwrap_err();
        assert!(matches!(err, PdfError::WriterMisuse(msg) if msg.contains(&reserved.objid.to_string())));
    }

    #[test]
    fn same_number_twice_is_misuse() {
        let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).unwrap();
        let r = writer.add_object(PDFObject::Int(1)).unwrap();
        assert!(matches!(
            writer.add_object_at(PDFObject::Int(2), r),
            Err(PdfError::WriterMisuse(_))
        ));
    }

    #[test]
    fn compressed_mode_raises_version_and_packs_objects() {
        let options = WriteOptions::default()
            .with_version(1, 4)
            .compress_xref(true)
            .with_object_stream_capacity(2);
        let mut writer = PdfWriter::new(Vec::new(), options).unwrap();
        let root = writer.add_object(catalog()).unwrap();
        writer.add_object(PDFObject::Int(5)).unwrap();
        // capacity reached: the container took number 3
        assert_eq!(writer.next_objid(), 4);
        writer.close(TrailerInfo::new(root)).unwrap();
        let out = writer.into_inner();
        assert!(out.starts_with(b"%PDF-1.5\n"));
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/Type /ObjStm"));
        assert!(text.contains("/Type /XRef"));
        assert!(!text.contains("\nxref\n"));
    }
}
