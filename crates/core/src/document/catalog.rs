//! PDF Document - the reader-side object store.
//!
//! Handles:
//! - header and `startxref` location
//! - xref chain loading (classic, stream, hybrid) and revision merging
//! - lazy object materialization with an explicit release contract
//! - object streams, stream extents and filter decoding
//! - page-tree lookups

use super::extent::resolve_extent;
use super::objstm::ObjectStream;
use super::options::ReadOptions;
use super::page::{self, PageLookup};
use super::store::ObjectCache;
use super::xref::{
    RevisionInfo, XRefEntry, XRefKind, XRefSection, XRefStreamLayout, XRefTable,
    decode_stream_entries, find_startxref, parse_classic_section, scan_objects,
};
use crate::codec::filters::{apply_filters, filter_chain};
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject, PDFStream};
use crate::parser::lexer::Lexer;
use crate::parser::pdf_parser::{IndirectBody, PDFParser};
use bytes::Bytes;
use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Keys of an xref stream dictionary that describe the stream rather than
/// the revision.
const XREF_STREAM_KEYS: [&str; 6] = ["Length", "Filter", "DecodeParms", "W", "Index", "Type"];

/// PDF Document - provides lazy access to the objects of one file.
///
/// Single-threaded: the cache uses interior mutability without locking, so
/// the type is `Send` but not `Sync`. Share the underlying [`Bytes`]
/// between threads and open one document per thread instead.
pub struct PDFDocument {
    data: Bytes,
    options: ReadOptions,
    version: Option<(u8, u8)>,
    startxref: Option<usize>,
    xref: XRefTable,
    cache: ObjectCache,
    objstms: RefCell<FxHashMap<u32, Arc<ObjectStream>>>,
    /// Object number -> (container, index), built on first need.
    objstm_index: RefCell<Option<FxHashMap<u32, (u32, usize)>>>,
    /// Offsets found by scanning for object headers, built on first need.
    scan_index: RefCell<Option<FxHashMap<u32, XRefEntry>>>,
    /// Objects currently being materialized.
    resolving: RefCell<FxHashSet<u32>>,
}

/// Removes an object number from the in-progress set on every exit path.
struct ResolvingGuard<'a> {
    set: &'a RefCell<FxHashSet<u32>>,
    objid: u32,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.objid);
    }
}

impl PDFDocument {
    /// Open a file by memory-mapping it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only; the file must not be truncated while
        // the document is alive, as with any mapped input.
        let mmap = unsafe { Mmap::map(&file) }?;
        Self::from_bytes_with(Bytes::from_owner(mmap), options)
    }

    /// Create a document from raw PDF data (copied).
    pub fn new<D: AsRef<[u8]>>(data: D) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data.as_ref()))
    }

    /// Create a document from shared bytes (zero-copy).
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        Self::from_bytes_with(data, ReadOptions::default())
    }

    pub fn from_bytes_with(data: Bytes, options: ReadOptions) -> Result<Self> {
        let mut doc = Self {
            version: parse_header(&data),
            data,
            cache: ObjectCache::new(options.cache_capacity),
            options,
            startxref: None,
            xref: XRefTable::default(),
            objstms: RefCell::new(FxHashMap::default()),
            objstm_index: RefCell::new(None),
            scan_index: RefCell::new(None),
            resolving: RefCell::new(FxHashSet::default()),
        };
        doc.load()?;
        Ok(doc)
    }

    fn load(&mut self) -> Result<()> {
        if self.version.is_none() {
            tracing::warn!("no %PDF- header in the first 1024 bytes");
        }
        self.startxref = find_startxref(&self.data).ok();

        let loaded = match self.startxref {
            Some(pos) => self.load_xref_chain(pos),
            None => Err(PdfError::NoValidXRef),
        };
        self.xref = match loaded {
            Ok(table) if !table.is_empty() => table,
            other => {
                match other {
                    Err(err) => tracing::warn!(error = %err, "xref chain unreadable, scanning file"),
                    Ok(_) => tracing::warn!("xref chain lists no objects, scanning file"),
                }
                let mut table = XRefTable::default();
                table.merge_older(scan_objects(&self.data)?);
                table
            }
        };

        if !self.xref.trailer().contains_key("Root")
            && let Some(root) = self.find_catalog_by_scan()
        {
            tracing::warn!(objid = root.objid, "trailer has no Root, using scanned catalog");
            self.xref.set_trailer_key("Root", PDFObject::Ref(root));
        }
        Ok(())
    }

    /// Walk `Prev` from the newest section. Only a failure of the first
    /// section is fatal; a broken link further back ends the walk.
    fn load_xref_chain(&self, start: usize) -> Result<XRefTable> {
        let mut table = XRefTable::default();
        let mut visited = FxHashSet::default();
        let mut next = Some(start);

        while let Some(pos) = next {
            match self.load_revision(pos, &mut visited) {
                Ok(section) => {
                    tracing::debug!(offset = pos, kind = ?section.kind, entries = section.entries.len(), "xref section");
                    next = section.prev();
                    table.merge_older(section);
                }
                Err(err) if table.revisions().is_empty() => return Err(err),
                Err(err) => {
                    tracing::warn!(offset = pos, error = %err, "xref chain cut short");
                    break;
                }
            }
        }
        Ok(table)
    }

    fn load_revision(&self, pos: usize, visited: &mut FxHashSet<usize>) -> Result<XRefSection> {
        if pos >= self.data.len() {
            return Err(PdfError::InconsistentXref(format!(
                "xref offset {pos} outside file of {} bytes",
                self.data.len()
            )));
        }
        if !visited.insert(pos) {
            return Err(PdfError::InconsistentXref(format!(
                "Prev chain revisits offset {pos}"
            )));
        }

        let mut lexer = Lexer::at(&self.data, pos);
        lexer.skip_whitespace();
        let at = lexer.tell();
        if !self.data[at..].starts_with(b"xref") {
            return self.load_xref_stream(at);
        }

        let classic = parse_classic_section(&self.data, at)?;
        if let Some(stm_pos) = classic.xref_stm()
            && visited.insert(stm_pos)
        {
            match self.load_xref_stream(stm_pos) {
                Ok(mut hybrid) => {
                    hybrid.overlay(classic);
                    return Ok(hybrid);
                }
                Err(err) => tracing::warn!(offset = stm_pos, error = %err, "XRefStm unreadable"),
            }
        }
        Ok(classic)
    }

    fn load_xref_stream(&self, pos: usize) -> Result<XRefSection> {
        let obj = self.read_indirect_at(pos, None)?;
        let stream = obj.as_stream()?;
        match stream.get("Type") {
            Some(PDFObject::Name(name)) if name == "XRef" => {}
            _ => {
                return Err(PdfError::InconsistentXref(format!(
                    "object at {pos} is not an xref stream"
                )));
            }
        }
        let layout = XRefStreamLayout::from_dict(&stream.attrs)?;
        let decoded = self.decode_stream(stream)?;

        let mut section = XRefSection::new(pos, XRefKind::Stream);
        section.entries = decode_stream_entries(&decoded, &layout);
        section.trailer = stream
            .attrs
            .iter()
            .filter(|(key, _)| !XREF_STREAM_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(section)
    }

    /// Parse the indirect object whose header starts at `offset`.
    fn read_indirect_at(&self, offset: usize, expected: Option<(u32, u16)>) -> Result<PDFObject> {
        let expected_id = expected.map_or(0, |(id, _)| id);
        if offset >= self.data.len() {
            return Err(PdfError::InconsistentXref(format!(
                "object {expected_id} offset {offset} outside file of {} bytes",
                self.data.len()
            )));
        }
        let malformed = |err: PdfError| match err {
            PdfError::SyntaxError(msg) | PdfError::TokenError { msg, .. } => {
                PdfError::MalformedObject {
                    objid: expected_id,
                    offset,
                    msg,
                }
            }
            other => other,
        };

        let parsed = PDFParser::at(&self.data, offset)
            .with_max_depth(self.options.max_depth)
            .parse_indirect_object()
            .map_err(malformed)?;

        if let Some((objid, _)) = expected
            && parsed.objid != objid
        {
            return Err(PdfError::MalformedObject {
                objid,
                offset,
                msg: format!("found object {} instead", parsed.objid),
            });
        }

        match parsed.body {
            IndirectBody::Value(value) => Ok(value),
            IndirectBody::Stream { dict, data_start } => {
                let declared = self.declared_length(&dict, parsed.objid);
                let extent = resolve_extent(&self.data, data_start, declared, &self.options.extent);
                let mut stream = PDFStream::new(dict, self.data.slice(extent.start..extent.end));
                stream.set_objid(parsed.objid, parsed.genno);
                Ok(PDFObject::from(stream))
            }
        }
    }

    /// `/Length` as a number, following one indirect reference. Anything
    /// unusable leaves the extent to the keyword scan.
    fn declared_length(&self, dict: &Dictionary, objid: u32) -> Option<usize> {
        match dict.get("Length")? {
            PDFObject::Int(n) => usize::try_from(*n).ok(),
            PDFObject::Ref(r) if !self.xref.is_empty() => match self.getobj(r.objid) {
                Ok(len) => len.as_usize().ok(),
                Err(err) => {
                    tracing::debug!(objid, length_ref = r.objid, error = %err, "indirect Length unresolved");
                    None
                }
            },
            _ => None,
        }
    }

    /// Strict lookup: the object, or `ObjectNotFound` for numbers that are
    /// free or absent in every revision.
    pub fn getobj(&self, objid: u32) -> Result<Arc<PDFObject>> {
        if let Some(obj) = self.cache.get(objid) {
            return Ok(obj);
        }
        if !self.resolving.borrow_mut().insert(objid) {
            return Err(PdfError::CircularReference(objid));
        }
        let _guard = ResolvingGuard {
            set: &self.resolving,
            objid,
        };

        let obj = match self.xref.get(objid).copied() {
            Some(XRefEntry::InFile { offset, genno }) => {
                match self.read_indirect_at(offset, Some((objid, genno))) {
                    Ok(obj) => obj,
                    Err(err) if err.is_recoverable() => {
                        self.recover_by_scan(objid, offset).ok_or(err)?
                    }
                    Err(err) => return Err(err),
                }
            }
            Some(XRefEntry::InObjStm { container, index }) => {
                match self.read_from_objstm(objid, container, index) {
                    Ok(obj) => obj,
                    Err(err) => self.recover_from_objstm_index(objid).ok_or(err)?,
                }
            }
            Some(XRefEntry::Free { .. }) => return Err(PdfError::ObjectNotFound(objid)),
            None if self.is_damaged() => self
                .recover_from_objstm_index(objid)
                .ok_or(PdfError::ObjectNotFound(objid))?,
            None => return Err(PdfError::ObjectNotFound(objid)),
        };

        self.cache.record_parse();
        tracing::trace!(objid, "materialized");
        let obj = Arc::new(obj);
        self.cache.insert(objid, Arc::clone(&obj));
        Ok(obj)
    }

    fn is_damaged(&self) -> bool {
        self.xref
            .revisions()
            .iter()
            .any(|rev| rev.kind == XRefKind::Fallback)
    }

    /// The xref offset was wrong; look the header up by scanning.
    fn recover_by_scan(&self, objid: u32, bad_offset: usize) -> Option<PDFObject> {
        if self.scan_index.borrow().is_none() {
            let entries = scan_objects(&self.data)
                .map(|section| section.entries)
                .unwrap_or_default();
            *self.scan_index.borrow_mut() = Some(entries);
        }
        let entry = self.scan_index.borrow().as_ref()?.get(&objid).copied()?;
        let XRefEntry::InFile { offset, genno } = entry else {
            return None;
        };
        if offset == bad_offset {
            return None;
        }
        let obj = self.read_indirect_at(offset, Some((objid, genno))).ok()?;
        tracing::warn!(objid, bad_offset, offset, "object found by scan after bad xref offset");
        Some(obj)
    }

    fn object_stream(&self, container: u32) -> Result<Arc<ObjectStream>> {
        if let Some(stm) = self.objstms.borrow().get(&container) {
            return Ok(Arc::clone(stm));
        }
        let obj = self.getobj(container)?;
        let stream = obj.as_stream()?;
        let decoded = self.decode_stream(stream)?;
        let stm = Arc::new(ObjectStream::parse(container, &stream.attrs, decoded)?);
        tracing::debug!(container, members = stm.len(), "object stream unpacked");
        self.objstms.borrow_mut().insert(container, Arc::clone(&stm));
        Ok(stm)
    }

    fn read_from_objstm(&self, objid: u32, container: u32, index: usize) -> Result<PDFObject> {
        let stm = self.object_stream(container)?;
        let (found, obj) = stm.get(index, self.options.max_depth)?;
        if found == objid {
            return Ok(obj);
        }
        let index = stm.position_of(objid).ok_or_else(|| PdfError::MalformedObject {
            objid,
            offset: index,
            msg: format!("not a member of object stream {container}"),
        })?;
        tracing::warn!(objid, container, index, "object stream index mismatch, found by number");
        Ok(stm.get(index, self.options.max_depth)?.1)
    }

    /// Search every object stream in the file for `objid`.
    fn recover_from_objstm_index(&self, objid: u32) -> Option<PDFObject> {
        if self.objstm_index.borrow().is_none() {
            let index = self.build_objstm_index();
            *self.objstm_index.borrow_mut() = Some(index);
        }
        let (container, index) = self.objstm_index.borrow().as_ref()?.get(&objid).copied()?;
        let obj = self.read_from_objstm(objid, container, index).ok()?;
        tracing::warn!(objid, container, "object recovered from object stream scan");
        Some(obj)
    }

    fn build_objstm_index(&self) -> FxHashMap<u32, (u32, usize)> {
        let mut index = FxHashMap::default();
        let Ok(section) = scan_objects(&self.data) else {
            return index;
        };
        let mut headers: Vec<(u32, usize)> = section
            .entries
            .into_iter()
            .filter_map(|(id, entry)| match entry {
                XRefEntry::InFile { offset, .. } => Some((id, offset)),
                _ => None,
            })
            .collect();
        // newest (latest in the file) container wins
        headers.sort_unstable_by(|a, b| b.1.cmp(&a.1));

        for (container, offset) in headers {
            let Ok(PDFObject::Stream(stream)) = self.read_indirect_at(offset, None) else {
                continue;
            };
            if !matches!(stream.get("Type"), Some(PDFObject::Name(n)) if n == "ObjStm") {
                continue;
            }
            let Ok(decoded) = self.decode_stream(&stream) else {
                continue;
            };
            let Ok(stm) = ObjectStream::parse(container, &stream.attrs, decoded) else {
                continue;
            };
            for (i, member) in stm.member_ids().enumerate() {
                index.entry(member).or_insert((container, i));
            }
            self.objstms.borrow_mut().entry(container).or_insert_with(|| Arc::new(stm));
        }
        tracing::warn!(objects = index.len(), "object stream fallback index built");
        index
    }

    fn find_catalog_by_scan(&self) -> Option<PDFObjRef> {
        self.xref.objids().into_iter().rev().find_map(|objid| {
            let obj = self.getobj(objid).ok()?;
            let is_catalog = matches!(
                obj.as_dict().ok()?.get("Type"),
                Some(PDFObject::Name(name)) if name == "Catalog"
            );
            let genno = self.xref.get(objid).map_or(0, XRefEntry::genno);
            is_catalog.then_some(PDFObjRef::new(objid, genno))
        })
    }

    /// Object `objid`, or `Null` when no revision defines it.
    pub fn get_object(&self, objid: u32) -> Result<PDFObject> {
        match self.getobj(objid) {
            Ok(obj) => Ok((*obj).clone()),
            Err(PdfError::ObjectNotFound(_)) => {
                tracing::debug!(objid, "unresolvable reference, using null");
                Ok(PDFObject::Null)
            }
            Err(err) => Err(err),
        }
    }

    /// Like [`get_object`](Self::get_object), then drop the cache slot.
    pub fn get_object_released(&self, objid: u32) -> Result<PDFObject> {
        let obj = self.get_object(objid);
        self.cache.release(objid);
        obj
    }

    /// Evict `objid` from the cache. Safe to call for anything.
    pub fn release(&self, objid: u32) -> bool {
        self.cache.release(objid)
    }

    /// Number of objects materialized from file bytes so far.
    pub fn parse_count(&self) -> u64 {
        self.cache.parse_count()
    }

    /// Objects currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Page-tree nodes honor partial mode.
    pub(crate) fn fetch_tree_node(&self, objid: u32) -> Result<PDFObject> {
        if self.options.partial {
            self.get_object_released(objid)
        } else {
            self.get_object(objid)
        }
    }

    /// Follow references until a direct value. Dangling references give
    /// `Null`.
    pub fn resolve(&self, obj: &PDFObject) -> Result<PDFObject> {
        let mut seen = FxHashSet::default();
        let mut current = obj.clone();
        while let PDFObject::Ref(r) = current {
            if !seen.insert(r.objid) {
                return Err(PdfError::CircularReference(r.objid));
            }
            current = self.get_object(r.objid)?;
        }
        Ok(current)
    }

    /// Raw bytes of a stream, optionally run through its filters. The
    /// unfiltered path shares the document's buffer.
    pub fn get_stream_bytes(&self, stream: &PDFStream, apply: bool) -> Result<Bytes> {
        if !apply || !stream.has_filters() {
            return Ok(stream.rawdata_bytes());
        }
        self.decode_stream(stream).map(Bytes::from)
    }

    /// Decode a stream through its `/Filter` chain.
    pub fn decode_stream(&self, stream: &PDFStream) -> Result<Vec<u8>> {
        let chain = filter_chain(&stream.attrs, |obj| {
            self.resolve(obj).unwrap_or(PDFObject::Null)
        })?;
        apply_filters(stream.get_rawdata(), &chain).inspect_err(|err| {
            tracing::debug!(objid = ?stream.objid, error = %err, "stream decode failed");
        })
    }

    /// Header version, e.g. `(1, 7)`.
    pub const fn version(&self) -> Option<(u8, u8)> {
        self.version
    }

    /// Offset named by the last `startxref`.
    pub const fn startxref(&self) -> Option<usize> {
        self.startxref
    }

    /// Merged trailer: the newest value of each key.
    pub fn trailer(&self) -> Dictionary {
        self.xref.trailer()
    }

    /// Per-revision trailers, newest first.
    pub fn trailers(&self) -> impl Iterator<Item = &Dictionary> {
        self.xref.revisions().iter().map(|rev| &rev.trailer)
    }

    pub fn revisions(&self) -> &[RevisionInfo] {
        self.xref.revisions()
    }

    /// `/Root` reference from the trailer.
    pub fn root(&self) -> Option<PDFObjRef> {
        self.xref.trailer().get("Root").and_then(|r| r.as_ref().ok().copied())
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dictionary> {
        let root = self
            .xref
            .trailer()
            .get("Root")
            .cloned()
            .ok_or_else(|| PdfError::KeyError("Root".into()))?;
        let root = match root {
            PDFObject::Ref(r) => self.fetch_tree_node(r.objid)?,
            direct => direct,
        };
        match self.resolve(&root)? {
            PDFObject::Dict(dict) => Ok(dict),
            other => Err(PdfError::TypeError {
                expected: "catalog dict",
                got: other.type_name(),
            }),
        }
    }

    /// The `/Info` dictionary, if any.
    pub fn info(&self) -> Result<Option<Dictionary>> {
        let Some(info) = self.xref.trailer().get("Info").cloned() else {
            return Ok(None);
        };
        match self.resolve(&info)? {
            PDFObject::Dict(dict) => Ok(Some(dict)),
            _ => Ok(None),
        }
    }

    /// The two `/ID` strings of the newest trailer.
    pub fn file_id(&self) -> Option<[Vec<u8>; 2]> {
        let id = self.xref.trailer().get("ID")?.clone();
        let id = self.resolve(&id).ok()?;
        match id.as_array().ok()?.as_slice() {
            [a, b] => Some([a.as_string().ok()?.to_vec(), b.as_string().ok()?.to_vec()]),
            _ => None,
        }
    }

    /// Merged xref entry for `objid`.
    pub fn xref_entry(&self, objid: u32) -> Option<XRefEntry> {
        self.xref.get(objid).copied()
    }

    /// Live object numbers, sorted.
    pub fn objids(&self) -> Vec<u32> {
        self.xref.objids()
    }

    /// Highest object number any revision mentions.
    pub fn max_objid(&self) -> u32 {
        self.xref.max_objid().unwrap_or(0)
    }

    /// `/Size` of the newest trailer, or one past the highest number seen.
    pub fn size(&self) -> u32 {
        self.xref
            .trailer()
            .get("Size")
            .and_then(|s| s.as_int().ok())
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0)
            .max(self.max_objid() + 1)
    }

    /// The newest xref section was an xref stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.xref
            .revisions()
            .first()
            .is_some_and(|rev| matches!(rev.kind, XRefKind::Stream | XRefKind::Hybrid))
    }

    /// The underlying file bytes.
    pub const fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub const fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Page count from the root page-tree node.
    pub fn page_count(&self) -> Result<u32> {
        page::page_count(self)
    }

    /// Page `number` (1-indexed) with inherited attributes filled in.
    pub fn get_page(&self, number: u32) -> Result<Dictionary> {
        page::find_page(self, number).map(|page| page.attrs)
    }

    /// Page `number` (1-indexed) plus its reference.
    pub fn find_page(&self, number: u32) -> Result<PageLookup> {
        page::find_page(self, number)
    }
}

/// `%PDF-M.m` within the first 1024 bytes.
fn parse_header(data: &[u8]) -> Option<(u8, u8)> {
    let head = &data[..data.len().min(1024)];
    let pos = head.windows(5).position(|w| w == b"%PDF-")?;
    let rest = &head[pos + 5..];
    let major = rest.first().filter(|b| b.is_ascii_digit())? - b'0';
    let minor = match (rest.get(1), rest.get(2)) {
        (Some(b'.'), Some(d)) if d.is_ascii_digit() => d - b'0',
        _ => 0,
    };
    Some((major, minor))
}
