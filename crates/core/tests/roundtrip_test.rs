//! Write-then-read tests for both cross-reference encodings.

mod common;

use common::dict;
use folio_core::document::XRefEntry;
use folio_core::model::{Dictionary, PDFObjRef, PDFObject, PDFStream};
use folio_core::{PDFDocument, PageTreeWriter, PdfError, PdfWriter, TrailerInfo, WriteOptions};

/// A small but varied object set; returns the written references with the
/// values they should resolve to.
fn write_sample(options: WriteOptions) -> (Vec<u8>, Vec<(PDFObjRef, PDFObject)>) {
    let mut writer = PdfWriter::new(Vec::new(), options).expect("writer");
    let mut written = Vec::new();

    let values = vec![
        PDFObject::Int(42),
        PDFObject::Real(-3.5),
        PDFObject::Bool(true),
        PDFObject::Null,
        PDFObject::name("With Space"),
        PDFObject::string(b"paren ( and \\ backslash".to_vec()),
        PDFObject::hex_string(vec![0x00, 0x9f, 0xff]),
        PDFObject::Array(vec![PDFObject::Int(1), PDFObject::reference(1, 0)]),
        PDFObject::Dict(dict([
            ("Nested", PDFObject::Dict(dict([("Deep", PDFObject::Real(0.125))]))),
            ("Empty", PDFObject::Array(Vec::new())),
        ])),
        PDFObject::from(PDFStream::with_data(
            dict([("Subtype", PDFObject::name("Form"))]),
            b"0 0 m 10 10 l S".to_vec(),
        )),
    ];
    for value in values {
        let r = writer.add_object(value.clone()).expect("add");
        written.push((r, value));
    }

    let root = writer
        .add_object(dict([("Type", PDFObject::name("Catalog"))]))
        .expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    (writer.into_inner(), written)
}

fn assert_round_trip(options: WriteOptions) {
    let (data, written) = write_sample(options);
    let doc = PDFDocument::new(&data).expect("reopen");
    for (r, expected) in written {
        let got = doc.get_object(r.objid).expect("resolve");
        assert_eq!(got, expected, "object {} changed in round trip", r.objid);
    }
}

#[test]
fn test_round_trip_legacy_table() {
    assert_round_trip(WriteOptions::default());
}

#[test]
fn test_round_trip_compressed_xref() {
    assert_round_trip(WriteOptions::default().compress_xref(true));
}

#[test]
fn test_round_trip_compressed_with_small_object_streams() {
    assert_round_trip(
        WriteOptions::default()
            .compress_xref(true)
            .with_object_stream_capacity(3),
    );
}

#[test]
fn test_compressed_objects_live_in_object_streams() {
    let (data, written) = write_sample(WriteOptions::default().compress_xref(true));
    let doc = PDFDocument::new(&data).expect("reopen");
    assert!(doc.uses_xref_stream());
    let (first, _) = &written[0];
    assert!(matches!(
        doc.xref_entry(first.objid),
        Some(XRefEntry::InObjStm { .. })
    ));
    // streams are never packed
    let (stream_ref, _) = written.last().expect("stream written");
    assert!(matches!(
        doc.xref_entry(stream_ref.objid),
        Some(XRefEntry::InFile { .. })
    ));
}

#[test]
fn test_compressed_streams_decode_to_original() {
    let mut writer =
        PdfWriter::new(Vec::new(), WriteOptions::default().compress_streams(true)).expect("writer");
    let content = b"BT /F1 12 Tf (hello) Tj ET ".repeat(20);
    let stream = writer
        .add_object(PDFStream::with_data(Dictionary::new(), content.clone()))
        .expect("stream");
    let root = writer
        .add_object(dict([("Type", PDFObject::name("Catalog"))]))
        .expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    let data = writer.into_inner();

    let doc = PDFDocument::new(&data).expect("reopen");
    let obj = doc.getobj(stream.objid).expect("stream object");
    let stream = obj.as_stream().expect("is stream");
    assert_eq!(stream.get("Filter"), Some(&PDFObject::name("FlateDecode")));
    assert!(stream.get_rawdata().len() < content.len());
    assert_eq!(&doc.get_stream_bytes(stream, true).expect("decode")[..], &content[..]);
}

#[test]
fn test_trailer_carries_id_and_info() {
    let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).expect("writer");
    let info = writer
        .add_object(dict([("Producer", PDFObject::string(b"folio".to_vec()))]))
        .expect("info");
    let root = writer
        .add_object(dict([("Type", PDFObject::name("Catalog"))]))
        .expect("catalog");
    writer
        .close(TrailerInfo::new(root).with_info(info))
        .expect("close");
    let data = writer.into_inner();

    let doc = PDFDocument::new(&data).expect("reopen");
    let [first, second] = doc.file_id().expect("ID present");
    assert_eq!(first.len(), 16);
    assert_eq!(first, second);
    let info = doc.info().expect("info").expect("info dict");
    assert_eq!(
        info.get("Producer").and_then(|p| p.as_string().ok()),
        Some(&b"folio"[..])
    );
}

/// Three pages share one indirect `/Resources` dictionary; the shared
/// reference survives writing and reading.
#[test]
fn test_shared_resources_keep_one_reference() {
    for compress in [false, true] {
        let mut writer =
            PdfWriter::new(Vec::new(), WriteOptions::default().compress_xref(compress))
                .expect("writer");
        let resources = writer
            .add_object(dict([(
                "Font",
                PDFObject::Dict(dict([("F1", PDFObject::reference(99, 0))])),
            )]))
            .expect("resources");
        let mut tree = PageTreeWriter::new(&mut writer, 3).expect("tree");
        for n in 1..=3 {
            tree.add_page(
                &mut writer,
                n,
                dict([("Resources", PDFObject::Ref(resources))]),
            )
            .expect("page");
        }
        let pages = tree
            .finish(
                &mut writer,
                dict([(
                    "MediaBox",
                    PDFObject::Array(vec![
                        PDFObject::Int(0),
                        PDFObject::Int(0),
                        PDFObject::Int(612),
                        PDFObject::Int(792),
                    ]),
                )]),
            )
            .expect("finish");
        let root = writer
            .add_object(dict([
                ("Type", PDFObject::name("Catalog")),
                ("Pages", PDFObject::Ref(pages)),
            ]))
            .expect("catalog");
        writer.close(TrailerInfo::new(root)).expect("close");
        let data = writer.into_inner();

        let doc = PDFDocument::new(&data).expect("reopen");
        assert_eq!(doc.page_count().expect("count"), 3);
        let page1 = doc.get_page(1).expect("page 1");
        let page2 = doc.get_page(2).expect("page 2");
        assert_eq!(page1.get("Resources"), Some(&PDFObject::Ref(resources)));
        assert_eq!(page2.get("Resources"), page1.get("Resources"));
        // inherited from the tree node
        assert!(page2.contains_key("MediaBox"));

        let resolved = doc
            .resolve(page2.get("Resources").expect("resources"))
            .expect("resolve");
        assert_eq!(resolved, doc.get_object(resources.objid).expect("direct"));
    }
}

#[test]
fn test_page_out_of_range() {
    let data = common::pages_pdf(2);
    let doc = PDFDocument::new(&data).expect("open");
    for n in [0, 3] {
        assert!(
            matches!(
                doc.get_page(n),
                Err(PdfError::PageOutOfRange { requested, count: 2 }) if requested == n
            ),
            "page {n} should be out of range"
        );
    }
}

#[test]
fn test_forward_reservation_resolves() {
    let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).expect("writer");
    let later = writer.reserve().expect("reserve");
    let holder = writer
        .add_object(dict([("Next", PDFObject::Ref(later))]))
        .expect("holder");
    writer
        .add_object_at(PDFObject::Int(7), later)
        .expect("fill reservation");
    let root = writer
        .add_object(dict([("Type", PDFObject::name("Catalog"))]))
        .expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    let data = writer.into_inner();

    let doc = PDFDocument::new(&data).expect("reopen");
    let holder = doc.get_object(holder.objid).expect("holder");
    let next = holder.as_dict().expect("dict").get("Next").expect("Next");
    assert_eq!(doc.resolve(next).expect("resolve"), PDFObject::Int(7));
}

#[test]
fn test_skipped_numbers_are_free() {
    let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).expect("writer");
    let root = writer
        .add_object_at(
            dict([("Type", PDFObject::name("Catalog"))]),
            PDFObjRef::new(4, 0),
        )
        .expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    let data = writer.into_inner();

    let doc = PDFDocument::new(&data).expect("reopen");
    assert_eq!(doc.size(), 5);
    for objid in 1..4 {
        assert!(doc.xref_entry(objid).is_some_and(|e| e.is_free()));
    }
    assert!(doc.catalog().is_ok());
}

#[test]
fn test_names_outside_latin1_round_trip() {
    let names = ["\u{20ac}uro", "caf\u{e9}", "\u{c3}\u{a9}", "\u{65e5}\u{672c} Font"];
    let mut writer = PdfWriter::new(Vec::new(), WriteOptions::default()).expect("writer");
    let values = PDFObject::Array(names.iter().map(|&n| PDFObject::name(n)).collect());
    let holder = writer
        .add_object(dict([("\u{20ac}Key", values.clone())]))
        .expect("holder");
    let root = writer
        .add_object(dict([("Type", PDFObject::name("Catalog"))]))
        .expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    let data = writer.into_inner();

    let doc = PDFDocument::new(&data).expect("reopen");
    let holder = doc.get_object(holder.objid).expect("holder");
    assert_eq!(holder.as_dict().expect("dict").get("\u{20ac}Key"), Some(&values));
}
