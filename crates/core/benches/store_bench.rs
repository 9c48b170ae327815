//! Benchmarks for opening documents and materializing objects.
//!
//! Documents are produced with `PdfWriter` in both cross-reference forms:
//! - `open`: header, xref chain and trailer
//! - `getobj`: every object once, cold cache
//! - `pages`: page lookup with inheritance, cached and partial

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use folio_core::model::Dictionary;
use folio_core::{
    PDFDocument, PDFObject, PDFStream, PageTreeWriter, PdfWriter, ReadOptions, TrailerInfo,
    WriteOptions,
};

/// Document with `pages` pages, each with its own content stream.
fn build_document(pages: u32, compressed: bool) -> Vec<u8> {
    let options = WriteOptions::default()
        .compress_xref(compressed)
        .compress_streams(compressed);
    let mut writer = PdfWriter::new(Vec::new(), options).expect("writer");
    let mut tree = PageTreeWriter::new(&mut writer, pages).expect("tree");

    let mut font = Dictionary::new();
    font.insert("Type".into(), PDFObject::name("Font"));
    font.insert("BaseFont".into(), PDFObject::name("Helvetica"));
    let font = writer.add_object(font).expect("font");

    for n in 1..=pages {
        let text = format!("BT /F1 12 Tf 72 720 Td (Page {n}) Tj ET\n").repeat(8);
        let contents = writer
            .add_object(PDFStream::new(Dictionary::new(), text.into_bytes()))
            .expect("contents");
        let mut fonts = Dictionary::new();
        fonts.insert("F1".into(), PDFObject::Ref(font));
        let mut resources = Dictionary::new();
        resources.insert("Font".into(), PDFObject::Dict(fonts));
        let mut page = Dictionary::new();
        page.insert("Contents".into(), PDFObject::Ref(contents));
        page.insert("Resources".into(), PDFObject::Dict(resources));
        tree.add_page(&mut writer, n, page).expect("page");
    }

    let mut attrs = Dictionary::new();
    attrs.insert(
        "MediaBox".into(),
        PDFObject::Array(vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()]),
    );
    let pages_ref = tree.finish(&mut writer, attrs).expect("pages");
    let mut catalog = Dictionary::new();
    catalog.insert("Type".into(), PDFObject::name("Catalog"));
    catalog.insert("Pages".into(), PDFObject::Ref(pages_ref));
    let root = writer.add_object(catalog).expect("catalog");
    writer.close(TrailerInfo::new(root)).expect("close");
    writer.into_inner()
}

fn forms() -> [(&'static str, bool); 2] {
    [("table", false), ("stream", true)]
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");

    for (form, compressed) in forms() {
        let data = build_document(500, compressed);
        group.bench_with_input(BenchmarkId::from_parameter(form), &data, |b, data| {
            b.iter(|| PDFDocument::new(black_box(data)).expect("open"))
        });
    }

    group.finish();
}

fn bench_getobj(c: &mut Criterion) {
    let mut group = c.benchmark_group("getobj");

    for (form, compressed) in forms() {
        let data = build_document(500, compressed);
        group.bench_with_input(BenchmarkId::new("all_objects", form), &data, |b, data| {
            b.iter(|| {
                let doc = PDFDocument::new(data).expect("open");
                for objid in doc.objids() {
                    let _ = black_box(doc.getobj(objid));
                }
            })
        });
    }

    group.finish();
}

fn bench_pages(c: &mut Criterion) {
    let mut group = c.benchmark_group("pages");
    let data = build_document(500, true);

    let doc = PDFDocument::new(&data).expect("open");
    group.bench_function("get_page_cached", |b| {
        b.iter(|| {
            for n in 1..=500 {
                black_box(doc.get_page(n).expect("page"));
            }
        })
    });

    let partial = PDFDocument::from_bytes_with(data.clone().into(), ReadOptions::default().partial(true))
        .expect("open");
    group.bench_function("get_page_partial", |b| {
        b.iter(|| black_box(partial.get_page(black_box(250)).expect("page")))
    });

    group.finish();
}

criterion_group!(benches, bench_open, bench_getobj, bench_pages);
criterion_main!(benches);
