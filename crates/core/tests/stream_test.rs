//! Stream extents and filter decoding through the document API.

mod common;

use common::RawPdf;
use folio_core::codec::{PngFilter, PredictorParams, apply_predictor, decode_filter, flateencode, png_encode};
use folio_core::model::{Dictionary, PDFObject};
use folio_core::{PDFDocument, PdfError};

fn open_single_stream(dict_extra: &str, content: &[u8], declared: usize) -> PDFDocument {
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog >>");
    pdf.stream_object(2, dict_extra, content, declared);
    pdf.xref("/Root 1 0 R");
    PDFDocument::new(pdf.bytes()).expect("open")
}

fn stream_bytes(doc: &PDFDocument, objid: u32, decode: bool) -> Vec<u8> {
    let obj = doc.getobj(objid).expect("stream object");
    let stream = obj.as_stream().expect("is stream");
    doc.get_stream_bytes(stream, decode).expect("bytes").to_vec()
}

#[test]
fn test_declared_length_trusted_when_consistent() {
    let doc = open_single_stream("", b"exact content", 13);
    assert_eq!(stream_bytes(&doc, 2, false), b"exact content");
}

#[test]
fn test_length_five_bytes_short_recovers_full_content() {
    let content = b"q 1 0 0 1 72 720 cm BT (full content) Tj ET Q";
    let doc = open_single_stream("", content, content.len() - 5);
    assert_eq!(stream_bytes(&doc, 2, false), content);
}

#[test]
fn test_length_too_long_recovers() {
    let content = b"short";
    let doc = open_single_stream("", content, 500);
    assert_eq!(stream_bytes(&doc, 2, false), content);
}

#[test]
fn test_missing_endstream_recovered_from_endobj() {
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog >>");
    pdf.raw_object(2, 0, b"<< /Length 3 >>\nstream\nabcdefgh\nendobj");
    pdf.xref("/Root 1 0 R");
    let doc = PDFDocument::new(pdf.bytes()).expect("open");
    assert_eq!(stream_bytes(&doc, 2, false), b"abcdefgh");
}

#[test]
fn test_indirect_length() {
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog >>");
    pdf.raw_object(2, 0, b"<< /Length 3 0 R >>\nstream\nstream\nbody\nendstream");
    pdf.object(3, "11");
    pdf.xref("/Root 1 0 R");
    let doc = PDFDocument::new(pdf.bytes()).expect("open");
    assert_eq!(stream_bytes(&doc, 2, false), b"stream\nbody");
}

#[test]
fn test_filter_chain_decodes_in_order() {
    let plain = b"layered filters".repeat(4);
    let deflated = flateencode(&plain).expect("deflate");
    let hex: String = hex::encode(&deflated);
    let mut content = hex.into_bytes();
    content.push(b'>');

    let doc = open_single_stream(
        "/Filter [/ASCIIHexDecode /FlateDecode]",
        &content,
        content.len(),
    );
    assert_eq!(stream_bytes(&doc, 2, true), plain);
    // raw bytes stay encoded
    assert_eq!(stream_bytes(&doc, 2, false), content);
}

#[test]
fn test_unfiltered_bytes_share_document_buffer() {
    let doc = open_single_stream("", b"zero copy", 9);
    let obj = doc.getobj(2).expect("stream");
    let stream = obj.as_stream().expect("is stream");
    let bytes = doc.get_stream_bytes(stream, true).expect("bytes");
    let base = doc.bytes().as_ptr() as usize;
    let ptr = bytes.as_ptr() as usize;
    assert!(ptr >= base && ptr + bytes.len() <= base + doc.bytes().len());
}

#[test]
fn test_unsupported_filter_is_scoped_to_stream() {
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog >>");
    pdf.stream_object(2, "/Filter /JBIG2Decode", b"opaque", 6);
    pdf.stream_object(3, "/Filter /AHx", b"6869>", 5);
    pdf.xref("/Root 1 0 R");
    let doc = PDFDocument::new(pdf.bytes()).expect("open");

    let obj = doc.getobj(2).expect("stream");
    let err = doc
        .get_stream_bytes(obj.as_stream().expect("is stream"), true)
        .expect_err("unsupported");
    assert!(matches!(err, PdfError::UnsupportedFilter(ref name) if name == "JBIG2Decode"));
    assert!(err.is_recoverable());
    assert_eq!(stream_bytes(&doc, 3, true), b"hi");
}

#[test]
fn test_malformed_ascii85_fails_decode() {
    let doc = open_single_stream("/Filter /ASCII85Decode", b"ab\x7fcd~>", 7);
    let obj = doc.getobj(2).expect("stream");
    let err = doc
        .get_stream_bytes(obj.as_stream().expect("is stream"), true)
        .expect_err("bad ascii85");
    assert!(matches!(err, PdfError::DecodeError(_)));
}

/// PNG Up encoding followed by the decoder restores the input for row
/// counts from 0 to N and widths that do not divide evenly.
#[test]
fn test_png_up_round_trip() {
    for columns in [1usize, 3, 5, 7, 13] {
        for rows in 0..=9usize {
            let data: Vec<u8> = (0..columns * rows)
                .map(|i| (i * 37 + rows * 11) as u8)
                .collect();
            let params = PredictorParams::png_up(columns);
            let encoded = png_encode(
                &data,
                params.row_bytes().expect("row size"),
                params.bytes_per_pixel().expect("pixel size"),
                PngFilter::Up,
            );
            assert_eq!(encoded.len(), rows * (columns + 1));
            let decoded = apply_predictor(&encoded, &params).expect("decode");
            assert_eq!(decoded, data, "columns={columns} rows={rows}");
        }
    }
}

#[test]
fn test_flate_with_predictor_through_filter() {
    let columns = 5;
    let data: Vec<u8> = (0u8..=96).collect();
    let params = PredictorParams::png_up(columns);
    let encoded = flateencode(&png_encode(&data, columns, 1, PngFilter::Up)).expect("deflate");
    let parms: Dictionary = params.to_dict();
    let decoded = decode_filter("FlateDecode", &encoded, Some(&parms)).expect("decode");
    // 97 bytes: the short final row comes back too
    assert_eq!(decoded, data);
}

/// Predictor parameters whose row size does not fit in memory fail that
/// stream only; the rest of the document is unaffected.
#[test]
fn test_oversized_predictor_row_fails_decode() {
    let encoded = flateencode(&[2, 1, 2, 3, 2, 4, 5, 6]).expect("deflate");
    let mut pdf = RawPdf::new();
    pdf.object(1, "<< /Type /Catalog >>");
    pdf.stream_object(
        2,
        "/Filter /FlateDecode /DecodeParms << /Predictor 12 /Colors 4 /Columns 4611686018427387903 >>",
        &encoded,
        encoded.len(),
    );
    pdf.stream_object(
        3,
        "/Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 4398046511104 >>",
        &encoded,
        encoded.len(),
    );
    pdf.object(4, "(intact)");
    pdf.xref("/Root 1 0 R");
    let doc = PDFDocument::new(pdf.bytes()).expect("open");

    let obj = doc.getobj(2).expect("stream");
    let err = doc
        .get_stream_bytes(obj.as_stream().expect("is stream"), true)
        .expect_err("row size overflows");
    assert!(matches!(err, PdfError::DecodeError(_)));
    assert!(err.is_recoverable());

    // a huge but representable width decodes the one short row it has
    assert_eq!(stream_bytes(&doc, 3, true), [1, 2, 3, 2, 4, 5, 6]);
    assert_eq!(doc.get_object(4).expect("object 4"), PDFObject::string(&b"intact"[..]));
}

#[test]
fn test_truncated_flate_keeps_prefix() {
    let plain = b"recoverable prefix of a deflate stream ".repeat(50);
    let mut deflated = flateencode(&plain).expect("deflate");
    deflated.truncate(deflated.len() / 2);
    let decoded = decode_filter("FlateDecode", &deflated, None).expect("partial");
    assert!(!decoded.is_empty());
    assert!(plain.starts_with(&decoded));
}

#[test]
fn test_decoded_stream_objects_compare_by_content() {
    let doc = open_single_stream("/Subtype /Form", b"same", 4);
    let a = doc.get_object(2).expect("stream");
    doc.release(2);
    let b = doc.get_object(2).expect("stream again");
    assert_eq!(a, b);
    assert!(matches!(a, PDFObject::Stream(_)));
}
