//! Flate (zlib/deflate) codec.

use crate::error::{PdfError, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::io::{Read, Write};

/// Inflate zlib data.
///
/// A damaged stream is retried with a byte-at-a-time decoder that keeps
/// everything produced before the failure point. Only when that recovers
/// nothing is the stream reported as undecodable.
pub fn flatedecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decompressed = Vec::with_capacity(data.len() * 3);
    match ZlibDecoder::new(data).read_to_end(&mut decompressed) {
        Ok(_) => Ok(decompressed),
        Err(err) => {
            let recovered = decompress_corrupted(data);
            if recovered.is_empty() {
                return Err(PdfError::DecodeError(format!("flate: {err}")));
            }
            tracing::warn!(
                error = %err,
                recovered = recovered.len(),
                "flate stream damaged, keeping partial output"
            );
            Ok(recovered)
        }
    }
}

/// Best-effort zlib decompression for corrupted streams.
///
/// Feeds the decoder one input byte at a time so that output produced
/// before a checksum error or truncation is not lost.
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..=i], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        // output buffer full: drain before feeding more input
        if consumed == 0 && produced == buf.len() {
            continue;
        }
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// Deflate `data` into a zlib stream.
pub fn flateencode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
