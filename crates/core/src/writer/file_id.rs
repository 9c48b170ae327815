//! File identifiers for the trailer `/ID` array.

use crate::model::PDFObject;
use std::time::{SystemTime, UNIX_EPOCH};

/// Digest source for one writer session. The counter lives here, not in
/// a process-wide static, so independent sessions never share state.
#[derive(Debug, Default)]
pub struct FileIdGenerator {
    counter: u64,
}

impl FileIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh 16-byte identifier. `output_len` mixes the document size in.
    pub fn next_id(&mut self, output_len: u64) -> [u8; 16] {
        self.counter += 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut ctx = md5::Context::new();
        ctx.consume(nanos.to_le_bytes());
        ctx.consume(std::process::id().to_le_bytes());
        ctx.consume(self.counter.to_le_bytes());
        ctx.consume((std::ptr::from_ref(self) as usize).to_le_bytes());
        ctx.consume(output_len.to_le_bytes());
        ctx.finalize().0
    }
}

/// The two-entry `/ID` array. The first entry is kept across revisions.
pub fn id_array(first: &[u8], second: &[u8]) -> PDFObject {
    PDFObject::Array(vec![
        PDFObject::hex_string(first.to_vec()),
        PDFObject::hex_string(second.to_vec()),
    ])
}
