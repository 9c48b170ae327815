//! LZW stream decoder using weezl crate.

use crate::error::Result;
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data (PDF variant: MSB first, 8-bit).
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW-encoded data with an `/EarlyChange` setting.
///
/// EarlyChange=1 (the default) widens codes one entry early, which is the
/// TIFF convention; EarlyChange=0 widens them when the table is full.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    // corrupt tails are common; keep whatever decoded
    if let Err(err) = decoder.into_vec(&mut output).decode(data).status {
        tracing::warn!(error = %err, decoded = output.len(), "LZW decode stopped early");
    }
    Ok(output)
}
