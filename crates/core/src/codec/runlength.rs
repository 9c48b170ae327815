//! RunLength stream codec.

use crate::error::Result;

/// Decode RunLength-encoded data.
///
/// - Length byte 0-127: copy next (length + 1) bytes literally
/// - Length byte 128: end of data
/// - Length byte 129-255: repeat next byte (257 - length) times
///
/// Truncated input stops decoding with what was produced so far.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while let Some(&length) = data.get(i) {
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let count = usize::from(length) + 1;
                let Some(run) = data.get(i..i + count) else {
                    tracing::warn!(offset = i, "RunLength literal run truncated");
                    break;
                };
                result.extend_from_slice(run);
                i += count;
            }
            129..=255 => {
                let Some(&byte) = data.get(i) else {
                    tracing::warn!(offset = i, "RunLength repeat byte missing");
                    break;
                };
                i += 1;
                result.extend(std::iter::repeat_n(byte, 257 - usize::from(length)));
            }
        }
    }

    Ok(result)
}
