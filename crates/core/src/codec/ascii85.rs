//! ASCII85 and ASCIIHex stream decoders.
//!
//! Both stop at their end-of-data marker (`~>` / `>`). Whitespace is
//! skipped; any other byte outside the alphabet fails the decode.

use crate::error::{PdfError, Result};

const fn is_white(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c')
}

/// Decode ASCII85-encoded data (PDF variant).
/// Handles: z-encoding, an optional `<~` prefix, whitespace, missing EOD.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    let mut result = Vec::with_capacity(data.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut filled = 0usize;

    for (pos, &byte) in data.iter().enumerate() {
        match byte {
            b'~' => break,
            b if is_white(b) => {}
            b'z' if filled == 0 => result.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[filled] = byte;
                filled += 1;
                if filled == 5 {
                    result.extend_from_slice(&decode_group(&group, pos)?);
                    filled = 0;
                }
            }
            _ => {
                return Err(PdfError::DecodeError(format!(
                    "invalid ASCII85 byte 0x{byte:02x} at {pos}"
                )));
            }
        }
    }

    match filled {
        0 => {}
        1 => {
            return Err(PdfError::DecodeError(
                "ASCII85 data ends with a single-character group".into(),
            ));
        }
        n => {
            group[n..].fill(b'u');
            let bytes = decode_group(&group, data.len())?;
            result.extend_from_slice(&bytes[..n - 1]);
        }
    }

    Ok(result)
}

fn decode_group(group: &[u8; 5], pos: usize) -> Result<[u8; 4]> {
    let value = group
        .iter()
        .fold(0u64, |acc, &b| acc * 85 + u64::from(b - b'!'));
    u32::try_from(value)
        .map(u32::to_be_bytes)
        .map_err(|_| PdfError::DecodeError(format!("ASCII85 group overflows at {pos}")))
}

/// Decode ASCIIHex-encoded data. An odd trailing digit is padded with 0.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for (pos, &byte) in data.iter().enumerate() {
        if byte == b'>' {
            break;
        }
        if is_white(byte) {
            continue;
        }
        let nibble = hex_nibble(byte).ok_or_else(|| {
            PdfError::DecodeError(format!("invalid ASCIIHex byte 0x{byte:02x} at {pos}"))
        })?;
        match pending.take() {
            Some(high) => result.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asciihex_decode_expected() {
        let data = b"48656c6c6f 20776f726c64>"; // "Hello world"
        assert_eq!(asciihexdecode(data).unwrap(), b"Hello world");
    }

    #[test]
    fn asciihex_rejects_garbage() {
        assert!(matches!(
            asciihexdecode(b"4G>"),
            Err(PdfError::DecodeError(_))
        ));
    }

    #[test]
    fn ascii85_decode_expected() {
        let data = b"<~87cURD]i,\"Ebo7~>";
        assert_eq!(ascii85decode(data).unwrap(), b"Hello World");
    }

    #[test]
    fn ascii85_z_and_partial_group() {
        // z = four zero bytes; "!!" encodes a single 0x00
        assert_eq!(ascii85decode(b"z!!~>").unwrap(), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn ascii85_rejects_out_of_range() {
        assert!(ascii85decode(b"abc{de~>").is_err());
        assert!(ascii85decode(b"ab!z~>").is_err());
    }
}
