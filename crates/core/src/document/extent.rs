//! Stream extent resolution.
//!
//! The declared `/Length` is only trusted when `endstream` follows it.
//! Otherwise the data is delimited by scanning for the keywords.

use super::options::ExtentOptions;

const ENDSTREAM: &[u8] = b"endstream";
const ENDOBJ: &[u8] = b"endobj";

/// Byte range of a stream's raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamExtent {
    pub start: usize,
    pub end: usize,
    /// The declared length was missing or wrong.
    pub recovered: bool,
}

impl StreamExtent {
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Work out where the stream starting at `start` ends.
pub fn resolve_extent(
    data: &[u8],
    start: usize,
    declared: Option<usize>,
    opts: &ExtentOptions,
) -> StreamExtent {
    let start = start.min(data.len());
    if let Some(len) = declared
        && length_is_plausible(data, start, len, opts.lookahead)
    {
        return StreamExtent {
            start,
            end: start + len,
            recovered: false,
        };
    }

    let end = scan_for_end(data, start, opts.endobj_backtrack);
    let extent = StreamExtent {
        start,
        end: end.unwrap_or(start),
        recovered: true,
    };
    match end {
        Some(_) => tracing::warn!(
            offset = start,
            declared = ?declared,
            actual = extent.len(),
            "stream /Length rejected, extent recovered by scan"
        ),
        None => tracing::warn!(
            offset = start,
            "no endstream or endobj after stream, treating as empty"
        ),
    }
    extent
}

/// `endstream` must appear, after optional whitespace, within `lookahead`
/// bytes of `start + len`.
fn length_is_plausible(data: &[u8], start: usize, len: usize, lookahead: usize) -> bool {
    let Some(end) = start.checked_add(len).filter(|&end| end <= data.len()) else {
        return false;
    };
    let window = &data[end..data.len().min(end + lookahead + ENDSTREAM.len())];
    let skipped = window
        .iter()
        .take(lookahead)
        .take_while(|b| b.is_ascii_whitespace() || **b == 0)
        .count();
    window[skipped..].starts_with(ENDSTREAM)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn scan_for_end(data: &[u8], start: usize, backtrack: usize) -> Option<usize> {
    let body = &data[start..];
    let endstream = find(body, ENDSTREAM);
    let endobj = find(body, ENDOBJ);

    let raw_end = match (endstream, endobj) {
        (Some(es), Some(eo)) if eo < es => truncated_endstream(body, eo, backtrack),
        (Some(es), _) => es,
        (None, Some(eo)) => truncated_endstream(body, eo, backtrack),
        (None, None) => return None,
    };
    Some(start + trim_eol(body, raw_end))
}

/// `endobj` at `endobj` with no `endstream` before it: a writer may have cut
/// the keyword short. Look back for a prefix such as `endst`.
fn truncated_endstream(body: &[u8], endobj: usize, backtrack: usize) -> usize {
    let from = endobj.saturating_sub(backtrack);
    let region = &body[from..endobj];
    let mut end = region.len();
    while end > 0 && region[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let tail = &region[..end];
    (3..ENDSTREAM.len())
        .rev()
        .find(|&n| tail.ends_with(&ENDSTREAM[..n]))
        .map_or(endobj, |n| from + end - n)
}

/// Drop one EOL (CRLF, LF or CR) that precedes the end keyword.
fn trim_eol(body: &[u8], end: usize) -> usize {
    if end >= 2 && &body[end - 2..end] == b"\r\n" {
        end - 2
    } else if end >= 1 && matches!(body[end - 1], b'\n' | b'\r') {
        end - 1
    } else {
        end
    }
}
