//! Row predictors (TIFF predictor 2 and the PNG filters).
//!
//! Applied after inflate/LZW when `/Predictor > 1`.

use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObject};

/// Predictor settings from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    /// Read settings, falling back to the defaults for absent or
    /// non-positive values.
    pub fn from_dict(parms: &Dictionary) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, default: usize| {
            parms
                .get(key)
                .and_then(|v| v.as_usize().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default)
        };
        Self {
            predictor: parms
                .get("Predictor")
                .and_then(|p| p.as_int().ok())
                .unwrap_or(defaults.predictor),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
            columns: positive("Columns", defaults.columns),
        }
    }

    /// PNG parameters for `columns` bytes per row (what xref streams use).
    pub const fn png_up(columns: usize) -> Self {
        Self {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns,
        }
    }

    /// Bytes per row, rounded up to a whole byte. The factors come from the
    /// file, so a product that does not fit is a decode error.
    pub fn row_bytes(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .and_then(|bits| bits.checked_mul(self.columns))
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| self.overflow())
    }

    /// Bytes per pixel, at least one.
    pub fn bytes_per_pixel(&self) -> Result<usize> {
        let bits = self
            .colors
            .checked_mul(self.bits_per_component)
            .ok_or_else(|| self.overflow())?;
        Ok(bits.div_ceil(8).max(1))
    }

    fn overflow(&self) -> PdfError {
        PdfError::DecodeError(format!(
            "predictor row size overflows: Colors {} BitsPerComponent {} Columns {}",
            self.colors, self.bits_per_component, self.columns
        ))
    }

    /// Write these settings into a `/DecodeParms` dictionary.
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".into(), PDFObject::Int(self.predictor));
        if self.colors != 1 {
            dict.insert("Colors".into(), PDFObject::Int(self.colors as i64));
        }
        if self.bits_per_component != 8 {
            dict.insert(
                "BitsPerComponent".into(),
                PDFObject::Int(self.bits_per_component as i64),
            );
        }
        dict.insert("Columns".into(), PDFObject::Int(self.columns as i64));
        dict
    }
}

/// PNG row filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PngFilter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

/// Undo the predictor described by `params`.
pub fn apply_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => tiff_decode(data, params),
        10..=15 => Ok(png_decode(data, params.row_bytes()?, params.bytes_per_pixel()?)),
        other => Err(PdfError::UnsupportedFilter(format!("predictor {other}"))),
    }
}

/// Reverse PNG filtering row by row.
///
/// A short final row is decoded as far as it goes, so the output is
/// everything the input describes. Row buffers never exceed the input.
pub fn png_decode(data: &[u8], row_bytes: usize, bpp: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    if row_bytes == 0 {
        return result;
    }
    let buffer = row_bytes.min(data.len());
    let mut prev_row = vec![0u8; buffer];
    let mut current_row = vec![0u8; buffer];

    for row in data.chunks(row_bytes.saturating_add(1)) {
        let Some((&filter_type, row_data)) = row.split_first() else {
            break;
        };
        let width = row_data.len();
        if width < row_bytes {
            tracing::warn!(
                expected = row_bytes,
                got = width,
                "PNG predictor: short final row"
            );
        }

        for i in 0..width {
            let left = if i >= bpp { current_row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                1 => left,
                2 => above,
                3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                4 => paeth_predictor(left, above, upper_left),
                // 0 and unknown types: no filtering
                _ => 0,
            };
            current_row[i] = row_data[i].wrapping_add(predicted);
        }

        result.extend_from_slice(&current_row[..width]);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    result
}

/// Apply PNG filtering with one filter type for every row.
pub fn png_encode(data: &[u8], row_bytes: usize, bpp: usize, filter: PngFilter) -> Vec<u8> {
    if row_bytes == 0 {
        return Vec::new();
    }
    let mut result = Vec::with_capacity(data.len() + data.len() / row_bytes + 1);
    let mut prev_row: &[u8] = &[];

    for row in data.chunks(row_bytes) {
        result.push(filter as u8);
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let above = prev_row.get(i).copied().unwrap_or(0);
            let upper_left = if i >= bpp {
                prev_row.get(i - bpp).copied().unwrap_or(0)
            } else {
                0
            };
            let predicted = match filter {
                PngFilter::None => 0,
                PngFilter::Sub => left,
                PngFilter::Up => above,
                PngFilter::Average => ((u16::from(left) + u16::from(above)) / 2) as u8,
                PngFilter::Paeth => paeth_predictor(left, above, upper_left),
            };
            result.push(byte.wrapping_sub(predicted));
        }
        prev_row = row;
    }

    result
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i16;
    let b = above as i16;
    let c = upper_left as i16;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// TIFF predictor 2: horizontal differencing per component.
fn tiff_decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_bytes = params.row_bytes()?;
    let colors = params.colors;
    let mut out = data.to_vec();
    if row_bytes == 0 {
        return Ok(out);
    }

    match params.bits_per_component {
        8 => {
            for row in out.chunks_mut(row_bytes) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
        }
        16 => {
            for row in out.chunks_mut(row_bytes) {
                let stride = colors.saturating_mul(2);
                let mut i = stride;
                while i < row.len().saturating_sub(1) {
                    let prev = u16::from_be_bytes([row[i - stride], row[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    row[i..i + 2].copy_from_slice(&cur.wrapping_add(prev).to_be_bytes());
                    i += 2;
                }
            }
        }
        bits @ (1 | 2 | 4) => {
            let mask = (1u8 << bits) - 1;
            let per_row = colors.saturating_mul(params.columns);
            for row in out.chunks_mut(row_bytes) {
                let get = |row: &[u8], idx: usize| {
                    let bit = idx * bits;
                    (row[bit / 8] >> (8 - bits - bit % 8)) & mask
                };
                for idx in colors..per_row.min(row.len() * 8 / bits) {
                    let value = get(row, idx).wrapping_add(get(row, idx - colors)) & mask;
                    let bit = idx * bits;
                    let shift = 8 - bits - bit % 8;
                    row[bit / 8] = (row[bit / 8] & !(mask << shift)) | (value << shift);
                }
            }
        }
        other => {
            return Err(PdfError::UnsupportedFilter(format!(
                "TIFF predictor with {other} bits per component"
            )));
        }
    }
    Ok(out)
}
