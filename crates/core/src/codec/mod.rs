//! Codec modules for PDF stream filters.
//!
//! This module contains:
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `filters`: `/Filter` + `/DecodeParms` chains
//! - `flate`: zlib inflate/deflate
//! - `lzw`: LZW decompression
//! - `predictor`: TIFF and PNG row predictors
//! - `runlength`: Run-length decoding

pub mod ascii85;
pub mod filters;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use ascii85::{ascii85decode, asciihexdecode};
pub use filters::{FilterChain, FilterSpec, apply_filters, decode_filter, filter_chain};
pub use flate::{flatedecode, flateencode};
pub use lzw::{lzwdecode, lzwdecode_with_earlychange};
pub use predictor::{PngFilter, PredictorParams, apply_predictor, png_decode, png_encode};
pub use runlength::rldecode;
