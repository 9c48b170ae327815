//! Stream filter chain.
//!
//! `/Filter` is a name or an array of names applied in order; `/DecodeParms`
//! holds the matching parameter dictionaries by position.

use super::ascii85::{ascii85decode, asciihexdecode};
use super::flate::flatedecode;
use super::lzw::lzwdecode_with_earlychange;
use super::predictor::{PredictorParams, apply_predictor};
use super::runlength::rldecode;
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObject};
use smallvec::SmallVec;

/// One stage of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub name: String,
    pub parms: Option<Dictionary>,
}

pub type FilterChain = SmallVec<[FilterSpec; 2]>;

/// Build the chain from a stream's `/Filter` and `/DecodeParms` entries.
///
/// `resolve` turns indirect references into values; it is applied to the
/// two entries and to each array element.
pub fn filter_chain<F>(attrs: &Dictionary, mut resolve: F) -> Result<FilterChain>
where
    F: FnMut(&PDFObject) -> PDFObject,
{
    let mut flatten = |key: &str| -> Vec<PDFObject> {
        match attrs.get(key).map(&mut resolve) {
            None | Some(PDFObject::Null) => Vec::new(),
            Some(PDFObject::Array(items)) => items.iter().map(&mut resolve).collect(),
            Some(single) => vec![single],
        }
    };
    let names = flatten("Filter");
    let parms = flatten("DecodeParms");

    names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = match name {
                PDFObject::Name(name) => name,
                other => {
                    return Err(PdfError::TypeError {
                        expected: "filter name",
                        got: other.type_name(),
                    });
                }
            };
            let parms = match parms.get(idx) {
                Some(PDFObject::Dict(d)) => Some(d.clone()),
                _ => None,
            };
            Ok(FilterSpec { name, parms })
        })
        .collect()
}

/// Run `data` through every filter in `chain`.
pub fn apply_filters(data: &[u8], chain: &[FilterSpec]) -> Result<Vec<u8>> {
    let mut output = data.to_vec();
    for spec in chain {
        output = decode_filter(&spec.name, &output, spec.parms.as_ref())?;
    }
    Ok(output)
}

/// Decode one filter stage. Abbreviated inline-image names are accepted.
pub fn decode_filter(name: &str, data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    tracing::trace!(filter = name, len = data.len(), "decode filter");
    match name {
        "FlateDecode" | "Fl" => predict(flatedecode(data)?, parms),
        "LZWDecode" | "LZW" => {
            let early_change = parms
                .and_then(|p| p.get("EarlyChange"))
                .and_then(|v| v.as_int().ok())
                .unwrap_or(1);
            predict(lzwdecode_with_earlychange(data, early_change)?, parms)
        }
        "ASCIIHexDecode" | "AHx" => asciihexdecode(data),
        "ASCII85Decode" | "A85" => ascii85decode(data),
        "RunLengthDecode" | "RL" => rldecode(data),
        other => Err(PdfError::UnsupportedFilter(other.to_string())),
    }
}

fn predict(data: Vec<u8>, parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(parms) = parms else {
        return Ok(data);
    };
    let params = PredictorParams::from_dict(parms);
    if params.predictor <= 1 {
        return Ok(data);
    }
    apply_predictor(&data, &params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flate::flateencode;
    use crate::codec::predictor::{PngFilter, png_encode};

    fn attrs(filter: PDFObject, parms: Option<PDFObject>) -> Dictionary {
        let mut d = Dictionary::new();
        d.insert("Filter".into(), filter);
        if let Some(p) = parms {
            d.insert("DecodeParms".into(), p);
        }
        d
    }

    #[test]
    fn chain_pairs_parms_by_position() {
        let parms = PredictorParams::png_up(4).to_dict();
        let d = attrs(
            PDFObject::Array(vec![PDFObject::name("ASCIIHexDecode"), PDFObject::name("FlateDecode")]),
            Some(PDFObject::Array(vec![PDFObject::Null, PDFObject::Dict(parms.clone())])),
        );
        let chain = filter_chain(&d, PDFObject::clone).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].parms, None);
        assert_eq!(chain[1].parms, Some(parms));
    }

    #[test]
    fn hex_then_flate_with_predictor() {
        let plain: Vec<u8> = (0..32u8).collect();
        let predicted = png_encode(&plain, 4, 1, PngFilter::Up);
        let packed = flateencode(&predicted).unwrap();
        let mut hexed = hex::encode(&packed).into_bytes();
        hexed.push(b'>');

        let d = attrs(
            PDFObject::Array(vec![PDFObject::name("AHx"), PDFObject::name("Fl")]),
            Some(PDFObject::Array(vec![
                PDFObject::Null,
                PDFObject::Dict(PredictorParams::png_up(4).to_dict()),
            ])),
        );
        let chain = filter_chain(&d, PDFObject::clone).unwrap();
        assert_eq!(apply_filters(&hexed, &chain).unwrap(), plain);
    }

    #[test]
    fn unknown_filter_names_itself() {
        let err = decode_filter("JBIG2Decode", b"", None).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFilter(ref n) if n == "JBIG2Decode"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn non_name_filter_is_type_error() {
        let d = attrs(PDFObject::Int(3), None);
        assert!(matches!(
            filter_chain(&d, PDFObject::clone),
            Err(PdfError::TypeError { .. })
        ));
    }
}
