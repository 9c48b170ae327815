//! Object streams (`/Type /ObjStm`).
//!
//! The decoded body starts with `N` pairs of `objid offset`, followed at
//! `/First` by the packed objects themselves.

use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObject};
use crate::parser::pdf_parser::PDFParser;

/// A decoded object stream, ready for member lookups.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    objid: u32,
    data: Vec<u8>,
    first: usize,
    members: Vec<(u32, usize)>,
}

impl ObjectStream {
    /// Index a container from its dictionary and decoded data.
    pub fn parse(objid: u32, attrs: &Dictionary, data: Vec<u8>) -> Result<Self> {
        let field = |key: &str| -> Result<usize> {
            attrs
                .get(key)
                .ok_or_else(|| PdfError::SyntaxError(format!("missing {key} in ObjStm {objid}")))?
                .as_usize()
        };
        let n = field("N")?;
        let first = field("First")?;
        if first > data.len() {
            return Err(PdfError::MalformedObject {
                objid,
                offset: first,
                msg: format!("First beyond decoded length {}", data.len()),
            });
        }

        let mut header = PDFParser::new(&data[..first]);
        let mut members = Vec::with_capacity(n.min(4096));
        for _ in 0..n {
            let pair = header
                .parse_object()
                .and_then(|o| o.as_int())
                .and_then(|id| Ok((id, header.parse_object()?.as_usize()?)));
            match pair {
                Ok((id, offset)) => match u32::try_from(id) {
                    Ok(id) => members.push((id, offset)),
                    Err(_) => break,
                },
                Err(err) => {
                    tracing::warn!(objid, error = %err, found = members.len(), expected = n, "ObjStm header truncated");
                    break;
                }
            }
        }

        Ok(Self {
            objid,
            data,
            first,
            members,
        })
    }

    pub const fn objid(&self) -> u32 {
        self.objid
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Object numbers in header order.
    pub fn member_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().map(|&(id, _)| id)
    }

    /// Position of `objid` in the header.
    pub fn position_of(&self, objid: u32) -> Option<usize> {
        self.members.iter().position(|&(id, _)| id == objid)
    }

    /// Parse the member at `index`, returning its object number too.
    pub fn get(&self, index: usize, max_depth: usize) -> Result<(u32, PDFObject)> {
        let &(id, offset) = self.members.get(index).ok_or_else(|| PdfError::MalformedObject {
            objid: self.objid,
            offset: index,
            msg: format!("index {index} outside ObjStm of {} members", self.members.len()),
        })?;
        let start = self.first + offset;
        if start > self.data.len() {
            return Err(PdfError::MalformedObject {
                objid: self.objid,
                offset: start,
                msg: format!("member {id} starts beyond decoded data"),
            });
        }
        let obj = PDFParser::at(&self.data, start)
            .with_max_depth(max_depth)
            .parse_object()?;
        Ok((id, obj))
    }
}

/// Packs serialized objects into an object stream body.
#[derive(Debug, Clone, Default)]
pub struct ObjectStreamBuilder {
    members: Vec<(u32, Vec<u8>)>,
}

impl ObjectStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one object's serialized value (no `obj`/`endobj` wrapper).
    pub fn push(&mut self, objid: u32, serialized: Vec<u8>) {
        self.members.push((objid, serialized));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Finish the container. Returns its dictionary (without `/Length` or
    /// filters), the uncompressed body and the member numbers in order.
    pub fn build(self) -> (Dictionary, Vec<u8>, Vec<u32>) {
        let mut header = Vec::new();
        let mut body = Vec::new();
        let mut ids = Vec::with_capacity(self.members.len());
        for (objid, bytes) in self.members {
            if !header.is_empty() {
                header.push(b' ');
            }
            header.extend_from_slice(format!("{objid} {}", body.len()).as_bytes());
            body.extend_from_slice(&bytes);
            body.push(b'\n');
            ids.push(objid);
        }
        header.push(b'\n');

        let mut attrs = Dictionary::new();
        attrs.insert("Type".into(), PDFObject::name("ObjStm"));
        attrs.insert("N".into(), PDFObject::Int(ids.len() as i64));
        attrs.insert("First".into(), PDFObject::Int(header.len() as i64));

        header.extend_from_slice(&body);
        (attrs, header, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output_parses_back() {
        let mut builder = ObjectStreamBuilder::new();
        builder.push(11, b"<</A 1>>".to_vec());
        builder.push(12, b"[1 2 3]".to_vec());
        builder.push(15, b"(text)".to_vec());
        let (attrs, body, ids) = builder.build();
        assert_eq!(ids, vec![11, 12, 15]);
        assert_eq!(
            String::from_utf8_lossy(&body),
            "11 0 12 9 15 17\n<</A 1>>\n[1 2 3]\n(text)\n"
        );

        let stm = ObjectStream::parse(40, &attrs, body).unwrap();
        assert_eq!(stm.len(), 3);
        assert_eq!(stm.position_of(12), Some(1));
        let (id, obj) = stm.get(1, 16).unwrap();
        assert_eq!(id, 12);
        assert_eq!(obj.as_array().unwrap().len(), 3);
        assert_eq!(stm.get(2, 16).unwrap().1, PDFObject::string(b"text".to_vec()));
    }

    #[test]
    fn index_out_of_range_is_malformed() {
        let mut attrs = Dictionary::new();
        attrs.insert("N".into(), PDFObject::Int(1));
        attrs.insert("First".into(), PDFObject::Int(4));
        let stm = ObjectStream::parse(3, &attrs, b"7 0 true".to_vec()).unwrap();
        assert_eq!(stm.get(0, 16).unwrap(), (7, PDFObject::Bool(true)));
        assert!(matches!(
            stm.get(1, 16),
            Err(PdfError::MalformedObject { objid: 3, .. })
        ));
    }
}
