//! Page-tree lookups.
//!
//! Pages are found by descending `Kids`, using each intermediate node's
//! `Count` to skip whole subtrees. Inheritable attributes are collected on
//! the way down. Every walk carries a visited set, so a tree that points
//! back at an ancestor is reported instead of looped over.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject};
use rustc_hash::FxHashSet;

/// Page attributes a page may take from its ancestors.
pub const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A located page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLookup {
    /// Reference to the page object.
    pub reference: PDFObjRef,
    /// Page dictionary with inherited attributes filled in.
    pub attrs: Dictionary,
}

fn is_pages_node(dict: &Dictionary) -> bool {
    match dict.get("Type") {
        Some(PDFObject::Name(name)) => name == "Pages",
        _ => dict.contains_key("Kids"),
    }
}

/// The root `/Pages` reference from the catalog.
fn root_pages(doc: &PDFDocument) -> Result<Option<PDFObjRef>> {
    let catalog = doc.catalog()?;
    match catalog.get("Pages") {
        Some(PDFObject::Ref(r)) => Ok(Some(*r)),
        Some(PDFObject::Null) | None => Ok(None),
        Some(other) => Err(PdfError::TypeError {
            expected: "ref",
            got: other.type_name(),
        }),
    }
}

fn fetch_dict(doc: &PDFDocument, reference: PDFObjRef) -> Result<Dictionary> {
    match doc.fetch_tree_node(reference.objid)? {
        PDFObject::Dict(dict) => Ok(dict),
        PDFObject::Null => Err(PdfError::ObjectNotFound(reference.objid)),
        other => Err(PdfError::TypeError {
            expected: "page tree dict",
            got: other.type_name(),
        }),
    }
}

/// Number of pages according to the root node's `Count`.
pub(crate) fn page_count(doc: &PDFDocument) -> Result<u32> {
    let Some(root) = root_pages(doc)? else {
        return Ok(0);
    };
    let dict = fetch_dict(doc, root)?;
    node_count(doc, &dict, &mut FxHashSet::default())
}

/// `Count` of an intermediate node, counting leaves when it is missing.
fn node_count(doc: &PDFDocument, dict: &Dictionary, visited: &mut FxHashSet<u32>) -> Result<u32> {
    if let Some(count) = dict.get("Count") {
        let count = doc.resolve(count)?.as_int()?;
        return Ok(u32::try_from(count).unwrap_or(0));
    }
    tracing::warn!("page tree node without Count, counting leaves");
    let mut total = 0u32;
    for kid in kid_refs(doc, dict)? {
        if !visited.insert(kid.objid) {
            return Err(PdfError::CircularReference(kid.objid));
        }
        let kid_dict = fetch_dict(doc, kid)?;
        total += if is_pages_node(&kid_dict) {
            node_count(doc, &kid_dict, visited)?
        } else {
            1
        };
    }
    Ok(total)
}

fn kid_refs(doc: &PDFDocument, dict: &Dictionary) -> Result<Vec<PDFObjRef>> {
    let Some(kids) = dict.get("Kids") else {
        return Ok(Vec::new());
    };
    let kids = doc.resolve(kids)?;
    Ok(kids
        .as_array()?
        .iter()
        .filter_map(|kid| match kid {
            PDFObject::Ref(r) => Some(*r),
            other => {
                tracing::warn!(got = other.type_name(), "non-reference page tree kid skipped");
                None
            }
        })
        .collect())
}

/// Find page `number` (1-indexed).
pub(crate) fn find_page(doc: &PDFDocument, number: u32) -> Result<PageLookup> {
    let count = page_count(doc)?;
    if number == 0 || number > count {
        return Err(PdfError::PageOutOfRange {
            requested: number,
            count,
        });
    }
    let Some(mut node) = root_pages(doc)? else {
        return Err(PdfError::PageOutOfRange {
            requested: number,
            count,
        });
    };

    let mut remaining = number - 1;
    let mut inherited = Dictionary::new();
    let mut visited = FxHashSet::default();

    'descend: loop {
        if !visited.insert(node.objid) {
            return Err(PdfError::CircularReference(node.objid));
        }
        let dict = fetch_dict(doc, node)?;
        for key in INHERITABLE {
            if let Some(value) = dict.get(key) {
                inherited.insert(key.to_string(), value.clone());
            }
        }

        for kid in kid_refs(doc, &dict)? {
            let kid_dict = fetch_dict(doc, kid)?;
            if is_pages_node(&kid_dict) {
                let size = node_count(doc, &kid_dict, &mut visited.clone())?;
                if remaining < size {
                    node = kid;
                    continue 'descend;
                }
                remaining -= size;
            } else if remaining == 0 {
                if visited.contains(&kid.objid) {
                    return Err(PdfError::CircularReference(kid.objid));
                }
                let mut attrs = kid_dict;
                for (key, value) in inherited {
                    attrs.entry(key).or_insert(value);
                }
                return Ok(PageLookup {
                    reference: kid,
                    attrs,
                });
            } else {
                remaining -= 1;
            }
        }

        return Err(PdfError::MalformedObject {
            objid: node.objid,
            offset: 0,
            msg: format!("page tree holds fewer pages than its Count of {count}"),
        });
    }
}
