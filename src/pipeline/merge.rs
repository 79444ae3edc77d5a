//! PDF concatenation: many per-record streams → one document.
//!
//! Each source page is deep-copied with every object it references (content
//! streams, fonts, images) into a fresh document whose page tree is rebuilt
//! from scratch. Source page trees are never copied: the `Parent` link of a
//! page is dropped and the attributes a page may inherit from its ancestors
//! are resolved onto the page itself first.

use crate::error::ReportError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Deep-copies objects from one source document into the target, keeping a
/// source → target id map so shared objects are copied once.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    /// Reserve target ids for every page up front, so references reaching a
    /// page through another object (link destinations, annotation `/P`)
    /// land on the page copied into the tree.
    fn reserve_pages(&mut self, page_ids: &[ObjectId]) {
        for &page_id in page_ids {
            self.reserve(page_id);
        }
    }

    /// Copy a page under `parent`, flattening inherited attributes.
    fn copy_page(&mut self, page_id: ObjectId, parent: ObjectId) -> Result<ObjectId, lopdf::Error> {
        let new_id = match self.id_map.get(&page_id) {
            Some(id) => *id,
            None => self.reserve(page_id),
        };

        let mut page = self.source.get_dictionary(page_id)?.clone();
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(self.source, &page, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }
        page.remove(b"Parent");

        self.remap_dict(&mut page)?;
        page.set("Parent", Object::Reference(parent));
        self.target.objects.insert(new_id, Object::Dictionary(page));
        Ok(new_id)
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(id) = self.id_map.get(&source_id) {
            return Ok(*id);
        }
        // Reserve before recursing so reference cycles terminate.
        let new_id = self.reserve(source_id);
        let obj = self.source.get_object(source_id)?.clone();
        let obj = self.remap(obj)?;
        self.target.objects.insert(new_id, obj);
        Ok(new_id)
    }

    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);
        new_id
    }

    fn remap(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        Ok(match obj {
            Object::Reference(id) => Object::Reference(self.copy_object(id)?),
            Object::Array(items) => Object::Array(
                items
                    .into_iter()
                    .map(|o| self.remap(o))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Object::Dictionary(mut dict) => {
                // A page outside the tree must not drag its source tree along.
                if is_page(&dict) {
                    dict.remove(b"Parent");
                }
                self.remap_dict(&mut dict)?;
                Object::Dictionary(dict)
            }
            Object::Stream(mut stream) => {
                self.remap_dict(&mut stream.dict)?;
                Object::Stream(stream)
            }
            other => other,
        })
    }

    fn remap_dict(&mut self, dict: &mut Dictionary) -> Result<(), lopdf::Error> {
        for (_, value) in dict.iter_mut() {
            let taken = std::mem::replace(value, Object::Null);
            *value = self.remap(taken)?;
        }
        Ok(())
    }
}

fn is_page(dict: &Dictionary) -> bool {
    dict.get(b"Type")
        .and_then(Object::as_name)
        .is_ok_and(|t| t == b"Page")
}

/// Walk the `Parent` chain looking for `key`.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut current = page.get(b"Parent").and_then(Object::as_reference).ok();
    // Bounded walk: malformed files can contain parent loops.
    for _ in 0..64 {
        let node = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Concatenate every page of every stream, in order, into a new PDF.
///
/// # Errors
/// - [`ReportError::NothingToMerge`] for an empty input.
/// - [`ReportError::PdfMerge`] when a stream cannot be parsed or copied; the
///   index points at the offending stream.
pub fn merge_streams<I, B>(streams: I) -> Result<Vec<u8>, ReportError>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut target = Document::with_version("1.7");
    let pages_id = target.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    let mut sources = 0usize;

    for (index, bytes) in streams.into_iter().enumerate() {
        sources += 1;
        let merge_err = |e: lopdf::Error| ReportError::PdfMerge {
            index,
            detail: e.to_string(),
        };
        let source = Document::load_mem(bytes.as_ref()).map_err(merge_err)?;

        // get_pages() is keyed by page number, so iteration is in page order.
        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        let mut copier = ObjectCopier::new(&source, &mut target);
        copier.reserve_pages(&page_ids);
        for page_id in page_ids {
            let new_id = copier.copy_page(page_id, pages_id).map_err(merge_err)?;
            kids.push(Object::Reference(new_id));
        }
    }

    if sources == 0 {
        return Err(ReportError::NothingToMerge);
    }
    debug!("Merged {} stream(s) into {} page(s)", sources, kids.len());

    let count = kids.len() as i64;
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    target
        .save_to(&mut out)
        .map_err(|e| ReportError::Internal(format!("Failed to write merged PDF: {e}")))?;
    Ok(out)
}

/// Number of pages in a PDF stream.
pub fn page_count(bytes: &[u8]) -> Result<usize, ReportError> {
    Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .map_err(|e| ReportError::PdfMerge {
            index: 0,
            detail: e.to_string(),
        })
}
