use lopdf::{dictionary, Document, Object, ObjectId};
use std::path::Path;

use super::ExportError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

/// Builds a new PDF out of single pages taken from other documents.
pub struct PageAssembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PageAssembler {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kids.is_empty()
    }

    /// Copy page `page_number` (1-based) of `source` to the end of the output.
    /// `source` is consumed because its objects are renumbered and moved.
    pub fn append_page(
        &mut self,
        mut source: Document,
        source_path: &Path,
        page_number: u32,
    ) -> Result<(), ExportError> {
        let page_id = page_id(&source, source_path, page_number)?;
        inline_inherited_attributes(&mut source, page_id)?;

        source.renumber_objects_with(self.doc.max_id + 1);
        let page_id = self::page_id(&source, source_path, page_number)?;

        self.doc.max_id = source.max_id;
        self.doc.objects.extend(source.objects);
        self.doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)?
            .set("Parent", self.pages_id);
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Write the assembled document. Objects left over from the source
    /// documents that no copied page refers to are pruned first.
    pub fn save(mut self, path: &Path) -> Result<usize, ExportError> {
        let count = self.kids.len();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.prune_objects();
        self.doc.compress();
        self.doc.save(path).map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(count)
    }
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn page_id(doc: &Document, path: &Path, page_number: u32) -> Result<ObjectId, ExportError> {
    doc.get_pages()
        .get(&page_number)
        .copied()
        .ok_or_else(|| ExportError::PageOutOfRange {
            path: path.to_path_buf(),
            page_number,
        })
}

/// Copy inherited attributes onto the page itself so it renders the same
/// once it hangs off a different parent.
fn inline_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> Result<(), ExportError> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(parent_id) = parent {
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                break;
            }
            let node = match doc.get_dictionary(parent_id) {
                Ok(node) => node,
                Err(_) => break,
            };
            for key in INHERITABLE {
                if page.has(key) || inherited.iter().any(|(k, _)| *k == key) {
                    continue;
                }
                if let Ok(value) = node.get(key) {
                    inherited.push((key, value.clone()));
                }
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }
    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in inherited {
        page.set(key.to_vec(), value);
    }
    Ok(())
}
