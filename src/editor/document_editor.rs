//! Object-level document editing with full and incremental saves.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{hex_upper, ObjectSerializer};
use crate::xref::find_startxref;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Editor over a parsed document.
///
/// Changes are kept in an overlay keyed by object number; the source bytes
/// are never touched. Reads consult the overlay first, so code can freely
/// mix edited and original objects.
pub struct DocumentEditor {
    /// Source document (for reading)
    source: PdfDocument,
    /// Modified or added objects (object ID -> new object)
    modified: BTreeMap<u32, Object>,
    /// Next object ID to use for new objects
    next_object_id: u32,
}

/// Result of an incremental save.
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    /// The complete new file: original bytes followed by the update section
    pub bytes: Vec<u8>,
    /// Byte offset of each object written in the update section
    pub offsets: BTreeMap<u32, usize>,
}

impl DocumentEditor {
    /// Open a document held in memory for editing.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self::new(PdfDocument::from_bytes(data)?))
    }

    /// Wrap an already parsed document.
    pub fn new(source: PdfDocument) -> Self {
        let next_object_id = source.max_object_id() + 1;
        Self {
            source,
            modified: BTreeMap::new(),
            next_object_id,
        }
    }

    /// The unmodified source document.
    pub fn source(&self) -> &PdfDocument {
        &self.source
    }

    /// Check if any object has been changed or added.
    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Load an object, preferring the edited version.
    pub fn get(&self, id: u32) -> Result<Object> {
        match self.modified.get(&id) {
            Some(obj) => Ok(obj.clone()),
            None => self.source.load_object(id),
        }
    }

    /// Follow references (through the overlay) to a direct object.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..32 {
            match current {
                Object::Reference(r) => current = self.get(r.id)?,
                other => return Ok(other),
            }
        }
        match obj {
            Object::Reference(r) => Err(Error::CircularReference(*r)),
            other => Ok(other.clone()),
        }
    }

    /// Replace an existing object.
    pub fn set(&mut self, id: u32, obj: Object) {
        self.modified.insert(id, obj);
    }

    /// Add a new object, returning its reference.
    pub fn add(&mut self, obj: Object) -> ObjectRef {
        let id = self.next_object_id;
        self.next_object_id += 1;
        self.modified.insert(id, obj);
        ObjectRef::new(id, 0)
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.source.catalog_ref()
    }

    /// The catalog dictionary, including pending edits.
    pub fn catalog(&self) -> Result<Dict> {
        Ok(self.get(self.catalog_ref()?.id)?.expect_dict()?.clone())
    }

    /// Replace the catalog dictionary.
    pub fn set_catalog(&mut self, catalog: Dict) -> Result<()> {
        let id = self.catalog_ref()?.id;
        self.set(id, Object::Dictionary(catalog));
        Ok(())
    }

    /// Page references in document order.
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        self.source.page_refs()
    }

    /// Page size `(width, height)`.
    pub fn page_size(&self, page: ObjectRef) -> Result<(f64, f64)> {
        self.source.page_size(page)
    }

    /// Entries of a page's `/Annots` array (inline or indirect).
    pub fn page_annotations(&self, page: ObjectRef) -> Result<Vec<Object>> {
        let page_obj = self.get(page.id)?;
        match page_obj.expect_dict()?.get("Annots") {
            Some(annots) => Ok(self
                .resolve(annots)?
                .as_array()
                .cloned()
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Replace a page's annotations.
    ///
    /// When `/Annots` is an indirect array the array object is rewritten and
    /// the page is left untouched.
    pub fn set_page_annotations(&mut self, page: ObjectRef, annots: Vec<Object>) -> Result<()> {
        let mut page_obj = self.get(page.id)?;
        let indirect = page_obj
            .expect_dict()?
            .get("Annots")
            .and_then(|a| a.as_reference());
        match indirect {
            Some(array_ref) => self.set(array_ref.id, Object::Array(annots)),
            None => {
                let dict = page_obj.expect_dict_mut()?;
                if annots.is_empty() {
                    dict.remove("Annots");
                } else {
                    dict.insert("Annots".to_string(), Object::Array(annots));
                }
                self.set(page.id, page_obj);
            },
        }
        Ok(())
    }

    /// Append annotation references to a page.
    pub fn add_page_annotations(&mut self, page: ObjectRef, new: &[ObjectRef]) -> Result<()> {
        let mut annots = self.page_annotations(page)?;
        annots.extend(new.iter().map(|r| Object::Reference(*r)));
        self.set_page_annotations(page, annots)
    }

    fn generation(&self, id: u32) -> u16 {
        if self.modified.contains_key(&id) && id > self.source.max_object_id() {
            0
        } else {
            self.source.generation(id)
        }
    }

    fn file_id(&self) -> Object {
        match self.source.trailer().get("ID") {
            Some(id @ Object::Array(parts)) if parts.len() == 2 => id.clone(),
            _ => {
                let first = uuid::Uuid::new_v4();
                Object::Array(vec![
                    Object::String(first.as_bytes().to_vec()),
                    Object::String(first.as_bytes().to_vec()),
                ])
            },
        }
    }

    /// Rewrite the whole document.
    ///
    /// Only objects reachable from the trailer's /Root and /Info are written,
    /// so superseded revisions, object streams and xref streams are dropped.
    /// Every object is written uncompressed with a classic xref table.
    pub fn save_full(&self) -> Result<Vec<u8>> {
        let serializer = ObjectSerializer::compact();
        let trailer = self.source.trailer();

        let mut roots: Vec<ObjectRef> = vec![self.catalog_ref()?];
        if let Some(info) = trailer.get("Info").and_then(|i| i.as_reference()) {
            roots.push(info);
        }
        let reachable = self.reachable_objects(&roots)?;

        let mut out = format!("%PDF-{}\n", self.source.version()).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
        for (id, obj) in &reachable {
            let gen = self.generation(*id);
            offsets.insert(*id, (out.len(), gen));
            out.extend_from_slice(&serializer.serialize_indirect(*id, gen, obj));
        }

        let size = offsets.keys().next_back().map(|id| id + 1).unwrap_or(1);
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..size {
            match offsets.get(&id) {
                Some((offset, gen)) => {
                    out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes())
                },
                None => out.extend_from_slice(b"0000000000 00001 f \n"),
            }
        }

        let mut new_trailer = Dict::new();
        new_trailer.insert("Size".to_string(), Object::Integer(size as i64));
        new_trailer.insert("Root".to_string(), self.catalog_ref()?.into());
        if let Some(info) = roots.get(1) {
            new_trailer.insert("Info".to_string(), (*info).into());
        }
        new_trailer.insert("ID".to_string(), self.file_id());

        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(&serializer.serialize(&Object::Dictionary(new_trailer)));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "full save: {} objects, {} bytes",
            reachable.len(),
            out.len()
        );
        Ok(out)
    }

    fn reachable_objects(&self, roots: &[ObjectRef]) -> Result<BTreeMap<u32, Object>> {
        let mut found = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<u32> = roots.iter().map(|r| r.id).collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let obj = match self.get(id) {
                Ok(obj) => obj,
                Err(Error::ObjectNotFound(..)) => {
                    log::warn!("dangling reference to object {} dropped from full save", id);
                    continue;
                },
                Err(e) => return Err(e),
            };
            collect_references(&obj, &mut |r| {
                if !seen.contains(&r.id) {
                    queue.push_back(r.id);
                }
            });
            found.insert(id, obj);
        }
        Ok(found)
    }

    /// Append the overlay to the original bytes as an incremental update.
    ///
    /// The original bytes are copied unchanged (plus one newline when the
    /// file does not end with one), followed by the changed objects in
    /// object-number order, a classic xref section and a trailer whose
    /// /Prev points at the previous cross-reference section.
    pub fn save_incremental(&self) -> Result<IncrementalUpdate> {
        let serializer = ObjectSerializer::compact();
        let original = self.source.data();
        let prev = find_startxref(original)?;

        let mut out = Vec::with_capacity(original.len() + 4096);
        out.extend_from_slice(original);
        if !original.ends_with(b"\n") {
            out.push(b'\n');
        }

        let mut offsets = BTreeMap::new();
        for (id, obj) in &self.modified {
            offsets.insert(*id, out.len());
            out.extend_from_slice(&serializer.serialize_indirect(*id, self.generation(*id), obj));
        }

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n");
        for run in consecutive_runs(offsets.keys().copied()) {
            out.extend_from_slice(format!("{} {}\n", run[0], run.len()).as_bytes());
            for id in run {
                let offset = offsets.get(&id).copied().unwrap_or(0);
                out.extend_from_slice(
                    format!("{:010} {:05} n \n", offset, self.generation(id)).as_bytes(),
                );
            }
        }

        let size = self
            .next_object_id
            .max(self.source.max_object_id() + 1);
        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        trailer.insert("Root".to_string(), self.catalog_ref()?.into());
        if let Some(info) = self.source.trailer().get("Info") {
            trailer.insert("Info".to_string(), info.clone());
        }
        trailer.insert("ID".to_string(), self.file_id());
        trailer.insert("Prev".to_string(), Object::Integer(prev as i64));

        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "incremental save: {} objects appended after byte {}",
            offsets.len(),
            original.len()
        );
        Ok(IncrementalUpdate { bytes: out, offsets })
    }
}

/// Call `visit` for every indirect reference inside `obj`.
pub fn collect_references(obj: &Object, visit: &mut impl FnMut(ObjectRef)) {
    match obj {
        Object::Reference(r) => visit(*r),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, visit)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            dict.values().for_each(|value| collect_references(value, visit))
        },
        _ => {},
    }
}

fn consecutive_runs(ids: impl Iterator<Item = u32>) -> Vec<Vec<u32>> {
    let mut runs: Vec<Vec<u32>> = Vec::new();
    for id in ids {
        match runs.last_mut() {
            Some(run) if run.last().map(|last| last + 1) == Some(id) => run.push(id),
            _ => runs.push(vec![id]),
        }
    }
    runs
}

/// Debug summary of the ID array, used in log lines.
pub fn describe_file_id(trailer: &Dict) -> Option<String> {
    trailer
        .get("ID")
        .and_then(|id| id.as_array())
        .and_then(|parts| parts.first())
        .and_then(|first| first.as_string())
        .map(hex_upper)
}
