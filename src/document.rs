//! Read-only access to a PDF held in memory.
//!
//! A [`PdfDocument`] owns the file bytes and the merged cross-reference
//! table. Objects are parsed on demand; decoded object streams are cached
//! because every object inside one would otherwise re-inflate it.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object_at;
use crate::xref::{parse_xref, CrossRefTable, XRefEntry};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MAX_RESOLVE_DEPTH: u32 = 32;

/// A parsed PDF document.
pub struct PdfDocument {
    data: Vec<u8>,
    version: String,
    xref: CrossRefTable,
    objstm_cache: Mutex<HashMap<u32, Arc<HashMap<u32, Object>>>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("bytes", &self.data.len())
            .field("objects", &self.xref.len())
            .finish()
    }
}

impl PdfDocument {
    /// Parse a document from its bytes.
    ///
    /// Encrypted documents are rejected: their strings and streams would
    /// need to be decrypted before any field can be read or rewritten.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = read_header(&data)?;
        let xref = parse_xref(&data)?;

        if xref.trailer().contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }
        if !xref.trailer().contains_key("Root") {
            return Err(Error::DocumentCorrupt("trailer has no /Root".to_string()));
        }

        log::debug!("opened PDF {} with {} xref entries", version, xref.len());
        Ok(Self {
            data,
            version,
            xref,
            objstm_cache: Mutex::new(HashMap::new()),
        })
    }

    /// The raw file bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the document, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Merged cross-reference table.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Newest trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// Highest object number in use or reserved by /Size.
    pub fn max_object_id(&self) -> u32 {
        let size = self
            .trailer()
            .get("Size")
            .and_then(|s| s.as_integer())
            .unwrap_or(0)
            .max(0) as u32;
        self.xref.max_id().max(size.saturating_sub(1))
    }

    /// Generation number recorded for an object (0 for compressed objects).
    pub fn generation(&self, id: u32) -> u16 {
        match self.xref.get(id) {
            Some(XRefEntry::Uncompressed { generation, .. }) => *generation,
            _ => 0,
        }
    }

    /// Load an indirect object by number.
    pub fn load_object(&self, id: u32) -> Result<Object> {
        match self.xref.get(id) {
            Some(XRefEntry::Uncompressed { offset, generation }) => {
                let (found, object) = parse_indirect_object_at(&self.data, *offset as usize)?;
                if found.id != id {
                    return Err(Error::DocumentCorrupt(format!(
                        "xref points object {} at offset {} but found object {}",
                        id, offset, found.id
                    )));
                }
                if found.gen != *generation {
                    log::warn!(
                        "object {} has generation {} but xref says {}",
                        id,
                        found.gen,
                        generation
                    );
                }
                Ok(object)
            },
            Some(XRefEntry::Compressed { stream_id, .. }) => {
                let objects = self.object_stream(*stream_id)?;
                objects
                    .get(&id)
                    .cloned()
                    .ok_or(Error::ObjectNotFound(id, 0))
            },
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(id, 0)),
        }
    }

    fn object_stream(&self, stream_id: u32) -> Result<Arc<HashMap<u32, Object>>> {
        if let Some(cached) = self.objstm_cache.lock().get(&stream_id) {
            return Ok(Arc::clone(cached));
        }
        let stream = match self.xref.get(stream_id) {
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                parse_indirect_object_at(&self.data, *offset as usize)?.1
            },
            _ => {
                return Err(Error::DocumentCorrupt(format!(
                    "object stream {} is not stored uncompressed",
                    stream_id
                )))
            },
        };
        let objects = Arc::new(parse_object_stream(&stream)?);
        self.objstm_cache
            .lock()
            .insert(stream_id, Arc::clone(&objects));
        Ok(objects)
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        let mut depth = 0;
        while let Object::Reference(r) = current {
            depth += 1;
            if depth > MAX_RESOLVE_DEPTH {
                return Err(Error::CircularReference(r));
            }
            current = self.load_object(r.id)?;
        }
        Ok(current)
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(|r| r.as_reference())
            .ok_or_else(|| Error::DocumentCorrupt("/Root is not an indirect reference".to_string()))
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dict> {
        let catalog = self.load_object(self.catalog_ref()?.id)?;
        Ok(catalog.expect_dict()?.clone())
    }

    /// Page object references in document order.
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let pages_ref = self
            .catalog()?
            .get("Pages")
            .and_then(|p| p.as_reference())
            .ok_or_else(|| Error::DocumentCorrupt("catalog has no /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(pages_ref, &mut pages, &mut visited)?;
        Ok(pages)
    }

    fn collect_pages(
        &self,
        node_ref: ObjectRef,
        pages: &mut Vec<ObjectRef>,
        visited: &mut HashSet<u32>,
    ) -> Result<()> {
        if !visited.insert(node_ref.id) {
            return Err(Error::CircularReference(node_ref));
        }
        let node = self.load_object(node_ref.id)?;
        let dict = node.expect_dict()?;

        match dict.get("Type").and_then(|t| t.as_name()) {
            Some("Page") => pages.push(node_ref),
            _ => {
                let kids = match dict.get("Kids") {
                    Some(kids) => self.resolve(kids)?,
                    // A node with neither /Type /Pages nor /Kids is a page
                    None => {
                        pages.push(node_ref);
                        return Ok(());
                    },
                };
                for kid in kids.as_array().map(|a| a.as_slice()).unwrap_or(&[]) {
                    if let Some(kid_ref) = kid.as_reference() {
                        self.collect_pages(kid_ref, pages, visited)?;
                    }
                }
            },
        }
        Ok(())
    }

    /// Number of pages.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_refs()?.len())
    }

    /// Page size `(width, height)` from the (possibly inherited) MediaBox.
    pub fn page_size(&self, page_ref: ObjectRef) -> Result<(f64, f64)> {
        let mut node = self.load_object(page_ref.id)?;
        for _ in 0..MAX_RESOLVE_DEPTH {
            let dict = node.expect_dict()?;
            if let Some(media_box) = dict.get("MediaBox") {
                let values: Vec<f64> = self
                    .resolve(media_box)?
                    .as_array()
                    .map(|a| a.iter().filter_map(|v| v.as_number()).collect())
                    .unwrap_or_default();
                if let [llx, lly, urx, ury] = values[..] {
                    return Ok(((urx - llx).abs(), (ury - lly).abs()));
                }
            }
            match dict.get("Parent").and_then(|p| p.as_reference()) {
                Some(parent) => node = self.load_object(parent.id)?,
                None => break,
            }
        }
        // US Letter, the PDF default user space
        Ok((612.0, 792.0))
    }
}

fn read_header(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(1024)];
    let marker = b"%PDF-";
    let pos = window
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&window[..window.len().min(8)]).to_string())
        })?;
    let version: String = window[pos + marker.len()..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| b as char)
        .collect();
    Ok(if version.is_empty() {
        "1.4".to_string()
    } else {
        version
    })
}
