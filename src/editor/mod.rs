//! Editing existing PDF documents.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocument (read-only source)
//!     ↓
//! [DocumentEditor] (object overlay: set / add)
//!     ↓
//! Save Options:
//!   - Incremental update (append to original)
//!   - Full rewrite (reachable objects only)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_cosign::editor::{DocumentEditor, FormFields, FormFieldValue, fill_field};
//!
//! let mut editor = DocumentEditor::from_bytes(bytes)?;
//! let form = FormFields::load(&editor)?.ok_or(Error::MissingForm)?;
//! if let Some(field) = form.get("name") {
//!     fill_field(&mut editor, field, &FormFieldValue::Text("Alice".into()), "/Helv 10 Tf 0 g")?;
//! }
//! let update = editor.save_incremental()?;
//! ```

mod document_editor;
pub mod form_fields;

pub use document_editor::{collect_references, describe_file_id, DocumentEditor, IncrementalUpdate};
pub use form_fields::{
    extract_fields, fill_field, is_truthy, load_acroform, read_rect, set_read_only,
    store_acroform, FieldNode, FormFieldInfo, FormFieldValue, FormFields,
};
