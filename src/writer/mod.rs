//! PDF writing: object serialization and the dictionaries this crate adds
//! to documents.
//!
//! ## Architecture
//!
//! ```text
//! FieldSpec / signature slot
//!     ↓
//! [FieldWidgetBuilder] / [SignatureFieldBuilder] (merged field + widget dicts)
//! [AppearanceGenerator] (widget /AP streams)
//! [AcroFormBuilder] (document-level form dictionary)
//!     ↓
//! [ObjectSerializer] (objects → bytes, used by the editor's save paths)
//! ```

mod acroform;
mod appearance;
mod form_fields;
mod object_serializer;

pub use acroform::{mark_signed, AcroFormBuilder, SIG_FLAGS_APPEND_ONLY, SIG_FLAGS_SIGNATURES_EXIST};
pub use appearance::{font_size_from_da, AppearanceGenerator};
pub use form_fields::{
    ButtonAppearance, FieldFlags, FieldKind, FieldWidgetBuilder, LockPolicy,
    SignatureFieldBuilder, ANNOT_FLAG_PRINT,
};
pub use object_serializer::{hex_upper, ObjectSerializer};
