//! Document preparation: fillable fields, two signature slots and their
//! lock policies.
//!
//! Preparation runs once per workflow on the uploaded document and writes a
//! full save. Every later revision is appended to that baseline.
//!
//! ```text
//! raw PDF + [FieldSpec]
//!     ↓ validate (unique names, page range, geometry)
//!     ↓ one merged field/widget per spec, in input order
//!     ↓ SignatureA (Lock: Exclude B's fields + SignatureB)
//!     ↓ SignatureB (Lock: All)           both on the last page
//!     ↓ AcroForm created or extended, page /Annots extended
//!     ↓ full save
//! prepared PDF
//! ```

use crate::config::PreparationConfig;
use crate::editor::{load_acroform, store_acroform, DocumentEditor, FormFields};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::workflow::{FieldSpec, SignerRole};
use crate::writer::{
    AcroFormBuilder, AppearanceGenerator, ButtonAppearance, FieldKind, FieldWidgetBuilder,
    LockPolicy, SignatureFieldBuilder,
};
use std::collections::{BTreeMap, HashSet};

/// Lock policy carried by `role`'s signature field.
///
/// Signer A's signature locks everything except B's fields and B's
/// signature slot; signer B's signature locks everything.
pub fn lock_policy(role: SignerRole, fields: &[FieldSpec]) -> LockPolicy {
    match role {
        SignerRole::A => {
            let mut open: Vec<String> = fields
                .iter()
                .filter(|f| f.role == SignerRole::B)
                .map(|f| f.name.clone())
                .collect();
            open.push(SignerRole::B.signature_field().to_string());
            LockPolicy::Exclude(open)
        },
        SignerRole::B => LockPolicy::All,
    }
}

/// Adds the signable structure to a document.
#[derive(Debug, Clone, Default)]
pub struct PreparationEngine {
    config: PreparationConfig,
}

impl PreparationEngine {
    /// Create an engine with the given layout settings.
    pub fn new(config: PreparationConfig) -> Self {
        Self { config }
    }

    /// Layout settings in use.
    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    /// Add `fields` and the two signature slots to `document`.
    pub fn prepare(&self, document: &[u8], fields: &[FieldSpec]) -> Result<Vec<u8>> {
        let mut editor = DocumentEditor::from_bytes(document.to_vec())?;
        let pages = editor.page_refs()?;
        let last_page = *pages
            .last()
            .ok_or_else(|| Error::DocumentCorrupt("document has no pages".to_string()))?;
        self.validate(&editor, fields, pages.len())?;

        let da = self.config.default_appearance.as_str();
        let mut field_refs = Vec::with_capacity(fields.len() + 2);
        let mut annots_by_page: BTreeMap<usize, Vec<ObjectRef>> = BTreeMap::new();

        for spec in fields {
            let page_ref = pages[spec.page];
            let rect = spec.rect();
            let mut builder =
                FieldWidgetBuilder::new(&spec.name, spec.kind, rect, page_ref).with_default_appearance(da);
            if let Some(appearance) = button_appearance(&mut editor, spec.kind, rect) {
                builder = builder.with_button_appearance(appearance);
            }
            let field_ref = editor.add(builder.build());
            log::debug!(
                "field '{}' ({}, signer {}) -> {} on page {}",
                spec.name,
                spec.kind,
                spec.role,
                field_ref,
                spec.page
            );
            field_refs.push(field_ref);
            annots_by_page.entry(spec.page).or_default().push(field_ref);
        }

        for role in SignerRole::ALL {
            let signature = SignatureFieldBuilder::new(
                role.signature_field(),
                self.config.signature_rect(role),
                last_page,
            )
            .with_lock(lock_policy(role, fields))
            .build();
            let sig_ref = editor.add(signature);
            field_refs.push(sig_ref);
            annots_by_page.entry(pages.len() - 1).or_default().push(sig_ref);
        }

        let mut acroform = AcroFormBuilder::new().with_default_appearance(da);
        acroform.add_fields(field_refs);
        let form = match load_acroform(&editor)? {
            Some(mut existing) => {
                acroform.merge_into(&mut existing);
                existing
            },
            None => acroform.build(),
        };
        store_acroform(&mut editor, form)?;

        for (page_index, refs) in &annots_by_page {
            editor.add_page_annotations(pages[*page_index], refs)?;
        }

        let prepared = editor.save_full()?;
        log::info!(
            "prepared document: {} fields and 2 signature slots, {} -> {} bytes",
            fields.len(),
            document.len(),
            prepared.len()
        );
        Ok(prepared)
    }

    fn validate(&self, editor: &DocumentEditor, fields: &[FieldSpec], page_count: usize) -> Result<()> {
        let invalid = |field: &str, reason: String| Error::InvalidFieldSpec {
            field: field.to_string(),
            reason,
        };

        let existing: HashSet<String> = match FormFields::load(editor)? {
            Some(form) => form.names().map(str::to_string).collect(),
            None => HashSet::new(),
        };
        for role in SignerRole::ALL {
            if existing.contains(role.signature_field()) {
                return Err(invalid(
                    role.signature_field(),
                    "document already has this signature field".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for spec in fields {
            if spec.name.is_empty() {
                return Err(invalid(&spec.name, "field name is empty".to_string()));
            }
            if spec.name.contains('.') {
                return Err(invalid(&spec.name, "field name must not contain '.'".to_string()));
            }
            if SignerRole::ALL.iter().any(|r| r.signature_field() == spec.name) {
                return Err(invalid(&spec.name, "name is reserved for a signature field".to_string()));
            }
            if !seen.insert(spec.name.as_str()) || existing.contains(&spec.name) {
                return Err(invalid(&spec.name, "duplicate field name".to_string()));
            }
            if spec.page >= page_count {
                return Err(invalid(
                    &spec.name,
                    format!("page {} out of range (document has {})", spec.page, page_count),
                ));
            }
            let finite = [spec.x, spec.y, spec.width, spec.height].iter().all(|v| v.is_finite());
            if !finite || spec.width <= 0.0 || spec.height <= 0.0 {
                return Err(invalid(
                    &spec.name,
                    format!(
                        "bad geometry {}x{} at ({}, {})",
                        spec.width, spec.height, spec.x, spec.y
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Remove the interactive form and every widget annotation.
    pub fn strip_form(&self, document: &[u8]) -> Result<Vec<u8>> {
        let mut editor = DocumentEditor::from_bytes(document.to_vec())?;

        let mut catalog = editor.catalog()?;
        catalog.remove("AcroForm");
        catalog.remove("Perms");
        editor.set_catalog(catalog)?;

        let mut removed = 0;
        for page in editor.page_refs()? {
            let annots = editor.page_annotations(page)?;
            let before = annots.len();
            let mut kept = Vec::with_capacity(before);
            for annot in annots {
                let subtype = editor
                    .resolve(&annot)?
                    .as_dict()
                    .and_then(|d| d.get("Subtype"))
                    .and_then(Object::as_name)
                    .map(str::to_string);
                if subtype.as_deref() != Some("Widget") {
                    kept.push(annot);
                }
            }
            if kept.len() != before {
                removed += before - kept.len();
                editor.set_page_annotations(page, kept)?;
            }
        }

        log::info!("stripped form: {} widget annotations removed", removed);
        editor.save_full()
    }
}

fn button_appearance(
    editor: &mut DocumentEditor,
    kind: FieldKind,
    rect: [f64; 4],
) -> Option<ButtonAppearance> {
    let generator = AppearanceGenerator::for_rect(rect);
    let on = match kind {
        FieldKind::Text => return None,
        FieldKind::Checkbox => generator.checkbox_on(),
        FieldKind::Radio => generator.radio_on(),
    };
    Some(ButtonAppearance {
        on: editor.add(on),
        off: editor.add(generator.button_off()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::extract_fields;

    fn one_page_pdf() -> Vec<u8> {
        let objects = [
            "<</Type/Catalog/Pages 2 0 R>>",
            "<</Type/Pages/Kids[3 0 R]/Count 1>>",
            "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>",
        ];
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!("trailer\n<</Size {}/Root 1 0 R>>\nstartxref\n{}\n%%EOF\n", objects.len() + 1, xref)
                .as_bytes(),
        );
        pdf
    }

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("name", FieldKind::Text, SignerRole::A, 0, 72.0, 700.0, 200.0, 20.0),
            FieldSpec::new("agree", FieldKind::Checkbox, SignerRole::B, 0, 72.0, 650.0, 12.0, 12.0),
        ]
    }

    #[test]
    fn test_lock_policies() {
        assert_eq!(
            lock_policy(SignerRole::A, &specs()),
            LockPolicy::Exclude(vec!["agree".to_string(), "SignatureB".to_string()])
        );
        assert_eq!(lock_policy(SignerRole::B, &specs()), LockPolicy::All);
    }

    #[test]
    fn test_prepare_adds_fields_in_order() {
        let prepared = PreparationEngine::default().prepare(&one_page_pdf(), &specs()).unwrap();
        let editor = DocumentEditor::from_bytes(prepared).unwrap();
        let fields = extract_fields(&editor).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "agree", "SignatureA", "SignatureB"]);
        assert_eq!(fields[0].rect, Some([72.0, 700.0, 272.0, 720.0]));
        assert_eq!(fields[1].kind, Some(FieldKind::Checkbox));
        assert_eq!(fields[2].rect, Some([20.0, 20.0, 220.0, 70.0]));
        assert_eq!(fields[3].rect, Some([230.0, 20.0, 430.0, 70.0]));
        assert!(fields.iter().all(|f| f.page_index == Some(0)));

        let page = editor.page_refs().unwrap()[0];
        assert_eq!(editor.page_annotations(page).unwrap().len(), 4);
        let acroform = load_acroform(&editor).unwrap().unwrap();
        assert_eq!(acroform.get("DA").and_then(Object::as_text).as_deref(), Some("/Helv 10 Tf 0 g"));
    }

    #[test]
    fn test_prepare_rejects_bad_specs() {
        let engine = PreparationEngine::default();
        let mut out_of_range = specs();
        out_of_range[1].page = 1;
        assert!(matches!(
            engine.prepare(&one_page_pdf(), &out_of_range),
            Err(Error::InvalidFieldSpec { ref field, .. }) if field == "agree"
        ));

        let mut duplicate = specs();
        duplicate[1].name = "name".to_string();
        assert!(matches!(
            engine.prepare(&one_page_pdf(), &duplicate),
            Err(Error::InvalidFieldSpec { .. })
        ));

        let mut reserved = specs();
        reserved[0].name = "SignatureB".to_string();
        assert!(engine.prepare(&one_page_pdf(), &reserved).is_err());
    }

    #[test]
    fn test_prepare_rejects_non_pdf() {
        let err = PreparationEngine::default().prepare(b"hello", &specs()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Structural);
    }

    #[test]
    fn test_prepared_document_cannot_be_prepared_again() {
        let engine = PreparationEngine::default();
        let prepared = engine.prepare(&one_page_pdf(), &specs()).unwrap();
        assert!(matches!(
            engine.prepare(&prepared, &[]),
            Err(Error::InvalidFieldSpec { ref field, .. }) if field == "SignatureA"
        ));
    }

    #[test]
    fn test_strip_form_allows_reauthoring() {
        let engine = PreparationEngine::default();
        let prepared = engine.prepare(&one_page_pdf(), &specs()).unwrap();
        let stripped = engine.strip_form(&prepared).unwrap();

        let editor = DocumentEditor::from_bytes(stripped.clone()).unwrap();
        assert!(load_acroform(&editor).unwrap().is_none());
        assert!(editor.page_annotations(editor.page_refs().unwrap()[0]).unwrap().is_empty());
        assert!(engine.prepare(&stripped, &specs()).is_ok());
    }
}
