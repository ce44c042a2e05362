//! The per-signer signing round.
//!
//! One call to [`SigningEngine::sign`] turns the stored document into its
//! next revision:
//!
//! 1. the form must exist
//! 2. submitted values are written to their fields
//! 3. the requested fields are flagged read-only
//! 4. the role's signature slot must exist and be empty
//! 5. a signature dictionary with placeholders becomes the slot's value
//! 6. signer A's signature also certifies the document (DocMDP)
//! 7. the edits are appended as an incremental update
//! 8. the ByteRange is patched and the CMS signature inserted in place
//!
//! Every byte of the revision except the `/Contents` hex string is covered.

use crate::config::{SigningConfig, UnknownFieldPolicy};
use crate::editor::{
    fill_field, load_acroform, set_read_only, store_acroform, DocumentEditor, FormFieldValue,
    FormFields,
};
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::object::{Dict, Object};
use crate::signatures::{PdfSigner, SignOptions};
use crate::workflow::SignerRole;
use crate::writer::{mark_signed, FieldKind, LockPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const DEFAULT_APPEARANCE: &str = "/Helv 10 Tf 0 g";

/// Audit record of an applied signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    /// Role that signed
    pub role: SignerRole,
    /// Name written into the signature
    pub signer_name: String,
    /// Signing time written into the signature
    pub signing_time: DateTime<Utc>,
    /// Reason written into the signature
    pub reason: String,
}

/// Output of a signing round.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    /// The full new revision: previous bytes followed by the update
    pub bytes: Vec<u8>,
    /// What was signed
    pub signature: SignatureMetadata,
    /// Submitted values that were written into fields, by field name
    pub applied: BTreeMap<String, String>,
}

/// Applies one signer's values, locks and signature.
#[derive(Debug, Clone)]
pub struct SigningEngine {
    identities: Arc<IdentityProvider>,
    config: SigningConfig,
}

impl SigningEngine {
    /// Create an engine signing with `identities`.
    pub fn new(identities: Arc<IdentityProvider>, config: SigningConfig) -> Self {
        Self { identities, config }
    }

    /// Identities in use.
    pub fn identities(&self) -> &IdentityProvider {
        &self.identities
    }

    /// Settings in use.
    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Sign `document` as `role`.
    ///
    /// Text fields take the submitted string. Checkboxes are checked by
    /// `true`, `yes`, `on` or `1` (any case) and unchecked by anything else.
    /// Radio values and values aimed at signature fields are skipped with a
    /// warning. Names the form does not contain are handled per
    /// [`SigningConfig::unknown_fields`].
    pub fn sign(
        &self,
        document: &[u8],
        role: SignerRole,
        values: &BTreeMap<String, String>,
        fields_to_lock: &BTreeSet<String>,
    ) -> Result<SignedDocument> {
        let identity = self.identities.identity(role)?;
        let mut editor = DocumentEditor::from_bytes(document.to_vec())?;

        let acroform = load_acroform(&editor)?.ok_or(Error::MissingForm)?;
        let form = FormFields::load(&editor)?.ok_or(Error::MissingForm)?;
        let default_appearance = acroform
            .get("DA")
            .and_then(Object::as_text)
            .unwrap_or_else(|| DEFAULT_APPEARANCE.to_string());

        let mut applied = BTreeMap::new();
        for (name, raw) in values {
            let Some(field) = form.get(name) else {
                self.unknown_field(name)?;
                continue;
            };
            let Some(kind) = field.kind() else {
                log::warn!("field '{}' is not fillable, value ignored", name);
                continue;
            };
            if kind == FieldKind::Radio {
                log::warn!("radio field '{}' is not filled, value ignored", name);
                continue;
            }
            let value = FormFieldValue::parse(kind, raw);
            if fill_field(&mut editor, field, &value, &default_appearance)? {
                log::debug!("filled {} field '{}'", kind, name);
                applied.insert(name.clone(), raw.clone());
            }
        }

        for name in fields_to_lock {
            match form.get(name) {
                Some(field) => set_read_only(&mut editor, field)?,
                None => self.unknown_field(name)?,
            }
        }

        let slot_name = role.signature_field();
        let slot = form
            .get(slot_name)
            .filter(|f| f.is_signature())
            .ok_or_else(|| Error::MissingSignatureField(slot_name.to_string()))?;
        let mut slot_obj = editor.get(slot.reference.id)?;
        if slot_obj.expect_dict()?.contains_key("V") {
            return Err(Error::AlreadySigned(slot_name.to_string()));
        }

        let signing_time = Utc::now();
        let mut options = SignOptions::default()
            .with_name(role.display_name())
            .with_reason(self.config.reason.clone())
            .with_reserved_size(self.config.reserved_signature_size);
        if role == SignerRole::A {
            options = options.with_docmdp(self.config.docmdp_permission);
        }
        let signer = PdfSigner::new(identity.credentials.clone(), options);

        let sig_ref = editor.add(Object::Dictionary(signer.build_signature_dictionary(signing_time)));
        slot_obj.expect_dict_mut()?.insert("V".to_string(), sig_ref.into());
        editor.set(slot.reference.id, slot_obj);

        if role == SignerRole::A {
            let mut catalog = editor.catalog()?;
            let mut perms = match catalog.get("Perms") {
                Some(p) => editor.resolve(p)?.as_dict().cloned().unwrap_or_default(),
                None => Dict::new(),
            };
            perms.insert("DocMDP".to_string(), sig_ref.into());
            catalog.insert("Perms".to_string(), Object::Dictionary(perms));
            editor.set_catalog(catalog)?;
        }

        let mut acroform = load_acroform(&editor)?.ok_or(Error::MissingForm)?;
        mark_signed(&mut acroform);
        store_acroform(&mut editor, acroform)?;

        let update = editor.save_incremental()?;
        let sig_offset = *update.offsets.get(&sig_ref.id).ok_or_else(|| {
            Error::DocumentCorrupt(format!("signature object {} was not written", sig_ref))
        })?;
        let mut bytes = update.bytes;
        let byte_range = signer.sign_prepared(&mut bytes, sig_offset, signing_time)?;

        log::info!(
            "signer {} signed '{}': {} -> {} bytes, ByteRange {:?}",
            role,
            slot_name,
            document.len(),
            bytes.len(),
            byte_range
        );

        Ok(SignedDocument {
            bytes,
            signature: SignatureMetadata {
                role,
                signer_name: role.display_name().to_string(),
                signing_time,
                reason: self.config.reason.clone(),
            },
            applied,
        })
    }

    fn unknown_field(&self, name: &str) -> Result<()> {
        match self.config.unknown_fields {
            UnknownFieldPolicy::Ignore => {
                log::warn!("no form field named '{}', ignored", name);
                Ok(())
            },
            UnknownFieldPolicy::Reject => Err(Error::UnknownField(name.to_string())),
        }
    }
}

/// Names of the fields a compliant reader treats as locked.
///
/// A field is locked when it carries the read-only flag, when it is a
/// signed signature field, or when the `/Lock` policy of any signed
/// signature field covers it.
pub fn locked_fields(document: &[u8]) -> Result<BTreeSet<String>> {
    let editor = DocumentEditor::from_bytes(document.to_vec())?;
    let Some(form) = FormFields::load(&editor)? else {
        return Ok(BTreeSet::new());
    };

    let mut policies = Vec::new();
    let mut locked = BTreeSet::new();
    for field in form.iter() {
        let dict = editor.get(field.reference.id)?;
        let dict = dict.expect_dict()?;
        if field.is_signature() && dict.contains_key("V") {
            locked.insert(field.name.clone());
            if let Some(policy) = dict.get("Lock").and_then(LockPolicy::from_object) {
                policies.push(policy);
            }
        }
        if field.is_read_only() {
            locked.insert(field.name.clone());
        }
    }
    for field in form.iter() {
        if policies.iter().any(|p| p.locks(&field.name)) {
            locked.insert(field.name.clone());
        }
    }
    Ok(locked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use crate::preparation::PreparationEngine;
    use crate::signatures::{docmdp_permission, SignatureVerifier};
    use crate::workflow::FieldSpec;

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
        pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!("trailer\n<</Size 4/Root 1 0 R>>\nstartxref\n{}\n%%EOF\n", xref).as_bytes(),
        );
        pdf
    }

    fn prepared() -> Vec<u8> {
        let specs = [
            FieldSpec::new("name", FieldKind::Text, SignerRole::A, 0, 72.0, 700.0, 200.0, 20.0),
            FieldSpec::new("agree", FieldKind::Checkbox, SignerRole::B, 0, 72.0, 650.0, 12.0, 12.0),
        ];
        PreparationEngine::default().prepare(&one_page_pdf(), &specs).unwrap()
    }

    fn engine(config: SigningConfig) -> SigningEngine {
        let identities =
            IdentityProvider::generate(&IdentityConfig::default().with_key_bits(1024)).unwrap();
        SigningEngine::new(Arc::new(identities), config)
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sign_a_appends_and_certifies() {
        let engine = engine(SigningConfig::default());
        let base = prepared();
        let signed = engine
            .sign(&base, SignerRole::A, &values(&[("name", "Alice")]), &names(&["name"]))
            .unwrap();

        assert!(signed.bytes.len() > base.len());
        assert_eq!(&signed.bytes[..base.len()], &base[..]);
        assert_eq!(signed.signature.role, SignerRole::A);
        assert_eq!(signed.signature.signer_name, "Signer A");
        assert_eq!(signed.signature.reason, "Document signature");

        let editor = DocumentEditor::from_bytes(signed.bytes.clone()).unwrap();
        let form = FormFields::load(&editor).unwrap().unwrap();
        assert!(form.get("name").unwrap().is_read_only());

        let catalog = editor.catalog().unwrap();
        let perms = catalog.get("Perms").and_then(Object::as_dict).unwrap();
        let sig = editor.resolve(perms.get("DocMDP").unwrap()).unwrap();
        assert_eq!(docmdp_permission(sig.as_dict().unwrap()), Some(2));

        let acroform = load_acroform(&editor).unwrap().unwrap();
        assert_eq!(acroform.get("SigFlags").and_then(Object::as_integer), Some(3));

        let mut verifier = SignatureVerifier::new();
        verifier.add_trusted_certificates(engine.identities().certificates_der().unwrap());
        let results = verifier.verify_document(&signed.bytes).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].status.is_valid(), "{:?}", results[0].messages);
        assert_eq!(results[0].signature_info.field_name, "SignatureA");
    }

    #[test]
    fn test_sign_twice_is_rejected() {
        let engine = engine(SigningConfig::default());
        let once = engine
            .sign(&prepared(), SignerRole::A, &BTreeMap::new(), &BTreeSet::new())
            .unwrap();
        assert!(matches!(
            engine.sign(&once.bytes, SignerRole::A, &BTreeMap::new(), &BTreeSet::new()),
            Err(Error::AlreadySigned(ref name)) if name == "SignatureA"
        ));
    }

    #[test]
    fn test_unprepared_document_has_no_form() {
        let engine = engine(SigningConfig::default());
        assert!(matches!(
            engine.sign(&one_page_pdf(), SignerRole::A, &BTreeMap::new(), &BTreeSet::new()),
            Err(Error::MissingForm)
        ));
    }

    #[test]
    fn test_unknown_field_policy() {
        let lenient = engine(SigningConfig::default());
        assert!(lenient
            .sign(&prepared(), SignerRole::A, &values(&[("nmae", "typo")]), &BTreeSet::new())
            .is_ok());

        let strict = engine(SigningConfig::default().with_unknown_fields(UnknownFieldPolicy::Reject));
        assert!(matches!(
            strict.sign(&prepared(), SignerRole::A, &values(&[("nmae", "typo")]), &BTreeSet::new()),
            Err(Error::UnknownField(ref name)) if name == "nmae"
        ));
    }

    #[test]
    fn test_capacity_exceeded_never_truncates() {
        let engine = engine(SigningConfig::default().with_reserved_signature_size(64));
        match engine.sign(&prepared(), SignerRole::A, &BTreeMap::new(), &BTreeSet::new()) {
            Err(Error::CapacityExceeded { required, reserved }) => {
                assert_eq!(reserved, 64);
                assert!(required > 64);
            },
            other => panic!("expected CapacityExceeded, got {:?}", other.map(|s| s.bytes.len())),
        }
    }

    #[test]
    fn test_lock_propagation() {
        let engine = engine(SigningConfig::default());
        let after_a = engine
            .sign(&prepared(), SignerRole::A, &values(&[("name", "Alice")]), &names(&["name"]))
            .unwrap();
        let locked = locked_fields(&after_a.bytes).unwrap();
        assert!(locked.contains("name"));
        assert!(locked.contains("SignatureA"));
        assert!(!locked.contains("agree"));
        assert!(!locked.contains("SignatureB"));

        let after_b = engine
            .sign(&after_a.bytes, SignerRole::B, &values(&[("agree", "yes")]), &names(&["agree"]))
            .unwrap();
        assert_eq!(
            locked_fields(&after_b.bytes).unwrap(),
            names(&["SignatureA", "SignatureB", "agree", "name"])
        );
    }
}
