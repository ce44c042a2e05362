//! Integration tests for the signing round and signature verification.
//!
//! Drives the signing engine directly over prepared documents, then checks
//! the revisions with the verifier.

mod common;

use common::{blank_pdf, contract_fields, names, values, IDENTITIES};
use pdf_cosign::config::{SigningConfig, UnknownFieldPolicy};
use pdf_cosign::editor::{extract_fields, DocumentEditor};
use pdf_cosign::preparation::PreparationEngine;
use pdf_cosign::signatures::{SignatureVerifier, VerificationStatus};
use pdf_cosign::signing::{locked_fields, SigningEngine};
use pdf_cosign::workflow::{FieldSpec, SignerRole};
use pdf_cosign::writer::FieldKind;
use pdf_cosign::{Error, ErrorCategory};
use std::collections::BTreeMap;

fn engine() -> SigningEngine {
    SigningEngine::new(IDENTITIES.clone(), SigningConfig::default())
}

fn prepared() -> Vec<u8> {
    PreparationEngine::default()
        .prepare(&blank_pdf(1), &contract_fields())
        .unwrap()
}

fn trusting_verifier() -> SignatureVerifier {
    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_certificates(IDENTITIES.certificates_der().unwrap());
    verifier
}

fn field_value(document: &[u8], name: &str) -> Option<String> {
    let editor = DocumentEditor::from_bytes(document.to_vec()).unwrap();
    extract_fields(&editor)
        .unwrap()
        .into_iter()
        .find(|f| f.name == name)
        .and_then(|f| f.value)
}

#[test]
fn test_two_signatures_both_verify() {
    let engine = engine();
    let base = prepared();

    let after_a = engine
        .sign(&base, SignerRole::A, &values(&[("name", "Alice")]), &names(&["name"]))
        .unwrap();
    let after_b = engine
        .sign(&after_a.bytes, SignerRole::B, &values(&[("agree", "yes")]), &names(&["agree"]))
        .unwrap();

    assert_eq!(&after_a.bytes[..base.len()], &base[..]);
    assert_eq!(&after_b.bytes[..after_a.bytes.len()], &after_a.bytes[..]);

    let results = trusting_verifier().verify_document(&after_b.bytes).unwrap();
    assert_eq!(results.len(), 2);

    let a = results.iter().find(|r| r.signature_info.field_name == "SignatureA").unwrap();
    assert_eq!(a.status, VerificationStatus::ValidWithWarnings, "{:?}", a.messages);
    assert!(a.digest_valid && a.signature_valid && a.certificate_trusted);
    assert!(a.document_modified);
    assert_eq!(a.signature_info.byte_range[0], 0);
    assert_eq!(
        (a.signature_info.byte_range[2] + a.signature_info.byte_range[3]) as usize,
        after_a.bytes.len()
    );
    assert_eq!(a.signature_info.docmdp_permission, Some(2));
    assert_eq!(a.signature_info.certificate_cn.as_deref(), Some("Signer A"));

    let b = results.iter().find(|r| r.signature_info.field_name == "SignatureB").unwrap();
    assert_eq!(b.status, VerificationStatus::Valid, "{:?}", b.messages);
    assert!(b.signature_info.covers_whole_document);
    assert_eq!(b.signature_info.docmdp_permission, None);
    assert_eq!(b.signature_info.signer_name.as_deref(), Some("Signer B"));

    assert_eq!(field_value(&after_b.bytes, "name").as_deref(), Some("Alice"));
    assert_eq!(field_value(&after_b.bytes, "agree").as_deref(), Some("Yes"));
}

#[test]
fn test_lock_scope_grows_with_each_signature() {
    let engine = engine();
    let base = prepared();
    assert!(locked_fields(&base).unwrap().is_empty());

    let after_a = engine.sign(&base, SignerRole::A, &BTreeMap::new(), &names(&[])).unwrap();
    assert_eq!(locked_fields(&after_a.bytes).unwrap(), names(&["SignatureA", "name"]));

    let after_b = engine
        .sign(&after_a.bytes, SignerRole::B, &BTreeMap::new(), &names(&[]))
        .unwrap();
    assert_eq!(
        locked_fields(&after_b.bytes).unwrap(),
        names(&["SignatureA", "SignatureB", "agree", "name"])
    );
}

#[test]
fn test_checkbox_falsy_value_unchecks() {
    let engine = engine();
    let after_a = engine.sign(&prepared(), SignerRole::A, &BTreeMap::new(), &names(&[])).unwrap();
    let after_b = engine
        .sign(&after_a.bytes, SignerRole::B, &values(&[("agree", "nope")]), &names(&[]))
        .unwrap();
    assert_eq!(field_value(&after_b.bytes, "agree").as_deref(), Some("Off"));
}

#[test]
fn test_tampering_with_first_revision_invalidates_both() {
    let engine = engine();
    let after_a = engine.sign(&prepared(), SignerRole::A, &BTreeMap::new(), &names(&[])).unwrap();
    let after_b = engine
        .sign(&after_a.bytes, SignerRole::B, &BTreeMap::new(), &names(&[]))
        .unwrap();

    let mut tampered = after_b.bytes.clone();
    // "%PDF-1.7" -> "%PDF-1.6": still parses, but the covered bytes differ.
    tampered[7] = b'6';

    let results = trusting_verifier().verify_document(&tampered).unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.digest_valid);
    }
}

#[test]
fn test_untrusted_verifier_reports_unknown() {
    let after_a = engine().sign(&prepared(), SignerRole::A, &BTreeMap::new(), &names(&[])).unwrap();
    let results = SignatureVerifier::new().verify_document(&after_a.bytes).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, VerificationStatus::Unknown);
    assert!(results[0].digest_valid && results[0].signature_valid);
}

#[test]
fn test_unprepared_document_is_rejected() {
    let err = engine()
        .sign(&blank_pdf(1), SignerRole::A, &BTreeMap::new(), &names(&[]))
        .unwrap_err();
    assert!(matches!(err, Error::MissingForm));
    assert_eq!(err.category(), ErrorCategory::State);
}

#[test]
fn test_slot_already_signed() {
    let engine = engine();
    let after_a = engine.sign(&prepared(), SignerRole::A, &BTreeMap::new(), &names(&[])).unwrap();
    let err = engine
        .sign(&after_a.bytes, SignerRole::A, &BTreeMap::new(), &names(&[]))
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySigned(ref slot) if slot == "SignatureA"));
}

#[test]
fn test_unknown_field_policies() {
    let base = prepared();
    let stray = values(&[("nickname", "Al")]);

    let lenient = engine();
    lenient.sign(&base, SignerRole::A, &stray, &names(&[])).unwrap();

    let strict = SigningEngine::new(
        IDENTITIES.clone(),
        SigningConfig::default().with_unknown_fields(UnknownFieldPolicy::Reject),
    );
    let err = strict.sign(&base, SignerRole::A, &stray, &names(&[])).unwrap_err();
    assert!(matches!(err, Error::UnknownField(ref name) if name == "nickname"));
    let err = strict
        .sign(&base, SignerRole::A, &BTreeMap::new(), &names(&["nickname"]))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownField(_)));
}

#[test]
fn test_reserved_size_too_small() {
    let engine = SigningEngine::new(
        IDENTITIES.clone(),
        SigningConfig::default().with_reserved_signature_size(64),
    );
    let err = engine
        .sign(&prepared(), SignerRole::A, &BTreeMap::new(), &names(&[]))
        .unwrap_err();
    match err {
        Error::CapacityExceeded { required, reserved } => {
            assert_eq!(reserved, 64);
            assert!(required > reserved);
        },
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }
}

#[test]
fn test_radio_values_are_not_applied() {
    let mut fields = contract_fields();
    fields.push(FieldSpec::new("plan", FieldKind::Radio, SignerRole::A, 0, 72.0, 600.0, 12.0, 12.0));
    let base = PreparationEngine::default().prepare(&blank_pdf(1), &fields).unwrap();
    assert_eq!(field_value(&base, "plan").as_deref(), Some("Off"));

    let signed = engine()
        .sign(&base, SignerRole::A, &values(&[("name", "Alice"), ("plan", "gold")]), &names(&[]))
        .unwrap();
    assert_eq!(field_value(&signed.bytes, "plan").as_deref(), Some("Off"));
    assert_eq!(field_value(&signed.bytes, "name").as_deref(), Some("Alice"));
    assert_eq!(signed.applied, values(&[("name", "Alice")]));
}
