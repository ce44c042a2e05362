//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use lazy_static::lazy_static;
use pdf_cosign::config::{CosignConfig, IdentityConfig};
use pdf_cosign::identity::IdentityProvider;
use pdf_cosign::workflow::{
    FieldSpec, InMemoryDocumentStore, InMemoryWorkflowRepository, SignerRole, WorkflowService,
};
use pdf_cosign::writer::FieldKind;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

lazy_static! {
    /// Key generation dominates test time, so every test shares one pair.
    pub static ref IDENTITIES: Arc<IdentityProvider> = Arc::new(
        IdentityProvider::generate(&IdentityConfig::default().with_key_bits(1024))
            .expect("generate test identities")
    );
}

/// Minimal PDF with `pages` letter-size pages and a classic xref table.
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        "<</Type/Catalog/Pages 2 0 R>>".to_string(),
        format!("<</Type/Pages/Kids[{}]/Count {}>>", kids.join(" "), pages),
    ];
    for _ in 0..pages {
        objects.push("<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>".to_string());
    }

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
        format!(
            "trailer\n<</Size {}/Root 1 0 R>>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// One text field for signer A and one checkbox for signer B.
pub fn contract_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", FieldKind::Text, SignerRole::A, 0, 72.0, 700.0, 200.0, 20.0),
        FieldSpec::new("agree", FieldKind::Checkbox, SignerRole::B, 0, 72.0, 650.0, 12.0, 12.0),
    ]
}

/// A service over in-memory stores using the shared identities.
pub fn memory_service(config: &CosignConfig) -> WorkflowService {
    WorkflowService::from_config(
        config,
        IDENTITIES.clone(),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryWorkflowRepository::new()),
    )
}

pub fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}
