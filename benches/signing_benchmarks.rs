//! Signing round benchmarks.
//!
//! Measures preparation, one signing round and verification on a small
//! form, plus the CMS step on its own at several signed-content sizes.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use pdf_cosign::config::{IdentityConfig, SigningConfig};
use pdf_cosign::identity::IdentityProvider;
use pdf_cosign::preparation::PreparationEngine;
use pdf_cosign::signatures::{PdfSigner, SignOptions, SignatureVerifier};
use pdf_cosign::signing::SigningEngine;
use pdf_cosign::workflow::{FieldSpec, SignerRole};
use pdf_cosign::writer::FieldKind;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn blank_pdf() -> Vec<u8> {
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

fn fields(count: usize) -> Vec<FieldSpec> {
    (0..count)
        .map(|i| {
            let role = if i % 2 == 0 { SignerRole::A } else { SignerRole::B };
            let y = 700.0 - (i as f64) * 24.0;
            FieldSpec::new(format!("field{}", i), FieldKind::Text, role, 0, 72.0, y, 200.0, 20.0)
        })
        .collect()
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    let pdf = blank_pdf();
    let engine = PreparationEngine::default();

    for count in [0usize, 4, 16] {
        let specs = fields(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &specs, |b, specs| {
            b.iter(|| engine.prepare(black_box(&pdf), specs).unwrap());
        });
    }
    group.finish();
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let identities = Arc::new(
        IdentityProvider::generate(&IdentityConfig::default().with_key_bits(2048)).unwrap(),
    );
    let engine = SigningEngine::new(identities.clone(), SigningConfig::default());
    let prepared = PreparationEngine::default().prepare(&blank_pdf(), &fields(4)).unwrap();
    let values: BTreeMap<String, String> =
        [("field0".to_string(), "Alice".to_string())].into_iter().collect();
    let locks: BTreeSet<String> = ["field0".to_string()].into_iter().collect();

    c.bench_function("sign/signer_a", |b| {
        b.iter(|| {
            engine
                .sign(black_box(&prepared), SignerRole::A, &values, &locks)
                .unwrap()
        });
    });

    let signed = engine.sign(&prepared, SignerRole::A, &values, &locks).unwrap();
    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_certificates(identities.certificates_der().unwrap());
    c.bench_function("verify/one_signature", |b| {
        b.iter(|| verifier.verify_document(black_box(&signed.bytes)).unwrap());
    });
}

fn bench_cms(c: &mut Criterion) {
    let identities =
        IdentityProvider::generate(&IdentityConfig::default().with_key_bits(2048)).unwrap();
    let credentials = identities.identity(SignerRole::A).unwrap().credentials.clone();
    let signer = PdfSigner::new(credentials, SignOptions::default());
    let now = chrono::Utc::now();

    let mut group = c.benchmark_group("cms");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let content = vec![0x42u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &content, |b, content| {
            b.iter_batched(
                || content.clone(),
                |bytes| signer.sign(black_box(&bytes), now).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prepare, bench_sign_and_verify, bench_cms);
criterion_main!(benches);
