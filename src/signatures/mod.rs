//! PDF Digital Signatures module.
//!
//! This module provides functionality for creating and verifying digital signatures
//! in PDF documents according to the PDF specification.
//!
//! ## Features
//!
//! - **Signature Creation**: CMS detached signatures (RSA + SHA-256) with the
//!   signer's X.509 certificate embedded
//! - **Certification**: DocMDP signature references with a permission level
//! - **Signature Verification**: digest, RSA signature, revision coverage and
//!   certificate trust for every signed field of a document
//! - **ByteRange Calculation**: fixed-width placeholders patched in place so
//!   offsets never move after the file is laid out
//!
//! ## Example
//!
//! ```ignore
//! use pdf_cosign::signatures::{PdfSigner, SignOptions, SigningCredentials};
//!
//! let credentials = SigningCredentials::from_pem(&cert_pem, &key_pem)?;
//! let signer = PdfSigner::new(credentials, SignOptions::default().with_reason("Approved"));
//!
//! // Write signer.build_signature_dictionary(now) as an object of an
//! // incremental update, then finish it in place:
//! signer.sign_prepared(&mut bytes, sig_object_offset, now)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-1:2008 Section 12.8.2.2 - DocMDP
//! - RFC 5652 - Cryptographic Message Syntax

mod byterange;
mod signer;
mod types;
mod verifier;

pub use byterange::{byte_range_placeholder, ByteRangeCalculator, SignatureGap};
pub use signer::{docmdp_permission, docmdp_reference, format_pdf_date, PdfSigner};
pub use types::{
    SignOptions, SignatureInfo, SignatureSubFilter, SigningCredentials, VerificationResult,
    VerificationStatus,
};
pub use verifier::SignatureVerifier;
