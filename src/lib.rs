// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::new_without_default)]

//! # pdf_cosign
//!
//! Sequential two-party PDF signing.
//!
//! A document is prepared once with fillable fields and two signature slots,
//! then signed by signer A and signer B in that order. Each signature is a
//! CMS detached signature appended as an incremental update, so the first
//! signature stays verifiable after the second is added.
//!
//! ## Core Features
//!
//! - **Preparation**: text, checkbox and radio fields; `SignatureA` and
//!   `SignatureB` slots on the last page with `/Lock` policies
//! - **Signing**: value filling, read-only locking, DocMDP certification by
//!   the first signer, RSA/SHA-256 CMS signatures with reserved-size checks
//! - **Workflow**: `CREATED → SIGNER_A_PENDING → SIGNER_B_PENDING → COMPLETED`
//!   with per-workflow mutual exclusion and append-only document storage
//! - **Verification**: digest, signature, revision coverage and trust for
//!   every signed field
//!
//! ## Architecture
//!
//! ```text
//! object / lexer / parser / xref / objstm / decoders / document   (reading)
//! writer (serializer, form dictionaries, appearances)             (writing)
//! editor (object overlay, full + incremental save, form fields)
//! signatures (ByteRange, CMS signer, verifier)
//! identity / preparation / signing
//! workflow (model, state machine, stores, service)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_cosign::config::CosignConfig;
//! use pdf_cosign::identity::IdentityProvider;
//! use pdf_cosign::workflow::*;
//! use pdf_cosign::writer::FieldKind;
//! use std::sync::Arc;
//!
//! let config = CosignConfig::default();
//! let identities = Arc::new(IdentityProvider::from_config(&config.identity)?);
//! let service = WorkflowService::from_config(
//!     &config,
//!     identities,
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(InMemoryWorkflowRepository::new()),
//! );
//!
//! let fields = vec![
//!     FieldSpec::new("name", FieldKind::Text, SignerRole::A, 0, 72.0, 700.0, 200.0, 20.0),
//!     FieldSpec::new("agree", FieldKind::Checkbox, SignerRole::B, 0, 72.0, 650.0, 12.0, 12.0),
//! ];
//! let wf = service.create_workflow("contract.pdf", &pdf_bytes, fields)?;
//! service.sign_workflow(wf.id, SignerRole::A, &values_a, &lock_a)?;
//! service.sign_workflow(wf.id, SignerRole::B, &values_b, &lock_b)?;
//! let signed = service.download_document(wf.id)?;
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// PDF writing
pub mod writer;

// PDF editing
pub mod editor;

// Digital signatures
pub mod signatures;

// Signing protocol
pub mod identity;
pub mod preparation;
pub mod signing;
pub mod workflow;

// Configuration
pub mod config;

// Re-exports
pub use config::CosignConfig;
pub use document::PdfDocument;
pub use error::{Error, ErrorCategory, Result};
pub use identity::{IdentityProvider, SigningIdentity};
pub use preparation::PreparationEngine;
pub use signing::{SignatureMetadata, SignedDocument, SigningEngine};
pub use workflow::{FieldSpec, SignerRole, Workflow, WorkflowId, WorkflowService, WorkflowStatus};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_cosign");
    }
}
